use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::policy::FeedPolicy;
use crate::domain::change::{
    AccountRecord, ChangeEvent, ContentRecord, InventoryRecord, Operation, OrderRecord, Source,
};
use crate::domain::notification::{Notification, NotificationData, NotificationType};

const SEED_PREFIX: &str = "seed-";

/// Turns source records into notifications according to the feed policy.
#[derive(Debug, Clone, Copy)]
pub struct ChannelMapper {
    policy: FeedPolicy,
}

impl ChannelMapper {
    pub fn new(policy: FeedPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FeedPolicy {
        &self.policy
    }

    /// Maps one live change. `None` means no notification is due, either by
    /// rule or because the record could not be read.
    pub fn map_change(
        &self,
        source: Source,
        event: &ChangeEvent,
        received_at: OffsetDateTime,
    ) -> Option<Notification> {
        if event.table != source.table() {
            warn!(source = %source, table = %event.table, "change from unexpected table, skipping");
            return None;
        }

        match (source, event.operation) {
            (Source::Accounts, Operation::Insert) => {
                let account: AccountRecord = parse_record(source, event)?;
                Some(self.account_created(&account, format!("account-{}", account.id), received_at, false))
            }
            (Source::Orders, Operation::Insert) => {
                let order: OrderRecord = parse_record(source, event)?;
                Some(self.order_placed(&order, format!("order-{}", order.id), received_at, false))
            }
            (Source::Orders, Operation::Update) => {
                let order: OrderRecord = parse_record(source, event)?;
                let version = order
                    .updated_at
                    .map(|at| at.unix_timestamp_nanos().to_string())
                    .unwrap_or_else(|| order.status.clone());
                Some(Notification {
                    id: format!("order-status-{}-{}", order.id, version),
                    notification_type: NotificationType::OrderStatusChanged,
                    title: "Order status updated".to_string(),
                    message: format!("Order #{} is now {}", short_id(order.id), order.status),
                    timestamp: received_at,
                    read: false,
                    data: Some(order_data(&order)),
                })
            }
            (Source::Inventory, Operation::Update) => {
                let product: InventoryRecord = parse_record(source, event)?;
                let version = product
                    .updated_at
                    .map(|at| at.unix_timestamp_nanos().to_string())
                    .unwrap_or_else(|| product.stock.to_string());
                let kind = self.stock_kind(product.stock)?;
                let prefix = match kind {
                    NotificationType::StockOut => "stock-out",
                    _ => "stock-low",
                };
                Some(self.stock_alert(
                    &product,
                    kind,
                    format!("{}-{}-{}", prefix, product.id, version),
                    received_at,
                    false,
                ))
            }
            (Source::Content, Operation::Insert) => {
                let content: ContentRecord = parse_record(source, event)?;
                Some(Notification {
                    id: format!("content-{}", content.id),
                    notification_type: NotificationType::ContentSubmitted,
                    title: "New content submitted".to_string(),
                    message: format!(
                        "{} submitted \"{}\"",
                        content.author_name.as_deref().unwrap_or("Someone"),
                        content.title
                    ),
                    timestamp: received_at,
                    read: false,
                    data: Some(NotificationData::Content {
                        submission_id: content.id,
                        author: content.author_name.clone(),
                    }),
                })
            }
            (source, operation) => {
                debug!(source = %source, operation = ?operation, "no rule for change, skipping");
                None
            }
        }
    }

    pub fn seed_order(&self, order: &OrderRecord) -> Notification {
        let id = format!("{}order-{}", SEED_PREFIX, order.id);
        self.order_placed(order, id, order.created_at, true)
    }

    pub fn seed_account(&self, account: &AccountRecord) -> Notification {
        let id = format!("{}account-{}", SEED_PREFIX, account.id);
        self.account_created(account, id, account.created_at, true)
    }

    /// `None` when the product is not low on stock.
    pub fn seed_stock(&self, product: &InventoryRecord, now: OffsetDateTime) -> Option<Notification> {
        let kind = self.stock_kind(product.stock)?;
        let id = format!("{}stock-{}", SEED_PREFIX, product.id);
        Some(self.stock_alert(product, kind, id, product.updated_at.unwrap_or(now), true))
    }

    fn stock_kind(&self, stock: i64) -> Option<NotificationType> {
        if stock <= 0 {
            Some(NotificationType::StockOut)
        } else if stock <= self.policy.low_stock_threshold {
            Some(NotificationType::StockLow)
        } else {
            None
        }
    }

    fn order_placed(
        &self,
        order: &OrderRecord,
        id: String,
        timestamp: OffsetDateTime,
        read: bool,
    ) -> Notification {
        let customer = order.customer_name.as_deref().unwrap_or("a guest");
        let (notification_type, title) = if order.total >= self.policy.high_value_order_total {
            (NotificationType::HighValueOrder, "High-value order")
        } else {
            (NotificationType::OrderPlaced, "New order received")
        };

        Notification {
            id,
            notification_type,
            title: title.to_string(),
            message: format!(
                "Order #{} for {:.2} from {}",
                short_id(order.id),
                order.total,
                customer
            ),
            timestamp,
            read,
            data: Some(order_data(order)),
        }
    }

    fn account_created(
        &self,
        account: &AccountRecord,
        id: String,
        timestamp: OffsetDateTime,
        read: bool,
    ) -> Notification {
        let who = account
            .full_name
            .as_deref()
            .or(account.email.as_deref())
            .unwrap_or("A new user");

        Notification {
            id,
            notification_type: NotificationType::AccountCreated,
            title: "New customer account".to_string(),
            message: format!("{} just signed up", who),
            timestamp,
            read,
            data: Some(NotificationData::Account {
                user_id: account.id,
                email: account.email.clone(),
                role: account.role.clone(),
            }),
        }
    }

    fn stock_alert(
        &self,
        product: &InventoryRecord,
        kind: NotificationType,
        id: String,
        timestamp: OffsetDateTime,
        read: bool,
    ) -> Notification {
        let (title, message) = match kind {
            NotificationType::StockOut => {
                ("Out of stock", format!("{} is out of stock", product.name))
            }
            _ => (
                "Low stock",
                format!("{} has only {} left in stock", product.name, product.stock),
            ),
        };

        Notification {
            id,
            notification_type: kind,
            title: title.to_string(),
            message,
            timestamp,
            read,
            data: Some(NotificationData::Stock {
                product_id: product.id,
                product_name: product.name.clone(),
                stock: product.stock,
            }),
        }
    }
}

fn parse_record<T: DeserializeOwned>(source: Source, event: &ChangeEvent) -> Option<T> {
    match serde_json::from_value(event.record.clone()) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(error = ?err, source = %source, "malformed change record, skipping");
            None
        }
    }
}

fn order_data(order: &OrderRecord) -> NotificationData {
    NotificationData::Order {
        order_id: order.id,
        total: order.total,
        status: Some(order.status.clone()),
        customer: order.customer_name.clone(),
    }
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}
