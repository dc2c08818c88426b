use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use time::OffsetDateTime;
use uuid::Uuid;

/// Default number of notifications kept in the feed.
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationType {
    AccountCreated,
    OrderPlaced,
    OrderStatusChanged,
    StockLow,
    StockOut,
    HighValueOrder,
    ContentSubmitted,
}

impl NotificationType {
    /// Lower ranks are shown first among entries with the same read state.
    pub fn severity_rank(&self) -> u8 {
        match self {
            NotificationType::StockOut => 0,
            NotificationType::StockLow => 1,
            NotificationType::HighValueOrder
            | NotificationType::OrderPlaced
            | NotificationType::OrderStatusChanged => 2,
            NotificationType::AccountCreated | NotificationType::ContentSubmitted => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::AccountCreated => "account-created",
            NotificationType::OrderPlaced => "order-placed",
            NotificationType::OrderStatusChanged => "order-status-changed",
            NotificationType::StockLow => "stock-low",
            NotificationType::StockOut => "stock-out",
            NotificationType::HighValueOrder => "high-value-order",
            NotificationType::ContentSubmitted => "content-submitted",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Badge payload carried alongside a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationData {
    Order {
        order_id: Uuid,
        total: f64,
        status: Option<String>,
        customer: Option<String>,
    },
    Stock {
        product_id: Uuid,
        product_name: String,
        stock: i64,
    },
    Account {
        user_id: Uuid,
        email: Option<String>,
        role: Option<String>,
    },
    Content {
        submission_id: Uuid,
        author: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NotificationData>,
}

/// Ordering used when presenting the feed to an operator: unread first, then
/// by severity, then newest first.
pub fn display_cmp(a: &Notification, b: &Notification) -> Ordering {
    a.read
        .cmp(&b.read)
        .then_with(|| {
            a.notification_type
                .severity_rank()
                .cmp(&b.notification_type.severity_rank())
        })
        .then_with(|| b.timestamp.cmp(&a.timestamp))
}
