use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{debug, error, info};

use crate::app::mapping::ChannelMapper;
use crate::app::shutdown::ShutdownSignal;
use crate::app::store::{Action, NotificationStore};
use crate::domain::change::{AccountRecord, InventoryRecord, OrderRecord};
use crate::domain::notification::Notification;

/// Read-only query interface of the system of record.
#[async_trait]
pub trait SeedSource: Send + Sync {
    async fn recent_orders(&self, limit: i64) -> Result<Vec<OrderRecord>>;
    async fn recent_accounts(&self, limit: i64) -> Result<Vec<AccountRecord>>;
    async fn low_stock(&self, threshold: i64) -> Result<Vec<InventoryRecord>>;
}

/// One-shot cold-start fetch of recent history.
pub struct SeedReconciler {
    source: Arc<dyn SeedSource>,
    mapper: ChannelMapper,
}

impl SeedReconciler {
    pub fn new(source: Arc<dyn SeedSource>, mapper: ChannelMapper) -> Self {
        Self { source, mapper }
    }

    /// Runs the seed queries concurrently. A failing query is logged and
    /// contributes nothing.
    pub async fn fetch(&self) -> Vec<Notification> {
        let policy = self.mapper.policy();
        let (orders, accounts, stock) = tokio::join!(
            self.source.recent_orders(policy.seed_order_limit),
            self.source.recent_accounts(policy.seed_account_limit),
            self.source.low_stock(policy.low_stock_threshold),
        );

        let now = OffsetDateTime::now_utc();
        let mut batch = Vec::new();

        match orders {
            Ok(orders) => batch.extend(orders.iter().map(|order| self.mapper.seed_order(order))),
            Err(err) => error!(error = ?err, "failed to fetch seed orders"),
        }
        match accounts {
            Ok(accounts) => {
                batch.extend(accounts.iter().map(|account| self.mapper.seed_account(account)))
            }
            Err(err) => error!(error = ?err, "failed to fetch seed accounts"),
        }
        match stock {
            Ok(products) => batch.extend(
                products
                    .iter()
                    .filter_map(|product| self.mapper.seed_stock(product, now)),
            ),
            Err(err) => error!(error = ?err, "failed to fetch seed inventory"),
        }

        batch
    }

    /// Fetches and dispatches a single `Seed`, unless teardown started while
    /// the queries were in flight. Returns the batch size dispatched.
    pub async fn run(&self, store: &NotificationStore, shutdown: &ShutdownSignal) -> usize {
        let batch = self.fetch().await;

        if shutdown.is_triggered() || !store.is_live() {
            debug!(size = batch.len(), "engine stopped, discarding seed batch");
            return 0;
        }

        let size = batch.len();
        if size > 0 {
            store.dispatch(Action::Seed(batch));
        }
        info!(size, "seeded notification feed");
        size
    }
}
