use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::app::subscriber::{ChangeFeed, FeedSignal, SignalSender, Subscription, SubscriptionStatus};
use crate::domain::change::{ChangeEvent, Source};
use crate::infra::db::Db;

/// Change feed backed by Postgres `LISTEN/NOTIFY`. The triggers in
/// `migrations/` publish one JSON change event per row change.
#[derive(Clone)]
pub struct PgChangeFeed {
    db: Db,
}

impl PgChangeFeed {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn subscribe(&self, source: Source, signals: SignalSender) -> Result<Subscription> {
        let db = self.db.clone();
        let task = tokio::spawn(async move { listen(db, source, signals).await });
        Ok(Subscription::new(task))
    }
}

async fn listen(db: Db, source: Source, signals: SignalSender) {
    let status = |status| FeedSignal::Status { source, status };

    let mut listener = match db.listen(source.channel()).await {
        Ok(listener) => listener,
        Err(err) => {
            let _ = signals.send(status(SubscriptionStatus::Errored(err.to_string())));
            return;
        }
    };

    if signals.send(status(SubscriptionStatus::Established)).is_err() {
        return;
    }
    debug!(source = %source, "listening for changes");

    loop {
        // try_recv reports a lost connection instead of reconnecting silently,
        // so the supervisor sees it.
        match listener.try_recv().await {
            Ok(Some(notification)) => {
                let event = match serde_json::from_str::<ChangeEvent>(notification.payload()) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(error = ?err, source = %source, "failed to parse change payload");
                        continue;
                    }
                };
                if signals.send(FeedSignal::Change { source, event }).is_err() {
                    return;
                }
            }
            Ok(None) => {
                let _ = signals.send(status(SubscriptionStatus::Closed));
                return;
            }
            Err(err) => {
                let _ = signals.send(status(SubscriptionStatus::Errored(err.to_string())));
                return;
            }
        }
    }
}
