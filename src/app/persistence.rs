use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::app::shutdown::ShutdownSignal;
use crate::app::store::{Action, NotificationState, NotificationStore};
use crate::domain::notification::Notification;

pub const LAYOUT_VERSION: u32 = 1;

/// One durable text slot. The adapter is the only component that touches it.
#[async_trait]
pub trait NotificationSlot: Send + Sync {
    async fn load(&self) -> Result<Option<String>>;
    async fn save(&self, payload: String) -> Result<()>;
}

/// Process-local slot, used when no durable store is reachable and in tests.
#[derive(Default)]
pub struct MemorySlot {
    payload: Mutex<Option<String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            payload: Mutex::new(Some(payload.into())),
        }
    }

    pub async fn payload(&self) -> Option<String> {
        self.payload.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSlot for MemorySlot {
    async fn load(&self) -> Result<Option<String>> {
        Ok(self.payload.lock().await.clone())
    }

    async fn save(&self, payload: String) -> Result<()> {
        *self.payload.lock().await = Some(payload);
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedFeed {
    version: u32,
    notifications: Vec<Notification>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLayout {
    Versioned(PersistedFeed),
    Unversioned(Vec<Notification>),
}

pub fn encode(notifications: &[Notification]) -> Result<String> {
    let feed = PersistedFeed {
        version: LAYOUT_VERSION,
        notifications: notifications.to_vec(),
    };
    Ok(serde_json::to_string(&feed)?)
}

/// Missing, corrupt or unknown-version payloads decode to an empty list.
pub fn decode(payload: &str) -> Vec<Notification> {
    match serde_json::from_str::<StoredLayout>(payload) {
        Ok(StoredLayout::Versioned(feed)) if feed.version == LAYOUT_VERSION => feed.notifications,
        Ok(StoredLayout::Versioned(feed)) => {
            warn!(version = feed.version, "unknown persisted feed version, discarding");
            Vec::new()
        }
        Ok(StoredLayout::Unversioned(notifications)) => notifications,
        Err(err) => {
            warn!(error = ?err, "persisted feed is corrupt, discarding");
            Vec::new()
        }
    }
}

/// Write-through mirror of the feed. Load failures hydrate an empty feed and
/// save failures are logged and dropped.
#[derive(Clone)]
pub struct PersistenceAdapter {
    slot: Arc<dyn NotificationSlot>,
}

impl PersistenceAdapter {
    pub fn new(slot: Arc<dyn NotificationSlot>) -> Self {
        Self { slot }
    }

    pub async fn load(&self) -> Vec<Notification> {
        match self.slot.load().await {
            Ok(Some(payload)) => decode(&payload),
            Ok(None) => Vec::new(),
            Err(err) => {
                debug!(error = ?err, "failed to read persisted feed");
                Vec::new()
            }
        }
    }

    pub async fn save(&self, notifications: &[Notification]) {
        let payload = match encode(notifications) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(error = ?err, "failed to encode feed");
                return;
            }
        };
        if let Err(err) = self.slot.save(payload).await {
            debug!(error = ?err, "failed to persist feed");
        }
    }

    /// Loads the slot and seeds the store with it. Returns the number of
    /// restored entries.
    pub async fn hydrate(&self, store: &NotificationStore) -> usize {
        let restored = self.load().await;
        let count = restored.len();
        if count > 0 {
            store.dispatch(Action::Seed(restored));
        }
        info!(restored = count, "hydrated notification feed");
        count
    }

    /// Saves the list after each store change until shutdown, then saves once
    /// more so the final state is on disk.
    pub async fn mirror(
        &self,
        mut updates: watch::Receiver<NotificationState>,
        mut shutdown: ShutdownSignal,
    ) {
        let mut last_saved: Option<Vec<Notification>> = None;
        loop {
            let stop = tokio::select! {
                changed = updates.changed() => changed.is_err(),
                _ = shutdown.triggered() => true,
            };

            let current = updates.borrow_and_update().notifications.clone();
            if last_saved.as_ref() != Some(&current) {
                self.save(&current).await;
                last_saved = Some(current);
            }

            if stop {
                break;
            }
        }
    }
}
