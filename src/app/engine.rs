use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::alerts::{Alerter, NoopAlerter};
use crate::app::mapping::ChannelMapper;
use crate::app::persistence::{NotificationSlot, PersistenceAdapter};
use crate::app::reconnect::ConnectionPhase;
use crate::app::seed::{SeedReconciler, SeedSource};
use crate::app::shutdown::{self, ShutdownTrigger};
use crate::app::store::{Action, NotificationState, NotificationStore};
use crate::app::subscriber::{ChangeFeed, ChannelSubscriber};
use crate::config::policy::{FeedPolicy, ReconnectPolicy};
use crate::domain::change::Source;

/// Collaborators and policy the engine is started with.
pub struct EngineDeps {
    pub feed: Arc<dyn ChangeFeed>,
    pub seed_source: Arc<dyn SeedSource>,
    pub slot: Arc<dyn NotificationSlot>,
    pub alerter: Arc<dyn Alerter>,
    pub sources: Vec<Source>,
    pub feed_policy: FeedPolicy,
    pub reconnect_policy: ReconnectPolicy,
}

impl EngineDeps {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        seed_source: Arc<dyn SeedSource>,
        slot: Arc<dyn NotificationSlot>,
    ) -> Self {
        Self {
            feed,
            seed_source,
            slot,
            alerter: Arc::new(NoopAlerter),
            sources: vec![Source::Accounts, Source::Orders, Source::Inventory],
            feed_policy: FeedPolicy::default(),
            reconnect_policy: ReconnectPolicy::default(),
        }
    }
}

/// The running notification engine. Readers get snapshots; the only
/// mutations available are the operator actions below.
pub struct NotificationEngine {
    store: NotificationStore,
    phase: watch::Receiver<ConnectionPhase>,
    shutdown: ShutdownTrigger,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NotificationEngine {
    /// Hydrates from the slot, then starts the mirror, seed and subscriber
    /// tasks.
    pub async fn start(deps: EngineDeps) -> Self {
        let store = NotificationStore::new(deps.feed_policy.capacity);
        let persistence = PersistenceAdapter::new(deps.slot);
        persistence.hydrate(&store).await;

        let (trigger, signal) = shutdown::channel();
        let mapper = ChannelMapper::new(deps.feed_policy);
        let mut tasks = Vec::with_capacity(3);

        let updates = store.subscribe();
        let mirror_signal = signal.clone();
        tasks.push(tokio::spawn(async move {
            persistence.mirror(updates, mirror_signal).await;
        }));

        let reconciler = SeedReconciler::new(deps.seed_source, mapper);
        let seed_store = store.clone();
        let mut seed_signal = signal.clone();
        tasks.push(tokio::spawn(async move {
            let guard = seed_signal.clone();
            tokio::select! {
                _ = reconciler.run(&seed_store, &guard) => {}
                _ = seed_signal.triggered() => {}
            }
        }));

        let subscriber = ChannelSubscriber::new(
            deps.feed,
            store.clone(),
            mapper,
            deps.alerter,
            deps.sources,
            deps.reconnect_policy,
        );
        let phase = subscriber.phase();
        tasks.push(tokio::spawn(async move {
            subscriber.run(signal).await;
        }));

        info!("notification engine started");
        Self {
            store,
            phase,
            shutdown: trigger,
            tasks: Mutex::new(tasks),
        }
    }

    pub fn snapshot(&self) -> NotificationState {
        self.store.snapshot()
    }

    pub fn unread_count(&self) -> usize {
        self.store.unread_count()
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_connected()
    }

    pub fn connection_error(&self) -> Option<String> {
        self.store.connection_error()
    }

    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.borrow()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.store.snapshot().contains(id)
    }

    pub fn mark_as_read(&self, id: &str) -> bool {
        self.store.dispatch(Action::MarkRead(id.to_string()))
    }

    pub fn mark_all_as_read(&self) -> bool {
        self.store.dispatch(Action::MarkAllRead)
    }

    pub fn clear_all(&self) -> bool {
        self.store.dispatch(Action::ClearAll)
    }

    /// Stops every task and closes the store. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();
        self.store.close();

        let tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = ?err, "engine task ended abnormally");
            }
        }
        info!("notification engine stopped");
    }
}
