use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::app::alerts::Alerter;
use crate::app::mapping::ChannelMapper;
use crate::app::reconnect::{ConnectionPhase, ReconnectController, RetryDecision};
use crate::app::shutdown::ShutdownSignal;
use crate::app::store::{Action, NotificationStore};
use crate::config::policy::ReconnectPolicy;
use crate::domain::change::{ChangeEvent, Source};
use crate::domain::notification::Notification;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Established,
    Errored(String),
    TimedOut,
    Closed,
}

impl SubscriptionStatus {
    pub fn is_failure(&self) -> bool {
        !matches!(self, SubscriptionStatus::Established)
    }
}

#[derive(Debug)]
pub enum FeedSignal {
    Change { source: Source, event: ChangeEvent },
    Status { source: Source, status: SubscriptionStatus },
}

pub type SignalSender = mpsc::UnboundedSender<FeedSignal>;

/// Push interface of the system of record.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Opens one subscription. Changes and status updates for `source` must
    /// be sent on `signals` until the returned handle is dropped.
    async fn subscribe(&self, source: Source, signals: SignalSender) -> Result<Subscription>;
}

/// Handle to one open subscription. Dropping it closes the subscription.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The subscriptions of one connection attempt.
struct SubscriptionGroup {
    sources: Vec<Source>,
    subscriptions: Vec<Subscription>,
    statuses: HashMap<Source, SubscriptionStatus>,
}

impl SubscriptionGroup {
    fn new(sources: &[Source]) -> Self {
        Self {
            sources: sources.to_vec(),
            subscriptions: Vec::with_capacity(sources.len()),
            statuses: HashMap::new(),
        }
    }

    async fn open(&mut self, feed: &dyn ChangeFeed, signals: SignalSender) -> Result<()> {
        for &source in &self.sources {
            let subscription = feed
                .subscribe(source, signals.clone())
                .await
                .with_context(|| format!("failed to subscribe to {}", source))?;
            self.subscriptions.push(subscription);
        }
        Ok(())
    }

    fn record(&mut self, source: Source, status: SubscriptionStatus) {
        self.statuses.insert(source, status);
    }

    fn all_established(&self) -> bool {
        self.sources
            .iter()
            .all(|source| self.statuses.get(source) == Some(&SubscriptionStatus::Established))
    }

    fn pending(&self) -> Vec<Source> {
        self.sources
            .iter()
            .copied()
            .filter(|source| self.statuses.get(source) != Some(&SubscriptionStatus::Established))
            .collect()
    }

    /// Closes every subscription in one step. Safe on a group that never
    /// opened anything.
    fn close_all(&mut self) {
        let count = self.subscriptions.len();
        self.subscriptions.clear();
        self.statuses.clear();
        if count > 0 {
            debug!(count, "closed subscriptions");
        }
    }
}

impl Drop for SubscriptionGroup {
    fn drop(&mut self) {
        self.close_all();
    }
}

enum Outcome {
    Failed,
    Shutdown,
}

/// Supervises one subscription per [`Source`]. All of them report into a
/// single signal queue; any failure tears the whole group down and hands
/// control to the [`ReconnectController`].
pub struct ChannelSubscriber {
    feed: Arc<dyn ChangeFeed>,
    store: NotificationStore,
    mapper: ChannelMapper,
    alerter: Arc<dyn Alerter>,
    sources: Vec<Source>,
    policy: ReconnectPolicy,
    phase: watch::Sender<ConnectionPhase>,
}

impl ChannelSubscriber {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        store: NotificationStore,
        mapper: ChannelMapper,
        alerter: Arc<dyn Alerter>,
        sources: Vec<Source>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (phase, _) = watch::channel(ConnectionPhase::Idle);
        Self {
            feed,
            store,
            mapper,
            alerter,
            sources,
            policy,
            phase,
        }
    }

    pub fn phase(&self) -> watch::Receiver<ConnectionPhase> {
        self.phase.subscribe()
    }

    /// Maps a live change and adds it to the feed. Returns the notification
    /// when it was new.
    pub fn handle_change(&self, source: Source, event: &ChangeEvent) -> Option<Notification> {
        let notification = self
            .mapper
            .map_change(source, event, OffsetDateTime::now_utc())?;

        if !self.store.dispatch(Action::Add(notification.clone())) {
            debug!(notification_id = %notification.id, "duplicate or dropped notification");
            return None;
        }

        if self.alerter.permitted() {
            if let Err(err) = self.alerter.alert(&notification) {
                debug!(error = ?err, notification_id = %notification.id, "platform alert failed");
            }
        }

        Some(notification)
    }

    /// Keeps the subscription group alive until shutdown or until retries are
    /// exhausted. Returns the final phase.
    pub async fn run(self, mut shutdown: ShutdownSignal) -> ConnectionPhase {
        let mut controller = ReconnectController::new(self.policy);

        while controller.begin_connect() {
            self.publish(&controller);
            let (signals, mut inbox) = mpsc::unbounded_channel();
            let mut group = SubscriptionGroup::new(&self.sources);
            // Covers both opening and establishing every channel.
            let deadline = Instant::now().checked_add(self.policy.subscribe_timeout);

            let opened = tokio::select! {
                biased;
                _ = shutdown.triggered() => None,
                _ = expire(deadline) => Some(Err(anyhow!("timed out opening subscriptions"))),
                opened = group.open(self.feed.as_ref(), signals) => Some(opened),
            };

            let outcome = match opened {
                None => Outcome::Shutdown,
                Some(Err(err)) => {
                    warn!(error = ?err, "failed to open subscriptions");
                    Outcome::Failed
                }
                Some(Ok(())) => {
                    self.pump(&mut group, &mut inbox, &mut controller, &mut shutdown, deadline)
                        .await
                }
            };

            group.close_all();

            if let Outcome::Shutdown = outcome {
                break;
            }

            self.store.dispatch(Action::SetConnected(false));
            match controller.on_failure() {
                RetryDecision::Retry { attempt, delay } => {
                    self.store
                        .dispatch(Action::SetError(Some(controller.reconnecting_message(attempt))));
                    self.publish(&controller);
                    tokio::select! {
                        biased;
                        _ = shutdown.triggered() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::GiveUp => {
                    self.store
                        .dispatch(Action::SetError(Some(controller.failed_message())));
                    break;
                }
            }
        }

        controller.stop();
        self.publish(&controller);
        info!(phase = %controller.phase(), "channel subscriber stopped");
        controller.phase()
    }

    async fn pump(
        &self,
        group: &mut SubscriptionGroup,
        inbox: &mut mpsc::UnboundedReceiver<FeedSignal>,
        controller: &mut ReconnectController,
        shutdown: &mut ShutdownSignal,
        deadline: Option<Instant>,
    ) -> Outcome {
        loop {
            let establishing = controller.phase() != ConnectionPhase::Connected;

            tokio::select! {
                biased;
                _ = shutdown.triggered() => return Outcome::Shutdown,
                _ = expire(deadline), if establishing => {
                    for source in group.pending() {
                        warn!(source = %source, "subscription timed out");
                        group.record(source, SubscriptionStatus::TimedOut);
                    }
                    return Outcome::Failed;
                }
                signal = inbox.recv() => match signal {
                    None => {
                        warn!("all subscriptions dropped their signal queue");
                        return Outcome::Failed;
                    }
                    Some(FeedSignal::Change { source, event }) => {
                        self.handle_change(source, &event);
                    }
                    Some(FeedSignal::Status { source, status }) => {
                        group.record(source, status.clone());
                        if status.is_failure() {
                            warn!(source = %source, status = ?status, "subscription failed");
                            return Outcome::Failed;
                        }
                        if group.all_established() && controller.phase() != ConnectionPhase::Connected {
                            controller.on_established();
                            self.store.dispatch(Action::SetConnected(true));
                            self.publish(controller);
                            info!(channels = self.sources.len(), "realtime channels connected");
                        }
                    }
                }
            }
        }
    }

    fn publish(&self, controller: &ReconnectController) {
        self.phase.send_replace(controller.phase());
    }
}

/// Resolves at `deadline`. `None` is a deadline too far out to represent.
async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
