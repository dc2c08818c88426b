use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::domain::notification::{display_cmp, Notification, DEFAULT_CAPACITY};

#[derive(Debug, Clone)]
pub enum Action {
    Add(Notification),
    Seed(Vec<Notification>),
    MarkRead(String),
    MarkAllRead,
    ClearAll,
    SetConnected(bool),
    SetError(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationState {
    pub notifications: Vec<Notification>,
    pub connected: bool,
    pub connection_error: Option<String>,
    #[serde(skip)]
    capacity: usize,
}

impl Default for NotificationState {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl NotificationState {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            notifications: Vec::new(),
            connected: false,
            connection_error: None,
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, id: &str) -> bool {
        self.notifications.iter().any(|n| n.id == id)
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    /// Presentation order. Recomputed on every call since `read` flags change
    /// independently of list order.
    pub fn display_order(&self) -> Vec<Notification> {
        let mut items = self.notifications.clone();
        items.sort_by(display_cmp);
        items
    }

    /// Functional form of [`apply`](Self::apply).
    pub fn reduce(mut self, action: Action) -> Self {
        self.apply(action);
        self
    }

    /// Applies one action in place. Returns whether the state changed.
    pub fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::Add(notification) => {
                if self.contains(&notification.id) {
                    return false;
                }
                self.notifications.insert(0, notification);
                self.notifications.truncate(self.capacity);
                true
            }
            Action::Seed(batch) => {
                let mut seen: HashSet<String> =
                    self.notifications.iter().map(|n| n.id.clone()).collect();
                let fresh: Vec<Notification> = batch
                    .into_iter()
                    .filter(|n| seen.insert(n.id.clone()))
                    .collect();
                if fresh.is_empty() {
                    return false;
                }
                self.notifications.extend(fresh);
                // Stable sort keeps arrival order for equal timestamps.
                self.notifications
                    .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                self.notifications.truncate(self.capacity);
                true
            }
            Action::MarkRead(id) => match self.notifications.iter_mut().find(|n| n.id == id) {
                Some(notification) if !notification.read => {
                    notification.read = true;
                    true
                }
                _ => false,
            },
            Action::MarkAllRead => {
                let mut changed = false;
                for notification in self.notifications.iter_mut().filter(|n| !n.read) {
                    notification.read = true;
                    changed = true;
                }
                changed
            }
            Action::ClearAll => {
                let changed = !self.notifications.is_empty();
                self.notifications.clear();
                changed
            }
            Action::SetConnected(connected) => {
                let changed = self.connected != connected
                    || (connected && self.connection_error.is_some());
                self.connected = connected;
                if connected {
                    self.connection_error = None;
                }
                changed
            }
            Action::SetError(message) => {
                if self.connection_error == message {
                    return false;
                }
                self.connection_error = message;
                true
            }
        }
    }
}

/// Cloneable handle to the single feed state. Every transition goes through
/// one `watch` sender, so readers always observe a complete state.
#[derive(Clone)]
pub struct NotificationStore {
    state: Arc<watch::Sender<NotificationState>>,
    live: Arc<AtomicBool>,
}

impl NotificationStore {
    pub fn new(capacity: usize) -> Self {
        let (state, _) = watch::channel(NotificationState::with_capacity(capacity));
        Self {
            state: Arc::new(state),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Applies `action` and wakes subscribers if it changed anything.
    /// Returns `false` for no-ops and for a closed store.
    pub fn dispatch(&self, action: Action) -> bool {
        if !self.is_live() {
            debug!(action = ?action, "store closed, dropping action");
            return false;
        }
        self.state.send_if_modified(|state| state.apply(action))
    }

    pub fn snapshot(&self) -> NotificationState {
        self.state.borrow().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state.borrow().unread_count()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    pub fn connection_error(&self) -> Option<String> {
        self.state.borrow().connection_error.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.state.subscribe()
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Stops accepting actions. Existing subscribers see the final state.
    pub fn close(&self) {
        self.live.store(false, Ordering::Release);
    }
}
