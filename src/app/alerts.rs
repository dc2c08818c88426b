use anyhow::Result;
use tracing::info;

use crate::domain::notification::Notification;

/// Platform-level alert raised when a live notification lands in the feed.
///
/// Implementations must return quickly; the subscriber calls them inline and
/// only logs their failures.
pub trait Alerter: Send + Sync {
    /// Whether the operating environment currently allows alerts.
    fn permitted(&self) -> bool {
        true
    }

    fn alert(&self, notification: &Notification) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAlerter;

impl Alerter for NoopAlerter {
    fn permitted(&self) -> bool {
        false
    }

    fn alert(&self, _notification: &Notification) -> Result<()> {
        Ok(())
    }
}

/// Writes alerts to the process log, for headless deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn alert(&self, notification: &Notification) -> Result<()> {
        info!(
            notification_id = %notification.id,
            kind = %notification.notification_type,
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }
}
