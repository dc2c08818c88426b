use std::time::Duration;

use crate::domain::notification::DEFAULT_CAPACITY;

/// Classification thresholds and cold-start limits for the notification feed.
#[derive(Debug, Clone, Copy)]
pub struct FeedPolicy {
    /// Maximum number of notifications kept in the feed.
    pub capacity: usize,
    /// Orders at or above this total are reported as high-value.
    pub high_value_order_total: f64,
    /// Products at or below this stock level (but above zero) are low on stock.
    pub low_stock_threshold: i64,
    pub seed_order_limit: i64,
    pub seed_account_limit: i64,
}

impl Default for FeedPolicy {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            high_value_order_total: 10_000.0,
            low_stock_threshold: 5,
            seed_order_limit: 10,
            seed_account_limit: 5,
        }
    }
}

/// Exponential backoff schedule for re-establishing channel subscriptions.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
    pub subscribe_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
            subscribe_timeout: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// `min(base * 2^attempt, max)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}
