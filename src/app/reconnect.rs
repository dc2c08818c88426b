use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::policy::ReconnectPolicy;

/// Lifecycle of one subscription group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    /// Retries exhausted. Nothing leaves this state.
    Failed,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Resubscribe after `delay`. `attempt` counts from 1.
    Retry { attempt: u32, delay: Duration },
    GiveUp,
}

/// Backoff bookkeeping for a subscription group. Owns no timers; the
/// supervisor sleeps for the delays it hands out.
#[derive(Debug)]
pub struct ReconnectController {
    policy: ReconnectPolicy,
    phase: ConnectionPhase,
    attempt: u32,
}

impl ReconnectController {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            phase: ConnectionPhase::Idle,
            attempt: 0,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Consecutive failures since the last successful connection.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns `false` once the group has failed for good.
    pub fn begin_connect(&mut self) -> bool {
        match self.phase {
            ConnectionPhase::Failed => false,
            _ => {
                self.phase = ConnectionPhase::Connecting;
                true
            }
        }
    }

    pub fn on_established(&mut self) {
        if self.attempt > 0 {
            debug!(previous_attempts = self.attempt, "subscriptions re-established");
        }
        self.phase = ConnectionPhase::Connected;
        self.attempt = 0;
    }

    pub fn on_failure(&mut self) -> RetryDecision {
        if self.phase == ConnectionPhase::Failed {
            return RetryDecision::GiveUp;
        }

        let delay = self.policy.delay_for(self.attempt);
        self.attempt += 1;

        if self.attempt >= self.policy.max_attempts {
            self.phase = ConnectionPhase::Failed;
            error!(attempts = self.attempt, "giving up on realtime subscriptions");
            return RetryDecision::GiveUp;
        }

        self.phase = ConnectionPhase::Reconnecting;
        warn!(
            attempt = self.attempt,
            max_attempts = self.policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling resubscribe"
        );
        RetryDecision::Retry {
            attempt: self.attempt,
            delay,
        }
    }

    /// Returns to `Idle` on teardown, unless already failed.
    pub fn stop(&mut self) {
        if self.phase != ConnectionPhase::Failed {
            self.phase = ConnectionPhase::Idle;
        }
    }

    pub fn reconnecting_message(&self, attempt: u32) -> String {
        format!(
            "Reconnecting… attempt {}/{}",
            attempt, self.policy.max_attempts
        )
    }

    pub fn failed_message(&self) -> String {
        format!(
            "Live updates stopped after {} failed connection attempts. Reload the dashboard to reconnect.",
            self.policy.max_attempts
        )
    }
}
