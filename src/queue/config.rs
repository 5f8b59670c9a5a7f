//! Per-queue tuning
//!
//! [`QueueConfig`] is the validated form the engine uses. [`QueueSettings`] is
//! its serde-friendly counterpart read from TOML, with durations in
//! milliseconds.

use crate::core::validation::{validate_not_longer, validate_positive_count, validate_positive_millis};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_IDLE_WAIT_MS: u64 = 1_000;
const DEFAULT_SHUTDOWN_POLL_MS: u64 = 100;
const DEFAULT_SHUTDOWN_WARN_MS: u64 = 10_000;
const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// What `shutdown()` does when the consumer does not finish in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownEscalation {
    /// Keep polling forever, logging a warning every `shutdown_warn_after`
    #[default]
    KeepWaiting,
    /// Give up after `after` and return `QueueError::ShutdownAbandoned`; the
    /// consumer thread is left to finish on its own
    Abandon { after: Duration },
}

/// Validated queue configuration
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Longest an idle consumer sleeps before polling the adapter again
    pub idle_wait: Duration,
    /// Interval at which `shutdown()` re-checks the run state
    pub shutdown_poll_interval: Duration,
    /// How long `shutdown()` waits before logging that the consumer is stuck
    pub shutdown_warn_after: Duration,
    pub escalation: ShutdownEscalation,
    /// Upper bound on items per batch for the bundled adapters
    pub max_batch_size: usize,
    /// Whether the bundled adapters re-append a batch whose handler failed
    pub requeue_on_failure: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            idle_wait: Duration::from_millis(DEFAULT_IDLE_WAIT_MS),
            shutdown_poll_interval: Duration::from_millis(DEFAULT_SHUTDOWN_POLL_MS),
            shutdown_warn_after: Duration::from_millis(DEFAULT_SHUTDOWN_WARN_MS),
            escalation: ShutdownEscalation::KeepWaiting,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            requeue_on_failure: false,
        }
    }
}

impl QueueConfig {
    pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait = idle_wait;
        self
    }

    pub fn with_shutdown_poll_interval(mut self, interval: Duration) -> Self {
        self.shutdown_poll_interval = interval;
        self
    }

    pub fn with_shutdown_warn_after(mut self, warn_after: Duration) -> Self {
        self.shutdown_warn_after = warn_after;
        self
    }

    pub fn with_escalation(mut self, escalation: ShutdownEscalation) -> Self {
        self.escalation = escalation;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn with_requeue_on_failure(mut self, requeue: bool) -> Self {
        self.requeue_on_failure = requeue;
        self
    }
}

/// Escalation policy as written in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationSetting {
    #[default]
    KeepWaiting,
    Abandon,
}

/// Raw queue settings as read from TOML
///
/// ```toml
/// idle_wait_ms = 500
/// shutdown_poll_ms = 100
/// shutdown_warn_ms = 5000
/// escalation = "abandon"
/// abandon_after_ms = 30000
/// max_batch_size = 50
/// requeue_on_failure = true
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueSettings {
    pub idle_wait_ms: u64,
    pub shutdown_poll_ms: u64,
    pub shutdown_warn_ms: u64,
    pub escalation: EscalationSetting,
    pub abandon_after_ms: Option<u64>,
    pub max_batch_size: usize,
    pub requeue_on_failure: bool,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            idle_wait_ms: DEFAULT_IDLE_WAIT_MS,
            shutdown_poll_ms: DEFAULT_SHUTDOWN_POLL_MS,
            shutdown_warn_ms: DEFAULT_SHUTDOWN_WARN_MS,
            escalation: EscalationSetting::KeepWaiting,
            abandon_after_ms: None,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            requeue_on_failure: false,
        }
    }
}

impl QueueSettings {
    /// Validate and convert into the engine's configuration
    pub fn into_config(self) -> Result<QueueConfig, String> {
        let idle_wait = validate_positive_millis("idle_wait_ms", self.idle_wait_ms)?;
        let poll = validate_positive_millis("shutdown_poll_ms", self.shutdown_poll_ms)?;
        let warn_after = validate_positive_millis("shutdown_warn_ms", self.shutdown_warn_ms)?;
        validate_not_longer("shutdown_poll_ms", poll, "shutdown_warn_ms", warn_after)?;
        let max_batch_size = validate_positive_count("max_batch_size", self.max_batch_size)?;

        let escalation = match (self.escalation, self.abandon_after_ms) {
            (EscalationSetting::KeepWaiting, None) => ShutdownEscalation::KeepWaiting,
            (EscalationSetting::KeepWaiting, Some(_)) => {
                return Err(
                    "abandon_after_ms is only valid with escalation = \"abandon\"".to_string(),
                )
            }
            (EscalationSetting::Abandon, None) => {
                return Err("escalation = \"abandon\" requires abandon_after_ms".to_string())
            }
            (EscalationSetting::Abandon, Some(ms)) => {
                let after = validate_positive_millis("abandon_after_ms", ms)?;
                validate_not_longer("shutdown_poll_ms", poll, "abandon_after_ms", after)?;
                ShutdownEscalation::Abandon { after }
            }
        };

        Ok(QueueConfig {
            idle_wait,
            shutdown_poll_interval: poll,
            shutdown_warn_after: warn_after,
            escalation,
            max_batch_size,
            requeue_on_failure: self.requeue_on_failure,
        })
    }
}
