//! Consumer-loop counters and their snapshot type

use crate::queue::state::QueueState;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time statistics for one queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub state: QueueState,
    /// Calls made to the adapter's `next_batch`
    pub polls: u64,
    /// Batches whose processing returned successfully
    pub batches_processed: u64,
    /// Sum of the weights of successful batches
    pub items_processed: u64,
    /// Batches whose processing failed or panicked
    pub batch_failures: u64,
    /// Wake-up calls made by producers
    pub wake_signals: u64,
    /// Idle waits ended by a wake-up
    pub wakeups: u64,
    /// Idle waits that ran to their timeout
    pub idle_timeouts: u64,
}

#[derive(Debug, Default)]
pub(crate) struct QueueCounters {
    polls: AtomicU64,
    batches_processed: AtomicU64,
    items_processed: AtomicU64,
    batch_failures: AtomicU64,
    wake_signals: AtomicU64,
    wakeups: AtomicU64,
    idle_timeouts: AtomicU64,
}

impl QueueCounters {
    pub(crate) fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, weight: usize) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.items_processed
            .fetch_add(weight as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.batch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wake_signal(&self) {
        self.wake_signals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wakeup(&self) {
        self.wakeups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_idle_timeout(&self) {
        self.idle_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, state: QueueState) -> QueueStats {
        QueueStats {
            state,
            polls: self.polls.load(Ordering::Relaxed),
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            items_processed: self.items_processed.load(Ordering::Relaxed),
            batch_failures: self.batch_failures.load(Ordering::Relaxed),
            wake_signals: self.wake_signals.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
            idle_timeouts: self.idle_timeouts.load(Ordering::Relaxed),
        }
    }
}
