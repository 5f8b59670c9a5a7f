//! Explicit per-batch processing context
//!
//! Handed to [`QueueAdapter::process`](crate::queue::api::QueueAdapter::process)
//! instead of any ambient thread-local request state.

use crate::queue::monitor::ShutdownSignal;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

/// Context for one batch handed to the adapter by the consumer loop
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    queue_name: Arc<str>,
    batch_number: u64,
    consumer_thread: ThreadId,
    dequeued_at: DateTime<Utc>,
    started: Instant,
    shutdown: Arc<ShutdownSignal>,
}

impl ProcessingContext {
    pub(crate) fn new(
        queue_name: Arc<str>,
        batch_number: u64,
        consumer_thread: ThreadId,
        shutdown: Arc<ShutdownSignal>,
    ) -> Self {
        Self {
            queue_name,
            batch_number,
            consumer_thread,
            dequeued_at: Utc::now(),
            started: Instant::now(),
            shutdown,
        }
    }

    /// Context detached from any queue, for driving adapters directly in tests
    pub fn detached(queue_name: &str, batch_number: u64) -> Self {
        Self::new(
            Arc::from(queue_name),
            batch_number,
            std::thread::current().id(),
            Arc::new(ShutdownSignal::new()),
        )
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// 1-based sequence number of this batch within the queue's lifetime
    pub fn batch_number(&self) -> u64 {
        self.batch_number
    }

    pub fn consumer_thread(&self) -> ThreadId {
        self.consumer_thread
    }

    pub fn dequeued_at(&self) -> DateTime<Utc> {
        self.dequeued_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// True once `shutdown()` has been requested
    ///
    /// Long-running batches may check this to wind down early; the core never
    /// interrupts a batch in flight.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_requested()
    }
}
