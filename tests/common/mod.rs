//! Common test utilities and helpers
//!
//! Shared configuration, polling and batch-recording helpers for the
//! integration suites.

#![allow(dead_code)]

use eventqueue::adapters::keyed::KeyedBatch;
use eventqueue::queue::api::{AdapterResult, ProcessingContext, QueueConfig};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Queue configuration with short waits so tests finish quickly
pub fn quick_config() -> QueueConfig {
    QueueConfig::default()
        .with_idle_wait(Duration::from_millis(20))
        .with_shutdown_poll_interval(Duration::from_millis(5))
        .with_shutdown_warn_after(Duration::from_secs(1))
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Batches a handler has seen, shared with the test body
pub type Seen<K, T> = Arc<Mutex<Vec<KeyedBatch<K, T>>>>;

/// Handler that records every batch it receives
pub fn recording_handler<K, T>(
) -> (
    Seen<K, T>,
    impl FnMut(&KeyedBatch<K, T>, &ProcessingContext) -> AdapterResult<()> + Send + 'static,
)
where
    K: Clone + Send + 'static,
    T: Clone + Send + 'static,
{
    let seen: Seen<K, T> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler = move |batch: &KeyedBatch<K, T>, _ctx: &ProcessingContext| -> AdapterResult<()> {
        sink.lock().unwrap().push(batch.clone());
        Ok(())
    };
    (seen, handler)
}

/// Total items across recorded batches
pub fn item_count<K, T>(seen: &Seen<K, T>) -> usize {
    seen.lock().unwrap().iter().map(|b| b.items.len()).sum()
}
