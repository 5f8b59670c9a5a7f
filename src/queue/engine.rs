//! EventQueue - single-consumer background processing engine
//!
//! Owns the consumer thread and the lifecycle protocol. The adapter supplies
//! the work; the engine guarantees there is never more than one consumer,
//! that idle waits are bounded, that a failing batch does not kill the loop,
//! and that `shutdown()` returns only after the batch in flight and the
//! adapter's cleanup have finished.

use crate::core::error_handling::log_contained_error;
use crate::core::sync::handle_mutex_poison;
use crate::queue::adapter::{QueueAdapter, WorkBatch};
use crate::queue::config::{QueueConfig, ShutdownEscalation};
use crate::queue::context::ProcessingContext;
use crate::queue::error::{AdapterError, AdapterResult, QueueError, QueueResult};
use crate::queue::monitor::{RunMonitor, ShutdownEntry, ShutdownSignal, WakeReason, WakeSignal};
use crate::queue::state::QueueState;
use crate::queue::stats::{QueueCounters, QueueStats};
use crate::queue::waker::QueueWaker;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

/// State shared between the queue handle, its wakers and the consumer thread
pub(crate) struct Shared {
    pub(crate) run: RunMonitor,
    pub(crate) wake: WakeSignal,
    pub(crate) shutdown: Arc<ShutdownSignal>,
    pub(crate) counters: QueueCounters,
    consumer_id: OnceLock<ThreadId>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            run: RunMonitor::new(),
            wake: WakeSignal::new(),
            shutdown: Arc::new(ShutdownSignal::new()),
            counters: QueueCounters::default(),
            consumer_id: OnceLock::new(),
        }
    }
}

/// Run an adapter hook, turning a panic into an [`AdapterError::Panicked`]
fn run_guarded<T>(hook: impl FnOnce() -> AdapterResult<T>) -> AdapterResult<T> {
    catch_unwind(AssertUnwindSafe(hook)).unwrap_or_else(|payload| Err(AdapterError::from_panic(payload)))
}

fn sync_error(message: String) -> QueueError {
    QueueError::Synchronisation { message }
}

fn thread_name(queue: &str) -> String {
    let cleaned: String = queue.chars().filter(|c| !c.is_control()).collect();
    format!("eventqueue-{}", cleaned)
}

/// Single-consumer background event queue
///
/// A queue is a single-shot lifecycle object: it can be started once and shut
/// down once. Create a new instance to run the adapter's work again.
///
/// # Example
///
/// ```rust,no_run
/// use eventqueue::queue::api::{
///     AdapterResult, EventQueue, KeyedBacklog, ProcessingContext, QueueAdapter, QueueConfig,
/// };
/// use std::sync::Arc;
///
/// struct Printer {
///     backlog: Arc<KeyedBacklog<String, String>>,
/// }
///
/// impl QueueAdapter for Printer {
///     type Batch = Vec<String>;
///
///     fn next_batch(&mut self) -> Option<Vec<String>> {
///         self.backlog.drain_next(10).map(|(_, items)| items)
///     }
///
///     fn process(&mut self, batch: Vec<String>, _ctx: &ProcessingContext) -> AdapterResult<()> {
///         for line in batch {
///             println!("{}", line);
///         }
///         Ok(())
///     }
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backlog = Arc::new(KeyedBacklog::new());
/// let queue = EventQueue::new("printer", Printer { backlog: backlog.clone() }, QueueConfig::default());
/// queue.start()?;
///
/// backlog.push("site-a".to_string(), "hello".to_string());
/// queue.wake();
///
/// queue.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct EventQueue<A: QueueAdapter> {
    name: Arc<str>,
    config: QueueConfig,
    shared: Arc<Shared>,
    adapter: Mutex<Option<A>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl<A: QueueAdapter> EventQueue<A> {
    pub fn new(name: impl Into<String>, adapter: A, config: QueueConfig) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            config,
            shared: Arc::new(Shared::new()),
            adapter: Mutex::new(Some(adapter)),
            consumer: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn state(&self) -> QueueResult<QueueState> {
        self.shared.run.state()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), Ok(QueueState::Running))
    }

    /// Identity of the consumer thread, once one has been launched
    pub fn consumer_thread_id(&self) -> Option<ThreadId> {
        self.shared.consumer_id.get().copied()
    }

    /// Handle producers keep to wake the consumer after appending work
    pub fn waker(&self) -> QueueWaker {
        QueueWaker::new(Arc::clone(&self.shared))
    }

    /// Rouse the consumer if it is idle
    pub fn wake(&self) {
        self.waker().wake();
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state().unwrap_or(QueueState::Stopped);
        self.shared.counters.snapshot(state)
    }

    /// Prepare the adapter and launch the consumer thread
    ///
    /// Fails with [`QueueError::IllegalLifecycleState`] unless the queue is
    /// stopped, with [`QueueError::Retired`] once it has already run, and with
    /// [`QueueError::AdapterPrepareFailure`] if the adapter's prepare hook fails
    /// (the queue then stays stopped and `start()` may be retried).
    pub fn start(&self) -> QueueResult<()> {
        // Holding the adapter slot serialises concurrent start() calls
        let mut slot = handle_mutex_poison(self.adapter.lock(), sync_error)?;
        self.shared.run.ensure_startable(&self.name)?;

        let adapter = slot.as_mut().ok_or_else(|| QueueError::Retired {
            queue: self.name.to_string(),
        })?;

        log::debug!("Preparing adapter for queue '{}'", self.name);
        run_guarded(|| adapter.prepare()).map_err(|source| QueueError::AdapterPrepareFailure {
            queue: self.name.to_string(),
            source,
        })?;

        self.shared.run.mark_running(&self.name)?;
        let Some(adapter) = slot.take() else {
            self.shared.run.mark_stopped();
            return Err(QueueError::Retired {
                queue: self.name.to_string(),
            });
        };

        let consumer = Consumer {
            name: Arc::clone(&self.name),
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            adapter,
        };

        let spawned = thread::Builder::new()
            .name(thread_name(&self.name))
            .spawn(move || consumer.run());

        match spawned {
            Ok(handle) => {
                let _ = self.shared.consumer_id.set(handle.thread().id());
                *handle_mutex_poison(self.consumer.lock(), sync_error)? = Some(handle);
                log::info!("Queue '{}' started", self.name);
                Ok(())
            }
            Err(source) => {
                self.shared.run.mark_stopped();
                log::error!(
                    "Queue '{}' could not launch its consumer thread: {}",
                    self.name,
                    source
                );
                Err(QueueError::SpawnFailed {
                    queue: self.name.to_string(),
                    source,
                })
            }
        }
    }

    /// Stop the queue, letting the batch in flight finish
    ///
    /// Idempotent and safe to call concurrently from any thread. Returns once
    /// the consumer has left its loop and the adapter's cleanup has run. When
    /// called from the consumer thread itself it only requests shutdown.
    pub fn shutdown(&self) -> QueueResult<()> {
        match self.shared.run.begin_shutdown()? {
            ShutdownEntry::NotRunning => {
                log::debug!("Queue '{}' is not running; shutdown is a no-op", self.name);
                return Ok(());
            }
            ShutdownEntry::Initiated => log::info!("Shutting down queue '{}'", self.name),
            ShutdownEntry::AlreadyShuttingDown => {
                log::debug!("Queue '{}' already shutting down; waiting", self.name)
            }
        }

        self.shared.shutdown.request();
        self.shared.wake.close();

        if self.is_consumer_thread() {
            log::debug!(
                "Shutdown of queue '{}' requested from its consumer; not waiting",
                self.name
            );
            return Ok(());
        }

        self.await_consumer_exit()?;
        self.join_consumer();
        Ok(())
    }

    fn is_consumer_thread(&self) -> bool {
        self.consumer_thread_id() == Some(thread::current().id())
    }

    fn await_consumer_exit(&self) -> QueueResult<()> {
        let started = Instant::now();
        let mut next_warning = self.config.shutdown_warn_after;

        loop {
            if self
                .shared
                .run
                .wait_stopped(self.config.shutdown_poll_interval)?
            {
                log::debug!(
                    "Queue '{}' consumer exited after {:?}",
                    self.name,
                    started.elapsed()
                );
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= next_warning {
                log::warn!(
                    "Queue '{}' still draining after {:?}; the adapter has not finished its current batch or cleanup",
                    self.name,
                    waited
                );
                next_warning += self.config.shutdown_warn_after;
            }

            if let ShutdownEscalation::Abandon { after } = self.config.escalation {
                if waited >= after {
                    log::error!(
                        "Abandoning shutdown of queue '{}' after {:?}; consumer thread left running",
                        self.name,
                        waited
                    );
                    return Err(QueueError::ShutdownAbandoned {
                        queue: self.name.to_string(),
                        waited,
                    });
                }
            }
        }
    }

    fn join_consumer(&self) {
        let handle = match self.consumer.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Consumer thread of queue '{}' panicked", self.name);
            }
        }
    }
}

impl<A: QueueAdapter> Drop for EventQueue<A> {
    fn drop(&mut self) {
        if let Ok(state) = self.shared.run.state() {
            if state.has_consumer() {
                log::warn!(
                    "Queue '{}' dropped while {}; requesting shutdown without waiting",
                    self.name,
                    state
                );
                self.shared.shutdown.request();
                self.shared.wake.close();
            }
        }
    }
}

/// The consumer side, moved into the dedicated thread
struct Consumer<A: QueueAdapter> {
    name: Arc<str>,
    config: QueueConfig,
    shared: Arc<Shared>,
    adapter: A,
}

impl<A: QueueAdapter> Consumer<A> {
    fn run(mut self) {
        log::debug!("Consumer for queue '{}' running", self.name);
        let thread_id = thread::current().id();
        // start() may not have recorded the id yet when the first batch runs
        let _ = self.shared.consumer_id.set(thread_id);
        let mut batch_number: u64 = 0;

        while !self.shared.shutdown.is_requested() {
            self.shared.counters.record_poll();
            let adapter = &mut self.adapter;
            match catch_unwind(AssertUnwindSafe(|| adapter.next_batch())) {
                Ok(Some(batch)) => {
                    batch_number += 1;
                    self.process(batch, batch_number, thread_id);
                }
                Ok(None) => self.idle(),
                Err(payload) => {
                    log_contained_error(
                        &AdapterError::from_panic(payload),
                        &format!("Queue '{}' next_batch", self.name),
                    );
                    self.idle();
                }
            }
        }

        let adapter = &mut self.adapter;
        if let Err(e) = run_guarded(|| adapter.cleanup()) {
            log_contained_error(&e, &format!("Queue '{}' cleanup", self.name));
        }

        self.shared.run.mark_stopped();
        log::info!(
            "Queue '{}' stopped after {} batches",
            self.name,
            batch_number
        );
    }

    fn idle(&self) {
        match self.shared.wake.wait(self.config.idle_wait) {
            WakeReason::Woken => self.shared.counters.record_wakeup(),
            WakeReason::TimedOut => self.shared.counters.record_idle_timeout(),
            WakeReason::Closed => {}
        }
    }

    fn process(&mut self, batch: A::Batch, batch_number: u64, thread_id: ThreadId) {
        let weight = batch.weight();
        let ctx = ProcessingContext::new(
            Arc::clone(&self.name),
            batch_number,
            thread_id,
            Arc::clone(&self.shared.shutdown),
        );

        let adapter = &mut self.adapter;
        match run_guarded(|| adapter.process(batch, &ctx)) {
            Ok(()) => {
                self.shared.counters.record_batch(weight);
                log::trace!(
                    "Queue '{}' batch #{} ({} items) done in {:?}",
                    self.name,
                    batch_number,
                    weight,
                    ctx.elapsed()
                );
            }
            Err(e) => {
                self.shared.counters.record_failure();
                log_contained_error(
                    &e,
                    &format!(
                        "Queue '{}' batch #{} ({} items) failed",
                        self.name, batch_number, weight
                    ),
                );
            }
        }
    }
}
