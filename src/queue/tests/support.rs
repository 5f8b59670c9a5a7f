//! Shared fixtures for the queue test suites
//!
//! `RecordingAdapter` records every hook invocation into [`Observations`] so
//! tests can assert on ordering, thread identity and call counts.

use crate::queue::api::{
    AdapterError, AdapterResult, EventQueue, KeyedBacklog, ProcessingContext, QueueAdapter,
    QueueConfig, QueueResult, QueueWaker, WorkBatch,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// What the adapter should do with one item
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Job {
    /// Record the id as processed
    Record(u32),
    /// Return an item-processing error
    Fail(u32),
    /// Panic inside `process`
    Panic(u32),
    /// Sleep, then record the id
    Slow(u32, Duration),
    /// Block until the context reports shutdown, then record the id
    UntilShutdown(u32),
    /// Call the registered stop hook from inside `process`
    StopQueue(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct BatchSeen {
    pub key: String,
    pub batch_number: u64,
    pub thread: ThreadId,
    pub thread_name: Option<String>,
    pub size: usize,
}

pub(super) struct TestBatch {
    pub key: String,
    pub jobs: Vec<Job>,
}

impl WorkBatch for TestBatch {
    fn weight(&self) -> usize {
        self.jobs.len()
    }
}

type StopHook = Box<dyn Fn() -> QueueResult<()> + Send + Sync>;

/// Everything the adapter saw, shared with the test body
#[derive(Default)]
pub(super) struct Observations {
    pub processed: Mutex<Vec<(String, u32)>>,
    pub batches: Mutex<Vec<BatchSeen>>,
    pub events: Mutex<Vec<String>>,
    pub next_batch_calls: AtomicUsize,
    pub prepare_calls: AtomicUsize,
    pub cleanup_calls: AtomicUsize,
    /// Number of upcoming `prepare` calls that fail
    pub failing_prepares: AtomicUsize,
    pub panic_in_prepare: AtomicBool,
    pub panic_in_next_batch: AtomicBool,
    pub fail_cleanup: AtomicBool,
    pub in_flight: AtomicBool,
    pub overlapping_batches: AtomicBool,
    pub saw_shutdown_request: AtomicBool,
    pub stop_results: Mutex<Vec<bool>>,
    pub stop_hook: Mutex<Option<StopHook>>,
}

impl Observations {
    pub fn processed_ids(&self) -> Vec<u32> {
        self.processed
            .lock()
            .unwrap()
            .iter()
            .map(|(_, id)| *id)
            .collect()
    }

    pub fn processed_count(&self) -> usize {
        self.processed.lock().unwrap().len()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn cleanups(&self) -> usize {
        self.cleanup_calls.load(Ordering::SeqCst)
    }

    fn event(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

pub(super) struct RecordingAdapter {
    backlog: Arc<KeyedBacklog<String, Job>>,
    obs: Arc<Observations>,
    max_batch: usize,
}

impl QueueAdapter for RecordingAdapter {
    type Batch = TestBatch;

    fn prepare(&mut self) -> AdapterResult<()> {
        self.obs.prepare_calls.fetch_add(1, Ordering::SeqCst);
        if self.obs.panic_in_prepare.swap(false, Ordering::SeqCst) {
            panic!("prepare exploded");
        }
        let failing = self.obs.failing_prepares.load(Ordering::SeqCst);
        if failing > 0 {
            self.obs.failing_prepares.store(failing - 1, Ordering::SeqCst);
            return Err(AdapterError::Recovery {
                message: "backlog unavailable".to_string(),
            });
        }
        self.obs.event("prepare");
        Ok(())
    }

    fn next_batch(&mut self) -> Option<TestBatch> {
        self.obs.next_batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.obs.panic_in_next_batch.swap(false, Ordering::SeqCst) {
            panic!("next_batch exploded");
        }
        self.backlog
            .drain_next(self.max_batch)
            .map(|(key, jobs)| TestBatch { key, jobs })
    }

    fn process(&mut self, batch: TestBatch, ctx: &ProcessingContext) -> AdapterResult<()> {
        if self.obs.in_flight.swap(true, Ordering::SeqCst) {
            self.obs.overlapping_batches.store(true, Ordering::SeqCst);
        }
        self.obs.batches.lock().unwrap().push(BatchSeen {
            key: batch.key.clone(),
            batch_number: ctx.batch_number(),
            thread: thread::current().id(),
            thread_name: thread::current().name().map(str::to_string),
            size: batch.jobs.len(),
        });

        let result = self.run_jobs(&batch, ctx);
        self.obs.in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn cleanup(&mut self) -> AdapterResult<()> {
        self.obs.cleanup_calls.fetch_add(1, Ordering::SeqCst);
        self.obs.event("cleanup");
        if self.obs.fail_cleanup.load(Ordering::SeqCst) {
            return Err(AdapterError::cleanup("flush failed"));
        }
        Ok(())
    }
}

impl RecordingAdapter {
    fn run_jobs(&self, batch: &TestBatch, ctx: &ProcessingContext) -> AdapterResult<()> {
        for job in &batch.jobs {
            match job {
                Job::Record(id) => self.record(&batch.key, *id),
                Job::Fail(id) => {
                    self.obs.in_flight.store(false, Ordering::SeqCst);
                    return Err(AdapterError::processing(format!("job {} failed", id)));
                }
                Job::Panic(id) => {
                    self.obs.in_flight.store(false, Ordering::SeqCst);
                    panic!("job {} panicked", id);
                }
                Job::Slow(id, delay) => {
                    self.obs.event(format!("start:{}", id));
                    thread::sleep(*delay);
                    self.obs.event(format!("end:{}", id));
                    self.record(&batch.key, *id);
                }
                Job::UntilShutdown(id) => {
                    self.obs.event(format!("start:{}", id));
                    let deadline = Instant::now() + Duration::from_secs(5);
                    while !ctx.is_shutdown_requested() && Instant::now() < deadline {
                        thread::sleep(Duration::from_millis(2));
                    }
                    self.obs
                        .saw_shutdown_request
                        .store(ctx.is_shutdown_requested(), Ordering::SeqCst);
                    self.obs.event(format!("end:{}", id));
                    self.record(&batch.key, *id);
                }
                Job::StopQueue(id) => {
                    let result = match self.obs.stop_hook.lock().unwrap().as_ref() {
                        Some(stop) => stop().is_ok(),
                        None => false,
                    };
                    self.obs.stop_results.lock().unwrap().push(result);
                    self.record(&batch.key, *id);
                }
            }
        }
        Ok(())
    }

    fn record(&self, key: &str, id: u32) {
        self.obs.processed.lock().unwrap().push((key.to_string(), id));
    }
}

/// Producer side of the fixture
#[derive(Clone)]
pub(super) struct Producer {
    pub backlog: Arc<KeyedBacklog<String, Job>>,
    pub waker: QueueWaker,
}

impl Producer {
    pub fn push(&self, key: &str, job: Job) {
        self.backlog.push(key.to_string(), job);
        self.waker.wake();
    }
}

pub(super) struct Fixture {
    pub queue: Arc<EventQueue<RecordingAdapter>>,
    pub producer: Producer,
    pub obs: Arc<Observations>,
}

/// Short waits so tests finish quickly
pub(super) fn fast_config() -> QueueConfig {
    QueueConfig::default()
        .with_idle_wait(Duration::from_millis(20))
        .with_shutdown_poll_interval(Duration::from_millis(5))
        .with_shutdown_warn_after(Duration::from_millis(500))
}

pub(super) fn fixture(name: &str, config: QueueConfig) -> Fixture {
    fixture_with_batch(name, config, 100)
}

pub(super) fn fixture_with_batch(name: &str, config: QueueConfig, max_batch: usize) -> Fixture {
    let backlog = Arc::new(KeyedBacklog::new());
    let obs = Arc::new(Observations::default());
    let adapter = RecordingAdapter {
        backlog: Arc::clone(&backlog),
        obs: Arc::clone(&obs),
        max_batch,
    };
    let queue = Arc::new(EventQueue::new(name, adapter, config));
    let producer = Producer {
        backlog,
        waker: queue.waker(),
    };
    Fixture {
        queue,
        producer,
        obs,
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub(super) fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
