//! Synchronisation primitives behind the queue lifecycle
//!
//! Three independent monitors, each private to one queue instance:
//!
//! - [`RunMonitor`]: the lifecycle state machine. `start()` and `shutdown()`
//!   transition it; the consumer thread marks it stopped on exit and wakes every
//!   `shutdown()` caller blocked on it.
//! - [`WakeSignal`]: queue availability. Producers set a one-slot pending flag;
//!   the idle consumer waits on it with a bounded timeout.
//! - [`ShutdownSignal`]: the flag the consumer loop polls between batches.

use crate::core::sync::{handle_mutex_poison, wait_timeout_or_poison};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::state::QueueState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

fn sync_error(message: String) -> QueueError {
    QueueError::Synchronisation { message }
}

#[derive(Debug)]
struct RunState {
    state: QueueState,
    /// Set once a consumer thread has been launched (or failed to launch)
    retired: bool,
}

/// How a `shutdown()` call found the run-state monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownEntry {
    /// Queue was not running; nothing to do
    NotRunning,
    /// This call moved the queue from `Running` to `ShuttingDown`
    Initiated,
    /// Another call already initiated shutdown; join the wait
    AlreadyShuttingDown,
}

/// Run-state monitor guarding the [`QueueState`] transitions
#[derive(Debug)]
pub(crate) struct RunMonitor {
    inner: Mutex<RunState>,
    changed: Condvar,
}

impl RunMonitor {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(RunState {
                state: QueueState::Stopped,
                retired: false,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> QueueResult<MutexGuard<'_, RunState>> {
        handle_mutex_poison(self.inner.lock(), sync_error)
    }

    pub(crate) fn state(&self) -> QueueResult<QueueState> {
        Ok(self.lock()?.state)
    }

    /// Fail unless the queue could be started right now
    pub(crate) fn ensure_startable(&self, queue: &str) -> QueueResult<()> {
        let run = self.lock()?;
        Self::check_startable(&run, queue)
    }

    fn check_startable(run: &RunState, queue: &str) -> QueueResult<()> {
        if run.state != QueueState::Stopped {
            return Err(QueueError::IllegalLifecycleState {
                queue: queue.to_string(),
                operation: "start",
                state: run.state,
            });
        }
        if run.retired {
            return Err(QueueError::Retired {
                queue: queue.to_string(),
            });
        }
        Ok(())
    }

    /// `Stopped -> Running`; the queue is retired from this point on
    pub(crate) fn mark_running(&self, queue: &str) -> QueueResult<()> {
        let mut run = self.lock()?;
        Self::check_startable(&run, queue)?;
        run.state = QueueState::Running;
        run.retired = true;
        self.changed.notify_all();
        Ok(())
    }

    /// Record the shutdown request and report how this caller should proceed
    pub(crate) fn begin_shutdown(&self) -> QueueResult<ShutdownEntry> {
        let mut run = self.lock()?;
        let entry = match run.state {
            QueueState::Stopped => ShutdownEntry::NotRunning,
            QueueState::Running => {
                run.state = QueueState::ShuttingDown;
                ShutdownEntry::Initiated
            }
            QueueState::ShuttingDown => ShutdownEntry::AlreadyShuttingDown,
        };
        Ok(entry)
    }

    /// Final transition, made by the consumer thread after cleanup
    ///
    /// Recovers a poisoned lock: waiters in `shutdown()` must always be released.
    pub(crate) fn mark_stopped(&self) {
        let mut run = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        run.state = QueueState::Stopped;
        self.changed.notify_all();
    }

    /// Block for at most `timeout` waiting for the state to reach `Stopped`
    ///
    /// Returns true once stopped.
    pub(crate) fn wait_stopped(&self, timeout: Duration) -> QueueResult<bool> {
        let deadline = Instant::now() + timeout;
        let mut run = self.lock()?;
        while run.state != QueueState::Stopped {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let (next, _) = wait_timeout_or_poison(&self.changed, run, deadline - now, sync_error)?;
            run = next;
        }
        Ok(true)
    }
}

/// Why an idle consumer stopped waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WakeReason {
    /// A producer signalled new work
    Woken,
    /// The bounded idle wait elapsed without a signal
    TimedOut,
    /// Shutdown closed the signal
    Closed,
}

#[derive(Debug, Default)]
struct WakeState {
    pending: bool,
    closed: bool,
}

/// Queue-availability monitor
///
/// Holds at most one pending wake-up: repeated `wake()` calls while the
/// consumer is busy collapse into one. The state is two flags that are always
/// consistent, so a poisoned lock is recovered instead of reported.
#[derive(Debug, Default)]
pub(crate) struct WakeSignal {
    inner: Mutex<WakeState>,
    available: Condvar,
}

impl WakeSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, WakeState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Signal availability; returns false if a wake-up was already pending
    pub(crate) fn wake(&self) -> bool {
        let mut wake = self.lock();
        let fresh = !wake.pending;
        wake.pending = true;
        self.available.notify_one();
        fresh
    }

    /// Release the consumer permanently; later waits return immediately
    pub(crate) fn close(&self) {
        let mut wake = self.lock();
        wake.closed = true;
        self.available.notify_all();
    }

    /// Wait up to `timeout` for a wake-up, consuming it
    pub(crate) fn wait(&self, timeout: Duration) -> WakeReason {
        let deadline = Instant::now() + timeout;
        let mut wake = self.lock();
        loop {
            if wake.closed {
                return WakeReason::Closed;
            }
            if wake.pending {
                wake.pending = false;
                return WakeReason::Woken;
            }
            let now = Instant::now();
            if now >= deadline {
                return WakeReason::TimedOut;
            }
            wake = match self.available.wait_timeout(wake, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        self.lock().pending
    }
}

/// Shutdown-state flag polled by the consumer loop
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    requested: AtomicBool,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Set the flag; returns true for the first caller only
    pub(crate) fn request(&self) -> bool {
        !self.requested.swap(true, Ordering::AcqRel)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}
