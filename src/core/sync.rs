//! Synchronization utilities for robust mutex handling
//!
//! This module provides utilities for handling mutex poisoning in a consistent
//! manner across the queue monitors and adapter backlogs.

use std::sync::{Condvar, LockResult, MutexGuard, WaitTimeoutResult};
use std::time::Duration;

/// Handle poisoned mutex cases with consistent error handling
///
/// This utility function converts mutex poison errors into application-specific
/// errors using a provided error constructor. This ensures consistent error
/// handling across the codebase when mutexes become poisoned due to panics.
///
/// # Arguments
/// * `result` - The result from a mutex lock operation
/// * `error_constructor` - Function to create the appropriate error type
///
/// # Returns
/// The mutex guard on success, or an application error on poison/failure
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use eventqueue::core::sync::handle_mutex_poison;
/// use eventqueue::queue::api::QueueError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(
///     mutex.lock(),
///     |message| QueueError::Synchronisation { message }
/// ).unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(
            format!(
                "Internal synchronisation error (mutex poisoned). This indicates a panic occurred while holding a lock. PoisonError: {:?}",
                poison_err
            )
        )
    })
}

/// Wait on a condition variable for at most `timeout`, mapping poison errors
///
/// The monitors in this crate never run foreign code while holding their
/// locks, so a poisoned wait is reported rather than recovered.
pub fn wait_timeout_or_poison<'a, T, E>(
    condvar: &Condvar,
    guard: MutexGuard<'a, T>,
    timeout: Duration,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<(MutexGuard<'a, T>, WaitTimeoutResult), E> {
    condvar.wait_timeout(guard, timeout).map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (condition wait poisoned). PoisonError: {:?}",
            poison_err
        ))
    })
}
