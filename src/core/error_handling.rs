//! Generic error handling utilities
//!
//! Provides unified error reporting that works across the queue, adapter and
//! configuration error types while keeping user-actionable messages intact.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// User-actionable errors (lifecycle misuse, bad configuration) show their
/// specific message. System errors (I/O, poisoned locks, thread spawn failures)
/// show the operation context, with the detail logged at debug level.
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)`; otherwise it should return `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error carries a message the operator can act on
    fn is_user_actionable(&self) -> bool;

    /// Returns the specific user message if this is a user-actionable error
    fn user_message(&self) -> Option<&str>;
}

/// Log errors with appropriate detail level based on error specificity
///
/// # Examples
/// ```rust,no_run
/// # use eventqueue::core::error_handling::log_error_with_context;
/// # use eventqueue::app::config::ConfigError;
/// let err = ConfigError::Invalid { message: "idle_wait_ms must be greater than 0".to_string() };
/// log_error_with_context(&err, "Loading configuration");
/// // Logs: "FATAL: idle_wait_ms must be greater than 0"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    log::error!("FATAL: {}", primary_message(error, operation_context));
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}

/// Log a non-fatal error that the caller has contained (for example a failed
/// batch inside the consumer loop)
pub fn log_contained_error<E: std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    log::error!("{}: {}", operation_context, error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}

fn primary_message<'a, E: ContextualError>(error: &'a E, operation_context: &'a str) -> &'a str {
    if error.is_user_actionable() {
        error.user_message().unwrap_or(operation_context)
    } else {
        operation_context
    }
}
