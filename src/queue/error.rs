//! Queue Error Types

use crate::queue::state::QueueState;
use std::time::Duration;

/// Errors surfaced synchronously by the queue lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Cannot {operation} queue '{queue}' while it is {state}")]
    IllegalLifecycleState {
        queue: String,
        operation: &'static str,
        state: QueueState,
    },

    #[error("Queue '{queue}' has already been shut down and cannot be restarted")]
    Retired { queue: String },

    #[error("Adapter prepare failed for queue '{queue}': {source}")]
    AdapterPrepareFailure {
        queue: String,
        #[source]
        source: AdapterError,
    },

    #[error("Failed to spawn consumer thread for queue '{queue}': {source}")]
    SpawnFailed {
        queue: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Shutdown of queue '{queue}' abandoned after waiting {waited:?}")]
    ShutdownAbandoned { queue: String, waited: Duration },

    #[error("Internal synchronisation error: {message}")]
    Synchronisation { message: String },
}

impl QueueError {
    /// True for errors caused by calling lifecycle operations out of order
    pub fn is_lifecycle_violation(&self) -> bool {
        matches!(
            self,
            QueueError::IllegalLifecycleState { .. } | QueueError::Retired { .. }
        )
    }
}

impl crate::core::error_handling::ContextualError for QueueError {
    fn is_user_actionable(&self) -> bool {
        self.is_lifecycle_violation()
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            QueueError::IllegalLifecycleState { .. } => {
                Some("start() may only be called once, on a stopped queue")
            }
            QueueError::Retired { .. } => {
                Some("a queue that has been shut down must be replaced, not restarted")
            }
            _ => None,
        }
    }
}

/// Errors raised by adapter hooks
///
/// These never escape the consumer thread except during `start()`, where a
/// failing prepare hook is wrapped in [`QueueError::AdapterPrepareFailure`].
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Item processing failed: {message}")]
    ItemProcessing { message: String },

    #[error("Adapter cleanup failed: {message}")]
    Cleanup { message: String },

    #[error("Backlog recovery failed: {message}")]
    Recovery { message: String },

    #[error("Adapter hook panicked: {message}")]
    Panicked { message: String },

    #[error("Backlog store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backlog store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl AdapterError {
    pub fn processing(message: impl Into<String>) -> Self {
        AdapterError::ItemProcessing {
            message: message.into(),
        }
    }

    pub fn cleanup(message: impl Into<String>) -> Self {
        AdapterError::Cleanup {
            message: message.into(),
        }
    }

    /// Build a `Panicked` error from a caught panic payload
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        AdapterError::Panicked { message }
    }
}

/// Result type for queue lifecycle operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Result type for adapter hooks
pub type AdapterResult<T> = Result<T, AdapterError>;
