//! Public API for the queue system
//!
//! External modules should import from here rather than directly from internal modules.
//! See module documentation for complete usage examples and architecture details.

// Engine and lifecycle
pub use crate::queue::engine::EventQueue;
pub use crate::queue::state::QueueState;
pub use crate::queue::waker::QueueWaker;

// Adapter contract
pub use crate::queue::adapter::{BatchHandler, QueueAdapter, WorkBatch};
pub use crate::queue::backlog::KeyedBacklog;
pub use crate::queue::context::ProcessingContext;

// Configuration
pub use crate::queue::config::{EscalationSetting, QueueConfig, QueueSettings, ShutdownEscalation};

// Error handling
pub use crate::queue::error::{AdapterError, AdapterResult, QueueError, QueueResult};

// Statistics
pub use crate::queue::stats::QueueStats;
