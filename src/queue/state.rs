//! Lifecycle state of a queue instance

use strum_macros::{Display, EnumString};

/// Lifecycle state of an [`EventQueue`](crate::queue::api::EventQueue)
///
/// `Stopped --start()--> Running --shutdown()--> ShuttingDown --cleanup--> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum QueueState {
    Stopped,
    Running,
    ShuttingDown,
}

impl QueueState {
    /// Whether a consumer thread may be alive in this state
    pub fn has_consumer(self) -> bool {
        !matches!(self, QueueState::Stopped)
    }
}
