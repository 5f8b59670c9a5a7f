//! Producer-side wake handle

use crate::queue::engine::Shared;
use std::fmt;
use std::sync::Arc;

/// Cheap, cloneable handle producers use to rouse an idle consumer
///
/// Waking never blocks beyond a short critical section and never queues more
/// than one pending wake-up, so producers may call it after every append.
#[derive(Clone)]
pub struct QueueWaker {
    shared: Arc<Shared>,
}

impl QueueWaker {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Waker attached to no queue; waking it has no observable effect
    ///
    /// Lets adapter producer handles be exercised without a running engine.
    pub fn detached() -> Self {
        Self::new(Arc::new(Shared::new()))
    }

    pub fn wake(&self) {
        self.shared.counters.record_wake_signal();
        if !self.shared.wake.wake() {
            log::trace!("Wake-up already pending; signal collapsed");
        }
    }
}

impl fmt::Debug for QueueWaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueWaker").finish_non_exhaustive()
    }
}
