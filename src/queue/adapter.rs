//! Adapter contract implemented by each concrete queue
//!
//! The engine owns lifecycle and concurrency; an adapter owns the backlog and
//! decides what a batch is and how it is handled. The adapter value is moved
//! into the consumer thread on `start()`, so `next_batch`, `process` and
//! `cleanup` only ever run there. Producers reach the backlog through a
//! separate thread-safe handle the adapter shares with them.

use crate::queue::context::ProcessingContext;
use crate::queue::error::AdapterResult;

/// An opaque unit of work returned by [`QueueAdapter::next_batch`]
///
/// The engine only reads the weight, for statistics.
pub trait WorkBatch {
    /// Number of items this batch represents
    fn weight(&self) -> usize {
        1
    }
}

impl<T> WorkBatch for Vec<T> {
    fn weight(&self) -> usize {
        self.len()
    }
}

/// Hooks the engine drives from `start()`, the consumer loop and shutdown
pub trait QueueAdapter: Send + 'static {
    type Batch: WorkBatch + Send;

    /// One-time recovery before the queue is marked running
    ///
    /// Runs synchronously on the thread calling `start()`. An error aborts the
    /// start attempt and the queue stays stopped.
    fn prepare(&mut self) -> AdapterResult<()> {
        Ok(())
    }

    /// Take the next unit of work, or `None` when the backlog is empty
    ///
    /// Must not block.
    fn next_batch(&mut self) -> Option<Self::Batch>;

    /// Handle one batch
    ///
    /// Errors are logged by the engine and the loop continues. Retrying is the
    /// adapter's business, for example by re-appending to its own backlog.
    fn process(&mut self, batch: Self::Batch, ctx: &ProcessingContext) -> AdapterResult<()>;

    /// Release resources and flush durable state before the queue stops
    fn cleanup(&mut self) -> AdapterResult<()> {
        Ok(())
    }
}

/// Business logic plugged into the bundled adapters
pub trait BatchHandler<B>: Send {
    fn handle(&mut self, batch: &B, ctx: &ProcessingContext) -> AdapterResult<()>;
}

impl<B, F> BatchHandler<B> for F
where
    F: FnMut(&B, &ProcessingContext) -> AdapterResult<()> + Send,
{
    fn handle(&mut self, batch: &B, ctx: &ProcessingContext) -> AdapterResult<()> {
        self(batch, ctx)
    }
}
