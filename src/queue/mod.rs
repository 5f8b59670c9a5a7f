//! Background Event Queue Component
//!
//! A reusable single-consumer queue that moves slow or bursty work off the
//! threads that produce it. Each queue runs exactly one dedicated consumer
//! thread, drains work through a pluggable adapter, sleeps with a bounded
//! wait when there is nothing to do, and shuts down by letting the batch in
//! flight complete.
//!
//! # Overview
//!
//! - **Single consumer**: `start()` launches one thread; a second `start()`
//!   fails instead of creating another
//! - **Adapters**: subsystems plug in their own backlog and batching policy via
//!   [`QueueAdapter`](api::QueueAdapter)
//! - **Wake-ups**: producers append to the adapter's backlog and call
//!   [`QueueWaker::wake`](api::QueueWaker::wake); duplicate wakes collapse
//! - **Drain-to-completion shutdown**: `shutdown()` blocks until the current
//!   batch and the adapter's cleanup are done, polling at a bounded interval
//! - **Contained failures**: a failing or panicking batch is logged and the loop
//!   moves on
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  ┌────────────┐  ┌────────────┐
//! │ Producer A │  │ Producer B │  │ Producer C │   (request threads)
//! └─────┬──────┘  └─────┬──────┘  └─────┬──────┘
//!       │ append + wake │               │
//!       ▼               ▼               ▼
//! ┌──────────────────────────────────────────────┐
//! │   Adapter backlog (KeyedBacklog, own lock)   │
//! │   site-a: [p1, p2, p3]   site-b: [p9]        │
//! └───────────────────────┬──────────────────────┘
//!                         │ next_batch()
//! ┌───────────────────────┴──────────────────────┐
//! │ EventQueue consumer thread                   │
//! │   loop: next_batch → process → repeat        │
//! │         none → WakeSignal::wait(idle_wait)   │
//! │   exit: cleanup → RunMonitor::mark_stopped   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use eventqueue::adapters::page_import::{PageImportBatch, PageImportTracker};
//! use eventqueue::adapters::store::MemoryStore;
//! use eventqueue::queue::api::{AdapterResult, ProcessingContext, QueueConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (queue, tracker) = PageImportTracker::build(
//!     QueueConfig::default(),
//!     Box::new(MemoryStore::new()),
//!     |batch: &PageImportBatch, _ctx: &ProcessingContext| -> AdapterResult<()> {
//!         println!("cataloguing {} pages of {}", batch.items.len(), batch.key);
//!         Ok(())
//!     },
//! );
//!
//! queue.start()?;
//! tracker.enqueue("site-a", "/about");
//! queue.shutdown()?;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod backlog;
mod config;
mod context;
mod engine;
mod error;
mod monitor;
mod state;
mod stats;
mod waker;

pub mod api;

#[cfg(test)]
mod tests;
