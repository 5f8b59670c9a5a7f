pub mod adapters;
pub mod app;
pub mod core;
pub mod queue;
