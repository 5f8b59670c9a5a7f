//! Test modules for the event queue engine
//!
//! Suites are organised by behaviour; `support` holds the recording adapter
//! fixture they share.

mod support;
