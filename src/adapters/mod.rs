//! Queue source adapters
//!
//! Concrete queues built on the event queue engine. Each one owns a keyed
//! backlog, exposes a cloneable producer handle that appends and wakes, and
//! persists undelivered items through a [`store::BacklogStore`].
//!
//! - [`page_import`]: pages discovered during site imports, keyed by site
//! - [`search_index`]: index/remove requests, keyed by content item
//! - [`content_change`]: content changes, keyed by site and change kind

pub mod content_change;
pub mod keyed;
pub mod page_import;
pub mod search_index;
pub mod store;
