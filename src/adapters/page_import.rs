//! Site page import tracking
//!
//! Request handlers report pages discovered during a site import; the queue
//! catalogues them in the background, one site at a time, in the order the
//! pages were reported.

use crate::adapters::keyed::{build_queue, Feed, KeyedAdapter, KeyedBatch};
use crate::adapters::store::BacklogStore;
use crate::queue::api::{BatchHandler, EventQueue, QueueConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const QUEUE_NAME: &str = "page-import";

/// One page awaiting cataloguing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImport {
    pub site_id: String,
    pub page_path: String,
    pub queued_at: DateTime<Utc>,
}

impl PageImport {
    pub fn new(site_id: impl Into<String>, page_path: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            page_path: page_path.into(),
            queued_at: Utc::now(),
        }
    }
}

fn site_of(page: &PageImport) -> String {
    page.site_id.clone()
}

/// Pages of one site, keyed by site id
pub type PageImportBatch = KeyedBatch<String, PageImport>;
pub type PageImportAdapter<H> = KeyedAdapter<String, PageImport, H>;

/// Producer handle for page imports
#[derive(Clone)]
pub struct PageImportTracker {
    feed: Feed<String, PageImport>,
}

impl PageImportTracker {
    /// Create the page-import queue and the tracker producers use to feed it
    pub fn build<H>(
        config: QueueConfig,
        store: Box<dyn BacklogStore<PageImport>>,
        handler: H,
    ) -> (EventQueue<PageImportAdapter<H>>, PageImportTracker)
    where
        H: BatchHandler<PageImportBatch> + 'static,
    {
        let (queue, feed) = build_queue(QUEUE_NAME, config, store, handler, site_of, None);
        (queue, PageImportTracker { feed })
    }

    /// Record a page for `site_id`; returns the number of pages pending overall
    pub fn enqueue(&self, site_id: &str, page_path: &str) -> usize {
        self.feed
            .push(site_id.to_string(), PageImport::new(site_id, page_path))
    }

    pub fn pending(&self) -> usize {
        self.feed.backlog().len()
    }

    pub fn pending_for(&self, site_id: &str) -> usize {
        self.feed.backlog().len_for(&site_id.to_string())
    }

    /// Sites with pages waiting, in the order they will be served
    pub fn sites(&self) -> Vec<String> {
        self.feed.backlog().keys()
    }
}
