//! Search re-indexing
//!
//! Content edits request an index update or removal for a content item. Only
//! the latest pending request per item is kept: indexing a page and then
//! removing it before the queue gets to it leaves a single removal.

use crate::adapters::keyed::{build_queue, Feed, KeyedAdapter, KeyedBatch};
use crate::adapters::store::BacklogStore;
use crate::queue::api::{BatchHandler, EventQueue, QueueConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub const QUEUE_NAME: &str = "search-index";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IndexOperation {
    Index,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRequest {
    pub content_id: String,
    pub operation: IndexOperation,
    pub requested_at: DateTime<Utc>,
}

fn content_of(request: &IndexRequest) -> String {
    request.content_id.clone()
}

// Keyed by content id, so any pending request is for the same item
fn supersedes(_pending: &IndexRequest, _new: &IndexRequest) -> bool {
    true
}

pub type SearchIndexBatch = KeyedBatch<String, IndexRequest>;
pub type SearchIndexAdapter<H> = KeyedAdapter<String, IndexRequest, H>;

/// Producer handle for index updates
#[derive(Clone)]
pub struct SearchIndexQueue {
    feed: Feed<String, IndexRequest>,
}

impl SearchIndexQueue {
    pub fn build<H>(
        config: QueueConfig,
        store: Box<dyn BacklogStore<IndexRequest>>,
        handler: H,
    ) -> (EventQueue<SearchIndexAdapter<H>>, SearchIndexQueue)
    where
        H: BatchHandler<SearchIndexBatch> + 'static,
    {
        let (queue, feed) = build_queue(
            QUEUE_NAME,
            config,
            store,
            handler,
            content_of,
            Some(supersedes),
        );
        (queue, SearchIndexQueue { feed })
    }

    /// Request (re-)indexing of a content item
    ///
    /// Returns false if a pending request for the item was superseded.
    pub fn index(&self, content_id: &str) -> bool {
        self.request(content_id, IndexOperation::Index)
    }

    /// Request removal of a content item from the index
    pub fn remove(&self, content_id: &str) -> bool {
        self.request(content_id, IndexOperation::Remove)
    }

    fn request(&self, content_id: &str, operation: IndexOperation) -> bool {
        let request = IndexRequest {
            content_id: content_id.to_string(),
            operation,
            requested_at: Utc::now(),
        };
        // Latest request wins
        self.feed.push_coalesced(content_id.to_string(), request)
    }

    pub fn pending(&self) -> usize {
        self.feed.backlog().len()
    }

    /// Operation currently pending for `content_id`, if any
    pub fn pending_operation(&self, content_id: &str) -> Option<IndexOperation> {
        self.feed
            .backlog()
            .snapshot()
            .into_iter()
            .find(|(key, _)| key == content_id)
            .map(|(_, request)| request.operation)
    }
}
