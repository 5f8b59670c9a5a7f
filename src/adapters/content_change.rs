//! Content change tracking
//!
//! Changes are grouped by site and change kind, so downstream consumers
//! (sitemaps, caches, feeds) receive one batch per site per kind. Repeated
//! changes to the same content item within a pending group collapse.

use crate::adapters::keyed::{build_queue, Feed, KeyedAdapter, KeyedBatch};
use crate::adapters::store::BacklogStore;
use crate::queue::api::{BatchHandler, EventQueue, QueueConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumIter, EnumString};

pub const QUEUE_NAME: &str = "content-change";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    Published,
}

/// Group a change belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeKey {
    pub site_id: String,
    pub kind: ChangeKind,
}

impl fmt::Display for ChangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.site_id, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChange {
    pub site_id: String,
    pub kind: ChangeKind,
    pub content_id: String,
    pub recorded_at: DateTime<Utc>,
}

impl ContentChange {
    pub fn key(&self) -> ChangeKey {
        ChangeKey {
            site_id: self.site_id.clone(),
            kind: self.kind,
        }
    }
}

fn same_content(pending: &ContentChange, new: &ContentChange) -> bool {
    pending.content_id == new.content_id
}

pub type ContentChangeBatch = KeyedBatch<ChangeKey, ContentChange>;
pub type ContentChangeAdapter<H> = KeyedAdapter<ChangeKey, ContentChange, H>;

/// Producer handle for content changes
#[derive(Clone)]
pub struct ContentChangeTracker {
    feed: Feed<ChangeKey, ContentChange>,
}

impl ContentChangeTracker {
    pub fn build<H>(
        config: QueueConfig,
        store: Box<dyn BacklogStore<ContentChange>>,
        handler: H,
    ) -> (EventQueue<ContentChangeAdapter<H>>, ContentChangeTracker)
    where
        H: BatchHandler<ContentChangeBatch> + 'static,
    {
        let (queue, feed) = build_queue(
            QUEUE_NAME,
            config,
            store,
            handler,
            ContentChange::key,
            Some(same_content),
        );
        (queue, ContentChangeTracker { feed })
    }

    /// Record a change; returns false if the item already had a pending change
    /// of this kind
    pub fn record(&self, site_id: &str, kind: ChangeKind, content_id: &str) -> bool {
        let change = ContentChange {
            site_id: site_id.to_string(),
            kind,
            content_id: content_id.to_string(),
            recorded_at: Utc::now(),
        };
        self.feed.push_coalesced(change.key(), change)
    }

    pub fn pending(&self) -> usize {
        self.feed.backlog().len()
    }

    pub fn pending_for(&self, site_id: &str, kind: ChangeKind) -> usize {
        self.feed.backlog().len_for(&ChangeKey {
            site_id: site_id.to_string(),
            kind,
        })
    }
}
