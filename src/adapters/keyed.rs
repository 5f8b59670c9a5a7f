//! Backlog-driven adapter shared by the bundled queues
//!
//! Items sit in a [`KeyedBacklog`]; each batch is the oldest key's pending
//! items, capped at the queue's `max_batch_size`. The business logic is a
//! [`BatchHandler`] and pending items are persisted through a
//! [`BacklogStore`] across restarts.

use crate::adapters::store::BacklogStore;
use crate::queue::api::{
    AdapterError, AdapterResult, BatchHandler, EventQueue, KeyedBacklog, ProcessingContext,
    QueueAdapter, QueueConfig, QueueWaker, WorkBatch,
};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Pending items for one key, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedBatch<K, T> {
    pub key: K,
    pub items: Vec<T>,
}

/// Whether a newly pushed item supersedes a pending one under the same key
pub(crate) type Coalesce<T> = fn(&T, &T) -> bool;

impl<K, T> WorkBatch for KeyedBatch<K, T> {
    fn weight(&self) -> usize {
        self.items.len()
    }
}

/// Producer side of a keyed queue: append, then wake
pub(crate) struct Feed<K, T> {
    backlog: Arc<KeyedBacklog<K, T>>,
    waker: QueueWaker,
    coalesce: Option<Coalesce<T>>,
}

impl<K, T> Clone for Feed<K, T> {
    fn clone(&self) -> Self {
        Self {
            backlog: Arc::clone(&self.backlog),
            waker: self.waker.clone(),
            coalesce: self.coalesce,
        }
    }
}

impl<K: Eq + Hash + Clone, T> Feed<K, T> {
    pub(crate) fn new(
        backlog: Arc<KeyedBacklog<K, T>>,
        waker: QueueWaker,
        coalesce: Option<Coalesce<T>>,
    ) -> Self {
        Self {
            backlog,
            waker,
            coalesce,
        }
    }

    pub(crate) fn push(&self, key: K, item: T) -> usize {
        let pending = self.backlog.push(key, item);
        self.waker.wake();
        pending
    }

    /// Push through the queue's coalescing rule; returns false if a pending
    /// item was replaced
    pub(crate) fn push_coalesced(&self, key: K, item: T) -> bool {
        let added = merge(&self.backlog, self.coalesce, key, item);
        self.waker.wake();
        added
    }

    pub(crate) fn backlog(&self) -> &KeyedBacklog<K, T> {
        &self.backlog
    }
}

fn merge<K: Eq + Hash + Clone, T>(
    backlog: &KeyedBacklog<K, T>,
    coalesce: Option<Coalesce<T>>,
    key: K,
    item: T,
) -> bool {
    match coalesce {
        Some(same) => backlog.push_coalesced(key, item, same),
        None => {
            backlog.push(key, item);
            true
        }
    }
}

/// [`QueueAdapter`] over a keyed backlog, a store and a handler
pub struct KeyedAdapter<K, T, H> {
    kind: &'static str,
    backlog: Arc<KeyedBacklog<K, T>>,
    store: Box<dyn BacklogStore<T>>,
    handler: H,
    key_of: fn(&T) -> K,
    coalesce: Option<Coalesce<T>>,
    max_batch_size: usize,
    requeue_on_failure: bool,
    // One idle cycle after a requeue, so a failing key is not retried in a tight loop
    hold_off: bool,
}

impl<K, T, H> fmt::Debug for KeyedAdapter<K, T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedAdapter")
            .field("kind", &self.kind)
            .field("store", &self.store.describe())
            .field("max_batch_size", &self.max_batch_size)
            .field("requeue_on_failure", &self.requeue_on_failure)
            .finish_non_exhaustive()
    }
}

impl<K, T, H> KeyedAdapter<K, T, H>
where
    K: Eq + Hash + Clone + Send + Sync + fmt::Debug + 'static,
    T: Send + 'static,
    H: BatchHandler<KeyedBatch<K, T>> + 'static,
{
    pub(crate) fn new(
        kind: &'static str,
        backlog: Arc<KeyedBacklog<K, T>>,
        store: Box<dyn BacklogStore<T>>,
        handler: H,
        key_of: fn(&T) -> K,
        coalesce: Option<Coalesce<T>>,
        config: &QueueConfig,
    ) -> Self {
        Self {
            kind,
            backlog,
            store,
            handler,
            key_of,
            coalesce,
            max_batch_size: config.max_batch_size,
            requeue_on_failure: config.requeue_on_failure,
            hold_off: false,
        }
    }

    /// Number of items waiting to be handled
    pub fn pending(&self) -> usize {
        self.backlog.len()
    }
}

/// Wire a keyed adapter to a fresh queue and return the producer feed
pub(crate) fn build_queue<K, T, H>(
    kind: &'static str,
    config: QueueConfig,
    store: Box<dyn BacklogStore<T>>,
    handler: H,
    key_of: fn(&T) -> K,
    coalesce: Option<Coalesce<T>>,
) -> (EventQueue<KeyedAdapter<K, T, H>>, Feed<K, T>)
where
    K: Eq + Hash + Clone + Send + Sync + fmt::Debug + 'static,
    T: Send + 'static,
    H: BatchHandler<KeyedBatch<K, T>> + 'static,
{
    let backlog = Arc::new(KeyedBacklog::new());
    let adapter = KeyedAdapter::new(
        kind,
        Arc::clone(&backlog),
        store,
        handler,
        key_of,
        coalesce,
        &config,
    );
    let queue = EventQueue::new(kind, adapter, config);
    let feed = Feed::new(backlog, queue.waker(), coalesce);
    (queue, feed)
}

impl<K, T, H> QueueAdapter for KeyedAdapter<K, T, H>
where
    K: Eq + Hash + Clone + Send + Sync + fmt::Debug + 'static,
    T: Send + 'static,
    H: BatchHandler<KeyedBatch<K, T>> + 'static,
{
    type Batch = KeyedBatch<K, T>;

    fn prepare(&mut self) -> AdapterResult<()> {
        let recovered = self.store.load().map_err(|e| AdapterError::Recovery {
            message: format!("{} backlog from {}: {}", self.kind, self.store.describe(), e),
        })?;
        if recovered.is_empty() {
            return Ok(());
        }

        log::info!(
            "Recovered {} pending {} items from {}",
            recovered.len(),
            self.kind,
            self.store.describe()
        );

        // Recovered work is older than anything enqueued before start(), so
        // fresh items are merged over it with the producers' coalescing rule
        let fresh = self.backlog.take_all();
        for item in recovered {
            merge(&self.backlog, self.coalesce, (self.key_of)(&item), item);
        }
        for (key, item) in fresh {
            merge(&self.backlog, self.coalesce, key, item);
        }
        Ok(())
    }

    fn next_batch(&mut self) -> Option<Self::Batch> {
        if std::mem::take(&mut self.hold_off) {
            return None;
        }
        self.backlog
            .drain_next(self.max_batch_size)
            .map(|(key, items)| KeyedBatch { key, items })
    }

    fn process(&mut self, batch: Self::Batch, ctx: &ProcessingContext) -> AdapterResult<()> {
        match self.handler.handle(&batch, ctx) {
            Ok(()) => Ok(()),
            Err(e) if self.requeue_on_failure => {
                log::debug!(
                    "Requeueing {} {} items for {:?} after failure",
                    batch.items.len(),
                    self.kind,
                    batch.key
                );
                self.backlog.requeue_front(batch.key, batch.items);
                self.hold_off = true;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn cleanup(&mut self) -> AdapterResult<()> {
        let (keys, remaining): (Vec<K>, Vec<T>) = self.backlog.take_all().into_iter().unzip();

        if !remaining.is_empty() {
            log::info!(
                "Persisting {} undelivered {} items to {}",
                remaining.len(),
                self.kind,
                self.store.describe()
            );
        }

        if let Err(e) = self.store.save(&remaining) {
            // Unsaved items stay in the backlog
            restore(&self.backlog, keys.into_iter().zip(remaining).collect());
            return Err(AdapterError::Cleanup {
                message: format!("{} backlog to {}: {}", self.kind, self.store.describe(), e),
            });
        }
        Ok(())
    }
}

/// Put items taken with `take_all` back at the head of the backlog in their
/// original service order
fn restore<K: Eq + Hash + Clone, T>(backlog: &KeyedBacklog<K, T>, taken: Vec<(K, T)>) {
    let mut runs: Vec<(K, Vec<T>)> = Vec::new();
    for (key, item) in taken {
        match runs.last_mut() {
            Some((last, items)) if *last == key => items.push(item),
            _ => runs.push((key, vec![item])),
        }
    }
    for (key, items) in runs.into_iter().rev() {
        backlog.requeue_front(key, items);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::MemoryStore;

    fn first_char(item: &String) -> char {
        item.chars().next().unwrap_or('?')
    }

    fn adapter_with<H>(
        store: MemoryStore<String>,
        handler: H,
        config: QueueConfig,
    ) -> (KeyedAdapter<char, String, H>, Arc<KeyedBacklog<char, String>>)
    where
        H: BatchHandler<KeyedBatch<char, String>> + 'static,
    {
        let backlog = Arc::new(KeyedBacklog::new());
        let adapter = KeyedAdapter::new(
            "test",
            Arc::clone(&backlog),
            Box::new(store),
            handler,
            first_char,
            None,
            &config,
        );
        (adapter, backlog)
    }

    fn same_item(pending: &String, new: &String) -> bool {
        pending == new
    }

    fn supersedes(_pending: &String, _new: &String) -> bool {
        true
    }

    fn accept(_batch: &KeyedBatch<char, String>, _ctx: &ProcessingContext) -> AdapterResult<()> {
        Ok(())
    }

    fn reject(_batch: &KeyedBatch<char, String>, _ctx: &ProcessingContext) -> AdapterResult<()> {
        Err(AdapterError::processing("downstream unavailable"))
    }

    #[test]
    fn test_prepare_puts_recovered_items_ahead_of_fresh_ones() {
        let store = MemoryStore::with_items(vec!["a-old".to_string()]);
        let (mut adapter, backlog) = adapter_with(store, accept, QueueConfig::default());
        backlog.push('a', "a-new".to_string());

        adapter.prepare().unwrap();

        let batch = adapter.next_batch().unwrap();
        assert_eq!(batch.key, 'a');
        assert_eq!(batch.items, vec!["a-old", "a-new"]);
        assert_eq!(batch.weight(), 2);
    }

    #[test]
    fn test_batches_respect_max_batch_size() {
        let config = QueueConfig::default().with_max_batch_size(2);
        let (mut adapter, backlog) = adapter_with(MemoryStore::new(), accept, config);
        for item in ["a1", "a2", "a3"] {
            backlog.push('a', item.to_string());
        }

        assert_eq!(adapter.next_batch().unwrap().items, vec!["a1", "a2"]);
        assert_eq!(adapter.next_batch().unwrap().items, vec!["a3"]);
        assert!(adapter.next_batch().is_none());
    }

    #[test]
    fn test_failed_batch_is_dropped_without_requeue() {
        let (mut adapter, backlog) = adapter_with(MemoryStore::new(), reject, QueueConfig::default());
        backlog.push('a', "a1".to_string());

        let batch = adapter.next_batch().unwrap();
        let ctx = ProcessingContext::detached("test", 1);
        assert!(adapter.process(batch, &ctx).is_err());
        assert_eq!(adapter.pending(), 0);
    }

    #[test]
    fn test_failed_batch_requeued_after_one_idle_cycle() {
        let config = QueueConfig::default().with_requeue_on_failure(true);
        let (mut adapter, backlog) = adapter_with(MemoryStore::new(), reject, config);
        backlog.push('a', "a1".to_string());
        backlog.push('b', "b1".to_string());

        let batch = adapter.next_batch().unwrap();
        let ctx = ProcessingContext::detached("test", 1);
        assert!(adapter.process(batch, &ctx).is_err());

        assert_eq!(adapter.pending(), 2);
        assert!(adapter.next_batch().is_none());
        let retried = adapter.next_batch().unwrap();
        assert_eq!(retried.key, 'a');
        assert_eq!(retried.items, vec!["a1"]);
    }

    #[test]
    fn test_cleanup_persists_remaining_items_in_service_order() {
        let store = MemoryStore::new();
        let (mut adapter, backlog) = adapter_with(store.clone(), accept, QueueConfig::default());
        backlog.push('b', "b1".to_string());
        backlog.push('a', "a1".to_string());
        backlog.push('b', "b2".to_string());

        adapter.cleanup().unwrap();

        assert_eq!(store.contents(), vec!["b1", "b2", "a1"]);
        assert_eq!(adapter.pending(), 0);
    }

    #[test]
    fn test_feed_wakes_after_every_append() {
        let backlog = Arc::new(KeyedBacklog::new());
        let feed = Feed::new(
            Arc::clone(&backlog),
            QueueWaker::detached(),
            Some(same_item),
        );

        assert_eq!(feed.push('a', "a1".to_string()), 1);
        assert!(!feed.push_coalesced('a', "a1".to_string()));
        assert!(feed.push_coalesced('a', "a2".to_string()));
        assert_eq!(feed.backlog().len(), 2);
    }

    #[test]
    fn test_feed_without_rule_always_appends() {
        let backlog = Arc::new(KeyedBacklog::new());
        let feed = Feed::new(Arc::clone(&backlog), QueueWaker::detached(), None);

        assert!(feed.push_coalesced('a', "a1".to_string()));
        assert!(feed.push_coalesced('a', "a1".to_string()));
        assert_eq!(backlog.len(), 2);
    }

    #[test]
    fn test_prepare_coalesces_fresh_items_over_recovered_ones() {
        let store = MemoryStore::with_items(vec!["a-old".to_string(), "b-old".to_string()]);
        let backlog = Arc::new(KeyedBacklog::new());
        let mut adapter = KeyedAdapter::new(
            "test",
            Arc::clone(&backlog),
            Box::new(store),
            accept,
            first_char,
            Some(supersedes),
            &QueueConfig::default(),
        );
        backlog.push('a', "a-new".to_string());

        adapter.prepare().unwrap();

        assert_eq!(adapter.pending(), 2);
        let first = adapter.next_batch().unwrap();
        assert_eq!(first.key, 'a');
        assert_eq!(first.items, vec!["a-new"]);
        assert_eq!(adapter.next_batch().unwrap().items, vec!["b-old"]);
    }

    /// Store whose saves always fail
    struct ReadOnlyStore;

    impl BacklogStore<String> for ReadOnlyStore {
        fn load(&mut self) -> AdapterResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn save(&mut self, _items: &[String]) -> AdapterResult<()> {
            Err(AdapterError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only filesystem",
            )))
        }

        fn describe(&self) -> String {
            "read-only".to_string()
        }
    }

    #[test]
    fn test_failed_save_keeps_items_in_backlog() {
        let backlog = Arc::new(KeyedBacklog::new());
        let mut adapter = KeyedAdapter::new(
            "test",
            Arc::clone(&backlog),
            Box::new(ReadOnlyStore),
            accept,
            first_char,
            None,
            &QueueConfig::default(),
        );
        backlog.push('b', "b1".to_string());
        backlog.push('a', "a1".to_string());
        backlog.push('b', "b2".to_string());

        match adapter.cleanup() {
            Err(AdapterError::Cleanup { message }) => assert!(message.contains("read-only")),
            other => panic!("Expected Cleanup error, got {:?}", other),
        }

        assert_eq!(adapter.pending(), 3);
        assert_eq!(
            backlog.snapshot(),
            vec![
                ('b', "b1".to_string()),
                ('b', "b2".to_string()),
                ('a', "a1".to_string())
            ]
        );
    }
}
