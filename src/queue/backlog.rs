//! Key-partitioned backlog shared by producers and an adapter
//!
//! Keys are served in order of first arrival; items under one key are FIFO.
//! After a partial drain the key moves to the back so one busy key cannot
//! starve the others. Every operation takes the backlog's own lock, so
//! producers may append from any thread while the consumer drains.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct BacklogInner<K, T> {
    order: VecDeque<K>,
    items: HashMap<K, VecDeque<T>>,
    total: usize,
}

impl<K, T> Default for BacklogInner<K, T> {
    fn default() -> Self {
        Self {
            order: VecDeque::new(),
            items: HashMap::new(),
            total: 0,
        }
    }
}

impl<K: Eq + Hash + Clone, T> BacklogInner<K, T> {
    fn slot(&mut self, key: K) -> &mut VecDeque<T> {
        if !self.items.contains_key(&key) {
            self.order.push_back(key.clone());
        }
        self.items.entry(key).or_default()
    }
}

/// Thread-safe keyed FIFO backlog
#[derive(Debug)]
pub struct KeyedBacklog<K, T> {
    inner: Mutex<BacklogInner<K, T>>,
}

impl<K, T> Default for KeyedBacklog<K, T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(BacklogInner::default()),
        }
    }
}

impl<K: Eq + Hash + Clone, T> KeyedBacklog<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation leaves the maps consistent before any user code runs,
    // so a poisoned lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, BacklogInner<K, T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item; returns the new total backlog size
    pub fn push(&self, key: K, item: T) -> usize {
        let mut inner = self.lock();
        inner.slot(key).push_back(item);
        inner.total += 1;
        inner.total
    }

    /// Append unless an item under the same key matches `same`, in which case
    /// that item is replaced in place
    ///
    /// Returns true if the item was added, false if it replaced an existing one.
    pub fn push_coalesced(&self, key: K, item: T, same: impl Fn(&T, &T) -> bool) -> bool {
        let mut inner = self.lock();
        let slot = inner.slot(key);
        if let Some(existing) = slot.iter_mut().find(|existing| same(&**existing, &item)) {
            *existing = item;
            return false;
        }
        slot.push_back(item);
        inner.total += 1;
        true
    }

    /// Put items back at the head of the backlog, ahead of everything else
    ///
    /// Used to retry a batch that failed: `items` keep their order and are
    /// served before newer items for the same key.
    pub fn requeue_front(&self, key: K, items: Vec<T>) {
        if items.is_empty() {
            return;
        }
        let mut inner = self.lock();
        let added = items.len();
        if inner.items.contains_key(&key) {
            inner.order.retain(|existing| existing != &key);
        }
        inner.order.push_front(key.clone());
        let slot = inner.items.entry(key).or_default();
        for item in items.into_iter().rev() {
            slot.push_front(item);
        }
        inner.total += added;
    }

    /// Remove up to `max` items for the oldest key
    pub fn drain_next(&self, max: usize) -> Option<(K, Vec<T>)> {
        let mut inner = self.lock();
        let key = inner.order.pop_front()?;
        let slot = inner.items.get_mut(&key)?;
        let take = max.max(1).min(slot.len());
        let drained: Vec<T> = slot.drain(..take).collect();
        let exhausted = slot.is_empty();
        if exhausted {
            inner.items.remove(&key);
        } else {
            inner.order.push_back(key.clone());
        }
        inner.total -= drained.len();
        Some((key, drained))
    }

    pub fn len(&self) -> usize {
        self.lock().total
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pending items for one key
    pub fn len_for(&self, key: &K) -> usize {
        self.lock().items.get(key).map_or(0, VecDeque::len)
    }

    /// Keys with pending items, in service order
    pub fn keys(&self) -> Vec<K> {
        self.lock().order.iter().cloned().collect()
    }

    /// Remove everything, returning the items in service order
    pub fn take_all(&self) -> Vec<(K, T)> {
        let mut inner = self.lock();
        let mut taken = Vec::with_capacity(inner.total);
        let order: Vec<K> = inner.order.drain(..).collect();
        for key in order {
            if let Some(items) = inner.items.remove(&key) {
                taken.extend(items.into_iter().map(|item| (key.clone(), item)));
            }
        }
        inner.total = 0;
        taken
    }

    /// Discard everything; returns how many items were dropped
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let dropped = inner.total;
        inner.order.clear();
        inner.items.clear();
        inner.total = 0;
        dropped
    }
}

impl<K: Eq + Hash + Clone, T: Clone> KeyedBacklog<K, T> {
    /// Copy of every pending item in service order
    pub fn snapshot(&self) -> Vec<(K, T)> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .flat_map(|key| {
                inner
                    .items
                    .get(key)
                    .into_iter()
                    .flatten()
                    .map(move |item| (key.clone(), item.clone()))
            })
            .collect()
    }
}
