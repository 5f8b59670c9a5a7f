//! Producer handles feeding running queues

use crate::common::{item_count, quick_config, recording_handler, wait_until};
use eventqueue::adapters::content_change::{
    ChangeKey, ChangeKind, ContentChange, ContentChangeTracker,
};
use eventqueue::adapters::page_import::{PageImport, PageImportBatch, PageImportTracker};
use eventqueue::adapters::search_index::{IndexOperation, IndexRequest, SearchIndexQueue};
use eventqueue::adapters::store::MemoryStore;
use eventqueue::queue::api::{AdapterError, AdapterResult, ProcessingContext, QueueState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_page_imports_catalogued_per_site_in_order() {
    let (seen, handler) = recording_handler::<String, PageImport>();
    let (queue, tracker) =
        PageImportTracker::build(quick_config(), Box::new(MemoryStore::new()), handler);
    queue.start().unwrap();

    tracker.enqueue("A", "/one");
    tracker.enqueue("A", "/two");
    tracker.enqueue("A", "/three");

    assert!(wait_until(Duration::from_secs(2), || item_count(&seen) == 3));
    queue.shutdown().unwrap();

    let paths: Vec<String> = seen
        .lock()
        .unwrap()
        .iter()
        .flat_map(|batch| batch.items.iter().map(|p| p.page_path.clone()))
        .collect();
    assert_eq!(paths, vec!["/one", "/two", "/three"]);
    assert!(seen.lock().unwrap().iter().all(|b| b.key == "A"));
    assert_eq!(tracker.pending(), 0);
}

#[test]
fn test_trackers_are_shared_across_producer_threads() {
    let (seen, handler) = recording_handler::<ChangeKey, ContentChange>();
    let (queue, tracker) =
        ContentChangeTracker::build(quick_config(), Box::new(MemoryStore::new()), handler);
    queue.start().unwrap();

    let producers: Vec<_> = ["site-a", "site-b", "site-c"]
        .into_iter()
        .map(|site| {
            let tracker = tracker.clone();
            thread::spawn(move || {
                for n in 0..20 {
                    tracker.record(site, ChangeKind::Updated, &format!("page-{}", n));
                }
            })
        })
        .collect();
    for handle in producers {
        handle.join().unwrap();
    }

    assert!(wait_until(Duration::from_secs(2), || item_count(&seen) == 60));
    queue.shutdown().unwrap();
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .all(|batch| batch.items.iter().all(|c| c.site_id == batch.key.site_id)));
}

#[test]
fn test_search_index_delivers_latest_operation() {
    let (seen, handler) = recording_handler::<String, IndexRequest>();
    let (queue, index) =
        SearchIndexQueue::build(quick_config(), Box::new(MemoryStore::new()), handler);

    // Coalesced before the consumer exists
    index.index("page-1");
    index.remove("page-1");
    index.index("page-2");
    queue.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || item_count(&seen) == 2));
    queue.shutdown().unwrap();

    let delivered: Vec<(String, IndexOperation)> = seen
        .lock()
        .unwrap()
        .iter()
        .flat_map(|b| b.items.iter().map(|r| (r.content_id.clone(), r.operation)))
        .collect();
    assert_eq!(
        delivered,
        vec![
            ("page-1".to_string(), IndexOperation::Remove),
            ("page-2".to_string(), IndexOperation::Index)
        ]
    );
}

#[test]
fn test_failed_batch_requeued_when_configured() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let handler = move |_batch: &PageImportBatch,
                        _ctx: &ProcessingContext|
          -> AdapterResult<()> {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(AdapterError::processing("catalogue offline"));
        }
        Ok(())
    };
    let config = quick_config().with_requeue_on_failure(true);
    let (queue, tracker) = PageImportTracker::build(config, Box::new(MemoryStore::new()), handler);
    queue.start().unwrap();

    tracker.enqueue("A", "/retry-me");

    assert!(wait_until(Duration::from_secs(2), || {
        queue.stats().batches_processed == 1
    }));
    let stats = queue.stats();
    assert_eq!(stats.batch_failures, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(tracker.pending(), 0);
    queue.shutdown().unwrap();
    assert_eq!(queue.state().unwrap(), QueueState::Stopped);
}
