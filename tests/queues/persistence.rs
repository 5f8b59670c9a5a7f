//! Backlog recovery across restarts with on-disk stores

use crate::common::{item_count, quick_config, recording_handler, wait_until};
use eventqueue::adapters::content_change::{
    ChangeKey, ChangeKind, ContentChange, ContentChangeTracker,
};
use eventqueue::adapters::page_import::{PageImport, PageImportBatch, PageImportTracker};
use eventqueue::adapters::search_index::{
    IndexOperation, IndexRequest, SearchIndexQueue,
};
use eventqueue::adapters::store::{BacklogStore, JsonFileStore};
use eventqueue::queue::api::{AdapterResult, ProcessingContext, QueueError};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn never_done(_batch: &PageImportBatch, ctx: &ProcessingContext) -> AdapterResult<()> {
    // Holds the first batch until shutdown so the rest stays in the backlog
    while !ctx.is_shutdown_requested() {
        std::thread::sleep(Duration::from_millis(2));
    }
    Ok(())
}

#[test]
fn test_undelivered_pages_survive_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("page-import.json");

    {
        let (queue, tracker) = PageImportTracker::build(
            quick_config().with_max_batch_size(1),
            Box::new(JsonFileStore::new(&path)),
            never_done,
        );
        queue.start().unwrap();
        tracker.enqueue("A", "/first");
        tracker.enqueue("A", "/second");
        tracker.enqueue("B", "/third");
        assert!(wait_until(Duration::from_secs(2), || tracker.pending() == 2));
        queue.shutdown().unwrap();
    }

    let mut store: JsonFileStore<PageImport> = JsonFileStore::new(&path);
    let saved: Vec<String> = store
        .load()
        .unwrap()
        .into_iter()
        .map(|p| p.page_path)
        .collect();
    assert_eq!(saved.len(), 2);
    assert!(saved.contains(&"/second".to_string()));
    assert!(saved.contains(&"/third".to_string()));

    let (seen, handler) = recording_handler::<String, PageImport>();
    let (queue, tracker) =
        PageImportTracker::build(quick_config(), Box::new(JsonFileStore::new(&path)), handler);
    queue.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || item_count(&seen) == 2));
    queue.shutdown().unwrap();
    assert_eq!(tracker.pending(), 0);

    // Nothing left over after a clean drain
    let mut store: JsonFileStore<PageImport> = JsonFileStore::new(&path);
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn test_recovered_changes_precede_new_ones() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("content-change.json");
    let mut store: JsonFileStore<ContentChange> = JsonFileStore::new(&path);
    store
        .save(&[ContentChange {
            site_id: "s".to_string(),
            kind: ChangeKind::Published,
            content_id: "old".to_string(),
            recorded_at: chrono::Utc::now(),
        }])
        .unwrap();

    let (seen, handler) = recording_handler::<ChangeKey, ContentChange>();
    let (queue, tracker) = ContentChangeTracker::build(
        quick_config(),
        Box::new(JsonFileStore::new(&path)),
        handler,
    );
    tracker.record("s", ChangeKind::Published, "new");
    queue.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || item_count(&seen) == 2));
    queue.shutdown().unwrap();

    let ids: Vec<String> = seen
        .lock()
        .unwrap()
        .iter()
        .flat_map(|b| b.items.iter().map(|c| c.content_id.clone()))
        .collect();
    assert_eq!(ids, vec!["old", "new"]);
}

#[test]
fn test_corrupt_backlog_fails_start_without_retiring_queue() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("page-import.json");
    fs::write(&path, "[{\"site_id\": ").unwrap();

    let (seen, handler) = recording_handler::<String, PageImport>();
    let (queue, tracker) =
        PageImportTracker::build(quick_config(), Box::new(JsonFileStore::new(&path)), handler);

    match queue.start() {
        Err(QueueError::AdapterPrepareFailure { .. }) => {}
        other => panic!("Expected AdapterPrepareFailure, got {:?}", other),
    }

    // Operator repairs the file; the same queue can now start
    fs::write(&path, "[]").unwrap();
    queue.start().unwrap();
    tracker.enqueue("A", "/after-repair");
    assert!(wait_until(Duration::from_secs(2), || item_count(&seen) == 1));
    queue.shutdown().unwrap();
}

#[test]
fn test_removal_requested_offline_replaces_saved_index_request() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("search-index.json");
    let mut store: JsonFileStore<IndexRequest> = JsonFileStore::new(&path);
    store
        .save(&[IndexRequest {
            content_id: "page-1".to_string(),
            operation: IndexOperation::Index,
            requested_at: chrono::Utc::now(),
        }])
        .unwrap();

    let (seen, handler) = recording_handler::<String, IndexRequest>();
    let (queue, index) =
        SearchIndexQueue::build(quick_config(), Box::new(JsonFileStore::new(&path)), handler);
    index.remove("page-1");
    queue.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || item_count(&seen) >= 1));
    queue.shutdown().unwrap();

    let ops: Vec<IndexOperation> = seen
        .lock()
        .unwrap()
        .iter()
        .flat_map(|b| b.items.iter().map(|r| r.operation))
        .collect();
    assert_eq!(ops, vec![IndexOperation::Remove]);
}
