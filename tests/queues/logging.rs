//! Logger initialisation used by the host
//!
//! The global logger can only be installed once per process, so everything
//! touching it runs serially in one test.

use crate::common::{quick_config, recording_handler, wait_until};
use eventqueue::adapters::page_import::{PageImport, PageImportTracker};
use eventqueue::adapters::store::MemoryStore;
use eventqueue::core::logging::{init_logging, reconfigure_logging, LogFormat, LoggingOptions};
use serial_test::serial;
use std::time::Duration;
use tempfile::TempDir;

#[test]
#[serial]
fn test_file_logging_captures_queue_lifecycle() {
    let dir = TempDir::new().unwrap();
    let options = LoggingOptions {
        level: "debug".to_string(),
        format: LogFormat::Json,
        file: Some(dir.path().join("eventqueue.log")),
        color: false,
    };
    init_logging(&options).unwrap();

    let (seen, handler) = recording_handler::<String, PageImport>();
    let (queue, tracker) =
        PageImportTracker::build(quick_config(), Box::new(MemoryStore::new()), handler);
    queue.start().unwrap();
    tracker.enqueue("A", "/logged");
    assert!(wait_until(Duration::from_secs(2), || !seen.lock().unwrap().is_empty()));
    queue.shutdown().unwrap();

    reconfigure_logging("warn").unwrap();
    assert!(reconfigure_logging("not a level [").is_err());

    log::logger().flush();
    let logged: String = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| std::fs::read_to_string(entry.path()).ok())
        .collect();
    assert!(logged.contains("page-import"));
    assert!(logged.lines().all(|line| line.starts_with('{')));
}
