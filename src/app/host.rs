//! Queue host: the three bundled queues wired to on-disk backlog stores
//!
//! Batch handlers here stand in for the business logic that would catalogue
//! pages, update a search index or notify change subscribers; they record what
//! they would do in the log.

use crate::adapters::content_change::{
    ContentChangeAdapter, ContentChangeBatch, ContentChangeTracker,
};
use crate::adapters::page_import::{PageImportAdapter, PageImportBatch, PageImportTracker};
use crate::adapters::search_index::{
    IndexOperation, SearchIndexAdapter, SearchIndexBatch, SearchIndexQueue,
};
use crate::adapters::store::JsonFileStore;
use crate::app::commands::Command;
use crate::app::config::QueueConfigs;
use crate::core::logging::reconfigure_logging;
use crate::core::styles::{key_value, StyleRole};
use crate::queue::api::{
    AdapterResult, EventQueue, ProcessingContext, QueueError, QueueResult, QueueStats,
};
use std::fmt::Write as _;
use std::path::Path;
use std::thread;

type Handler<B> = fn(&B, &ProcessingContext) -> AdapterResult<()>;

type PageQueue = EventQueue<PageImportAdapter<Handler<PageImportBatch>>>;
type IndexQueue = EventQueue<SearchIndexAdapter<Handler<SearchIndexBatch>>>;
type ChangeQueue = EventQueue<ContentChangeAdapter<Handler<ContentChangeBatch>>>;

fn catalogue_pages(batch: &PageImportBatch, ctx: &ProcessingContext) -> AdapterResult<()> {
    for page in &batch.items {
        log::info!(
            "[{} #{}] catalogued {}{} (queued {})",
            ctx.queue_name(),
            ctx.batch_number(),
            page.site_id,
            page.page_path,
            page.queued_at.to_rfc3339()
        );
    }
    Ok(())
}

fn update_index(batch: &SearchIndexBatch, ctx: &ProcessingContext) -> AdapterResult<()> {
    for request in &batch.items {
        let action = match request.operation {
            IndexOperation::Index => "indexed",
            IndexOperation::Remove => "removed from index",
        };
        log::info!(
            "[{} #{}] {} {}",
            ctx.queue_name(),
            ctx.batch_number(),
            request.content_id,
            action
        );
    }
    Ok(())
}

fn publish_changes(batch: &ContentChangeBatch, ctx: &ProcessingContext) -> AdapterResult<()> {
    let ids: Vec<&str> = batch
        .items
        .iter()
        .map(|change| change.content_id.as_str())
        .collect();
    log::info!(
        "[{} #{}] {} change(s) for {}: {}",
        ctx.queue_name(),
        ctx.batch_number(),
        ids.len(),
        batch.key,
        ids.join(", ")
    );
    Ok(())
}

/// Outcome of one producer command, ready to print
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply(pub String);

pub struct Host {
    pages: PageQueue,
    index: IndexQueue,
    changes: ChangeQueue,
    page_tracker: PageImportTracker,
    index_queue: SearchIndexQueue,
    change_tracker: ContentChangeTracker,
    color: bool,
}

impl Host {
    /// Build and start every queue, loading any backlog left in `state_dir`
    ///
    /// If one queue cannot start, the ones already running are shut down again.
    pub fn start(configs: QueueConfigs, state_dir: &Path, color: bool) -> QueueResult<Self> {
        let (pages, page_tracker) = PageImportTracker::build(
            configs.page_import,
            Box::new(JsonFileStore::new(state_dir.join("page-import.json"))),
            catalogue_pages as Handler<PageImportBatch>,
        );
        let (index, index_queue) = SearchIndexQueue::build(
            configs.search_index,
            Box::new(JsonFileStore::new(state_dir.join("search-index.json"))),
            update_index as Handler<SearchIndexBatch>,
        );
        let (changes, change_tracker) = ContentChangeTracker::build(
            configs.content_change,
            Box::new(JsonFileStore::new(state_dir.join("content-change.json"))),
            publish_changes as Handler<ContentChangeBatch>,
        );

        pages.start()?;
        if let Err(e) = index.start() {
            log_rollback(pages.shutdown());
            return Err(e);
        }
        if let Err(e) = changes.start() {
            log_rollback(pages.shutdown());
            log_rollback(index.shutdown());
            return Err(e);
        }

        log::info!("All queues running; backlogs in {}", state_dir.display());
        Ok(Self {
            pages,
            index,
            changes,
            page_tracker,
            index_queue,
            change_tracker,
            color,
        })
    }

    pub fn execute(&self, command: Command) -> Reply {
        match command {
            Command::Import { site_id, page_path } => {
                let pending = self.page_tracker.enqueue(&site_id, &page_path);
                Reply(format!("queued {}{} ({} pending)", site_id, page_path, pending))
            }
            Command::Index { content_id } => {
                let added = self.index_queue.index(&content_id);
                Reply(coalesced_reply("index", &content_id, added))
            }
            Command::Remove { content_id } => {
                let added = self.index_queue.remove(&content_id);
                Reply(coalesced_reply("remove", &content_id, added))
            }
            Command::Change {
                site_id,
                kind,
                content_id,
            } => {
                let added = self.change_tracker.record(&site_id, kind, &content_id);
                let label = format!("{} {}/{}", kind, site_id, content_id);
                Reply(coalesced_reply("change", &label, added))
            }
            Command::Stats => Reply(self.render_stats()),
            Command::LogLevel { level } => match reconfigure_logging(&level) {
                Ok(()) => Reply(format!("log level set to {}", level)),
                Err(e) => Reply(format!("cannot change log level: {}", e)),
            },
        }
    }

    pub fn stats(&self) -> Vec<(&str, QueueStats, usize)> {
        vec![
            (self.pages.name(), self.pages.stats(), self.page_tracker.pending()),
            (self.index.name(), self.index.stats(), self.index_queue.pending()),
            (
                self.changes.name(),
                self.changes.stats(),
                self.change_tracker.pending(),
            ),
        ]
    }

    fn render_stats(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", StyleRole::Header.paint("Queues", self.color));
        for (name, stats, pending) in self.stats() {
            let state = StyleRole::for_state(stats.state).paint(&stats.state.to_string(), self.color);
            let _ = writeln!(out, "  {} [{}]", name, state);
            for (label, value) in [
                ("pending", pending as u64),
                ("batches", stats.batches_processed),
                ("items", stats.items_processed),
                ("failures", stats.batch_failures),
                ("wakeups", stats.wakeups),
                ("idle timeouts", stats.idle_timeouts),
            ] {
                let _ = writeln!(out, "    {}", key_value(label, value, self.color));
            }
        }
        out.trim_end().to_string()
    }

    /// Shut every queue down in parallel, persisting what is left
    ///
    /// Blocks until all consumers have drained; returns the first error.
    pub fn shutdown(&self) -> QueueResult<()> {
        let results: Vec<QueueResult<()>> = thread::scope(|scope| {
            let handles = [
                scope.spawn(|| self.pages.shutdown()),
                scope.spawn(|| self.index.shutdown()),
                scope.spawn(|| self.changes.shutdown()),
            ];
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(QueueError::Synchronisation {
                            message: "shutdown thread panicked".to_string(),
                        })
                    })
                })
                .collect()
        });
        log::info!("All queues stopped");
        results.into_iter().collect()
    }
}

fn coalesced_reply(action: &str, target: &str, added: bool) -> String {
    if added {
        format!("queued {} {}", action, target)
    } else {
        format!("updated pending {} {}", action, target)
    }
}

fn log_rollback(result: QueueResult<()>) {
    if let Err(e) = result {
        log::warn!("Rollback shutdown failed: {}", e);
    }
}
