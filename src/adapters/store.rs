//! Durable homes for undelivered backlog items
//!
//! An adapter loads its store in `prepare` and saves whatever is still pending
//! in `cleanup`, so work enqueued but not processed survives a restart.

use crate::queue::api::AdapterResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Load/save seam for a backlog's pending items
pub trait BacklogStore<T>: Send {
    /// Items persisted by a previous run, oldest first
    fn load(&mut self) -> AdapterResult<Vec<T>>;

    /// Replace the persisted items with `items`
    fn save(&mut self, items: &[T]) -> AdapterResult<()>;

    /// Human readable location, for log messages
    fn describe(&self) -> String;
}

/// Process-local store; clones share the same contents
#[derive(Debug)]
pub struct MemoryStore<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> MemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `items`, as if saved by an earlier run
    pub fn with_items(items: Vec<T>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
        }
    }

    /// Copy of the currently stored items
    pub fn contents(&self) -> Vec<T> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T: Clone + Send> BacklogStore<T> for MemoryStore<T> {
    fn load(&mut self) -> AdapterResult<Vec<T>> {
        Ok(self.contents())
    }

    fn save(&mut self, items: &[T]) -> AdapterResult<()> {
        *self.items.lock().unwrap_or_else(PoisonError::into_inner) = items.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// JSON array on disk, replaced atomically on every save
///
/// The new contents are written and synced to a sibling temp file, renamed
/// over the old file, and the directory entry is synced on Unix so the
/// rename itself survives a power loss.
#[derive(Debug)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    _items: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _items: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<T: Serialize + DeserializeOwned> BacklogStore<T> for JsonFileStore<T> {
    fn load(&mut self) -> AdapterResult<Vec<T>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&mut self, items: &[T]) -> AdapterResult<()> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        {
            let mut file = fs::File::create(&temp)?;
            serde_json::to_writer_pretty(&mut file, items)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        sync_dir(parent.unwrap_or_else(|| Path::new(".")))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

// Directory handles cannot be synced on other platforms
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
