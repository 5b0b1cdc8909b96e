//! # Snapshot Store
//!
//! Durable per-item records on the local filesystem:
//!
//! ```text
//! <root>/<item-id>/<unix-ts>/photo.html
//! <root>/<item-id>/<unix-ts>/user.html
//! <root>/<item-id>/ok       "OK"
//! <root>/<item-id>/error    "<ts>: <item-status>, <owner-status>\n" per event
//! ```
//!
//! Records are partitioned by item id, so concurrent workers never touch the
//! same directory. A record without `ok` or `error` is incomplete: its
//! observation was interrupted and will not be resumed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::core::model::{ItemId, Snapshot, TerminalMarker};
use crate::error::{CrawlerError, CrawlerResult};

pub const ITEM_PAGE_FILE: &str = "photo.html";
pub const OWNER_PAGE_FILE: &str = "user.html";
pub const OK_MARKER_FILE: &str = "ok";
pub const ERROR_MARKER_FILE: &str = "error";

/// What a downstream reader finds for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRecordState {
    /// No record directory.
    Missing,
    /// Directory exists but no terminal marker was written.
    Incomplete,
    /// Finished without errors.
    Ok,
    /// Finished with at least one recorded error.
    Error,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_dir(&self, id: ItemId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Creates the root directory if needed.
    pub async fn ensure_root(&self) -> CrawlerResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CrawlerError::storage(&self.root, e))
    }

    /// Ids of every record already on disk.
    ///
    /// A directory counts when its name starts with an integer, optionally
    /// followed by `-suffix`; anything else under the root is ignored.
    pub async fn existing_item_ids(&self) -> CrawlerResult<Vec<ItemId>> {
        let mut ids = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(CrawlerError::storage(&self.root, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CrawlerError::storage(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let leading = name.split('-').next().unwrap_or(name);
            if let Ok(id) = leading.parse::<ItemId>() {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Creates the record directory for a freshly claimed item.
    pub async fn create_record(&self, id: ItemId) -> CrawlerResult<PathBuf> {
        let dir = self.record_dir(id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CrawlerError::storage(&dir, e))?;
        Ok(dir)
    }

    /// Appends one snapshot. Fails if a snapshot with the same timestamp exists.
    pub async fn write_snapshot(&self, id: ItemId, snapshot: &Snapshot) -> CrawlerResult<PathBuf> {
        let dir = self.record_dir(id).join(snapshot.timestamp.to_string());
        fs::create_dir(&dir)
            .await
            .map_err(|e| CrawlerError::storage(&dir, e))?;

        write_new(&dir.join(ITEM_PAGE_FILE), snapshot.item_page.as_bytes()).await?;
        write_new(&dir.join(OWNER_PAGE_FILE), snapshot.owner_page.as_bytes()).await?;
        Ok(dir)
    }

    /// Writes the terminal marker. A record takes exactly one marker; a second
    /// attempt fails with `AlreadyExists`.
    pub async fn write_marker(&self, id: ItemId, marker: &TerminalMarker) -> CrawlerResult<PathBuf> {
        let record = self.record_dir(id);
        for existing in [OK_MARKER_FILE, ERROR_MARKER_FILE] {
            let path = record.join(existing);
            if fs::try_exists(&path)
                .await
                .map_err(|e| CrawlerError::storage(&path, e))?
            {
                return Err(CrawlerError::storage(
                    path,
                    std::io::Error::new(ErrorKind::AlreadyExists, "terminal marker already written"),
                ));
            }
        }

        let (path, contents) = match marker {
            TerminalMarker::Ok => (record.join(OK_MARKER_FILE), "OK".to_string()),
            TerminalMarker::Error(events) => {
                let lines: String = events.iter().map(|e| format!("{}\n", e)).collect();
                (record.join(ERROR_MARKER_FILE), lines)
            }
        };
        write_new(&path, contents.as_bytes()).await?;
        Ok(path)
    }

    pub async fn record_state(&self, id: ItemId) -> CrawlerResult<ItemRecordState> {
        let record = self.record_dir(id);
        let exists = |p: PathBuf| async move {
            fs::try_exists(&p)
                .await
                .map_err(|e| CrawlerError::storage(&p, e))
        };

        if !exists(record.clone()).await? {
            return Ok(ItemRecordState::Missing);
        }
        if exists(record.join(OK_MARKER_FILE)).await? {
            return Ok(ItemRecordState::Ok);
        }
        if exists(record.join(ERROR_MARKER_FILE)).await? {
            return Ok(ItemRecordState::Error);
        }
        Ok(ItemRecordState::Incomplete)
    }

    /// Sorted timestamps of the snapshots stored for `id`.
    pub async fn snapshot_timestamps(&self, id: ItemId) -> CrawlerResult<Vec<i64>> {
        let record = self.record_dir(id);
        let mut entries = fs::read_dir(&record)
            .await
            .map_err(|e| CrawlerError::storage(&record, e))?;

        let mut stamps = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CrawlerError::storage(&record, e))?
        {
            if let Some(ts) = entry.file_name().to_str().and_then(|n| n.parse::<i64>().ok()) {
                stamps.push(ts);
            }
        }
        stamps.sort_unstable();
        Ok(stamps)
    }
}

async fn write_new(path: &Path, contents: &[u8]) -> CrawlerResult<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| CrawlerError::storage(path, e))?;
    file.write_all(contents)
        .await
        .map_err(|e| CrawlerError::storage(path, e))?;
    file.flush().await.map_err(|e| CrawlerError::storage(path, e))
}
