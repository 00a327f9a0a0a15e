//! Turns filesystem notifications and walk entries into store operations.

use std::path::Path;
use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use tracing::{debug, warn};

use crate::events::{FileRecord, FsNotice, NoticeKind, StoreOp};
use crate::filter::DeliverableFilter;

pub struct EventNormalizer {
    filter: DeliverableFilter,
    observer: String,
}

impl EventNormalizer {
    pub fn new(filter: DeliverableFilter) -> Self {
        Self {
            filter,
            observer: current_user(),
        }
    }

    /// Override the account name stamped into `created_by`.
    pub fn with_observer(mut self, observer: impl Into<String>) -> Self {
        self.observer = observer.into();
        self
    }

    pub fn filter(&self) -> &DeliverableFilter {
        &self.filter
    }

    pub fn observer(&self) -> &str {
        &self.observer
    }

    /// Store operations for one notice. A directory that appears (created
    /// or moved in) is walked, since its files arrive without notices of
    /// their own.
    pub fn normalize(&self, notice: &FsNotice) -> Vec<StoreOp> {
        match notice.kind {
            // Deletions skip the filter: the row, if any, must go. A rename
            // source carries no file type, so rows beneath it go as well.
            NoticeKind::Deleted => vec![StoreOp::Remove(notice.path.clone())],
            NoticeKind::Created if notice.is_dir || notice.path.is_dir() => {
                self.discover_tree(&notice.path)
            }
            NoticeKind::Modified if notice.is_dir => Vec::new(),
            NoticeKind::Created | NoticeKind::Modified => {
                self.observe(&notice.path).map(StoreOp::Upsert).into_iter().collect()
            }
        }
    }

    /// A file found by the initial walk.
    pub fn discover(&self, path: &Path) -> Option<StoreOp> {
        self.observe(path).map(StoreOp::Upsert)
    }

    /// Upserts for every qualifying file under `dir`.
    pub fn discover_tree(&self, dir: &Path) -> Vec<StoreOp> {
        let ops: Vec<StoreOp> = self
            .filter
            .walk(dir)
            .iter()
            .filter_map(|path| self.discover(path))
            .collect();
        debug!("Walked {}: {} qualifying files", dir.display(), ops.len());
        ops
    }

    fn observe(&self, path: &Path) -> Option<FileRecord> {
        let parent_folder = self.filter.qualify(path)?;

        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("Skipping {}: gone before metadata read", path.display());
                return None;
            }
            Err(err) => {
                warn!("Skipping {}: {}", path.display(), err);
                return None;
            }
        };

        if !metadata.is_file() {
            return None;
        }

        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(err) => {
                warn!("Skipping {}: no modification time ({})", path.display(), err);
                return None;
            }
        };

        let filename = path.file_name()?.to_string_lossy().into_owned();

        Some(FileRecord {
            parent_folder,
            path: path.to_path_buf(),
            filename,
            last_modified: local_seconds(modified),
            created_by: self.observer.clone(),
        })
    }
}

/// Local wall-clock time truncated to whole seconds.
pub fn local_seconds(time: std::time::SystemTime) -> NaiveDateTime {
    let local: DateTime<Local> = time.into();
    let naive = local.naive_local();
    naive.with_nanosecond(0).unwrap_or(naive)
}

/// Account name of the running process.
pub fn current_user() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}
