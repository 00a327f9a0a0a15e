use std::path::PathBuf;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One observed deliverable file, keyed by `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub parent_folder: String,
    pub path: PathBuf,
    pub filename: String,
    pub last_modified: NaiveDateTime,
    /// Account of the process that last wrote this row, not the file's author.
    pub created_by: String,
}

impl FileRecord {
    /// Extension without the leading dot, as written on disk.
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|s| s.to_str())
    }

    /// File name with the extension stripped.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.filename)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeKind {
    Created,
    Modified,
    Deleted,
}

/// A single filesystem notification as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsNotice {
    pub kind: NoticeKind,
    pub path: PathBuf,
    pub is_dir: bool,
}

impl FsNotice {
    pub fn new(kind: NoticeKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            is_dir: false,
        }
    }

    pub fn directory(mut self) -> Self {
        self.is_dir = true;
        self
    }
}

/// A store mutation produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Upsert(FileRecord),
    /// Drops the row for the path and any rows beneath it.
    Remove(PathBuf),
}

impl StoreOp {
    pub fn path(&self) -> &std::path::Path {
        match self {
            StoreOp::Upsert(record) => &record.path,
            StoreOp::Remove(path) => path,
        }
    }
}

/// Messages flowing from the watcher thread to the session loop.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Notice(FsNotice),
    Stop,
}
