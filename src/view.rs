//! Display-ready projection of the record set
//!
//! Renderers only ever read a [`Snapshot`]; the highlighted set it carries is
//! the classifier's output, not something reconstructed from rendered rows.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::events::FileRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordTag {
    Rvt,
    Ifc,
    Dwg,
    /// Fallback for extensions without a dedicated tag
    File,
    Highlighted,
}

impl RecordTag {
    pub fn for_extension(ext: Option<&str>) -> Self {
        match ext {
            Some("rvt") => RecordTag::Rvt,
            Some("ifc") => RecordTag::Ifc,
            Some("dwg") => RecordTag::Dwg,
            _ => RecordTag::File,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordTag::Rvt => "rvt",
            RecordTag::Ifc => "ifc",
            RecordTag::Dwg => "dwg",
            RecordTag::File => "file",
            RecordTag::Highlighted => "highlighted",
        }
    }
}

impl fmt::Display for RecordTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    pub filename: String,
    pub parent_folder: String,
    pub path: PathBuf,
    pub last_modified: NaiveDateTime,
    pub created_by: String,
    pub tags: Vec<RecordTag>,
}

impl RecordView {
    pub fn is_highlighted(&self) -> bool {
        self.tags.contains(&RecordTag::Highlighted)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub rows: Vec<RecordView>,
    pub highlighted: HashSet<PathBuf>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, path: &Path) -> Option<&RecordView> {
        self.rows.iter().find(|row| row.path == path)
    }

    pub fn highlighted_rows(&self) -> impl Iterator<Item = &RecordView> {
        self.rows.iter().filter(|row| row.is_highlighted())
    }
}

/// Order and tag `records` for display.
pub fn project(mut records: Vec<FileRecord>, highlighted: &HashSet<PathBuf>) -> Snapshot {
    records.sort_by(|a, b| {
        a.parent_folder
            .cmp(&b.parent_folder)
            .then(a.last_modified.cmp(&b.last_modified))
            .then_with(|| a.filename.cmp(&b.filename))
            .then_with(|| a.path.cmp(&b.path))
    });

    let rows: Vec<RecordView> = records
        .into_iter()
        .map(|record| {
            let mut tags = vec![RecordTag::for_extension(record.extension())];
            if highlighted.contains(&record.path) {
                tags.push(RecordTag::Highlighted);
            }
            RecordView {
                filename: record.filename,
                parent_folder: record.parent_folder,
                path: record.path,
                last_modified: record.last_modified,
                created_by: record.created_by,
                tags,
            }
        })
        .collect();

    let highlighted = rows
        .iter()
        .filter(|row| row.is_highlighted())
        .map(|row| row.path.clone())
        .collect();

    Snapshot { rows, highlighted }
}

/// Observer of the projected record set.
pub trait SnapshotSink {
    fn on_record_set_changed(&mut self, snapshot: &Snapshot);
}

impl<F> SnapshotSink for F
where
    F: FnMut(&Snapshot),
{
    fn on_record_set_changed(&mut self, snapshot: &Snapshot) {
        self(snapshot)
    }
}
