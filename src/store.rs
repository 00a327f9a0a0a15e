//! SQLite-backed metadata store
//!
//! One row per observed path. The database file is recreated on every
//! [`MetadataStore::open`], so a monitoring session never sees rows left
//! over from a previous run.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::Result;
use crate::events::FileRecord;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct MetadataStore {
    conn: Connection,
}

impl MetadataStore {
    /// Open a fresh store at `path`, deleting whatever was there before.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
            debug!("Removed previous store at {}", path.display());
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.configure_pragmas()?;
        store.create_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.create_schema()?;
        Ok(store)
    }

    fn configure_pragmas(&self) -> Result<()> {
        // Each statement commits on its own; FULL makes that commit durable.
        self.conn.execute_batch(
            "PRAGMA synchronous = FULL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS files (
                 path          TEXT PRIMARY KEY,
                 parent_folder TEXT NOT NULL,
                 filename      TEXT NOT NULL,
                 last_modified TEXT NOT NULL,
                 created_by    TEXT NOT NULL
             );",
        )?;
        debug!("Store schema initialized");
        Ok(())
    }

    pub fn upsert(&self, record: &FileRecord) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO files (path, parent_folder, filename, last_modified, created_by) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                path_key(&record.path),
                record.parent_folder,
                record.filename,
                record.last_modified.format(TIMESTAMP_FORMAT).to_string(),
                record.created_by,
            ],
        )?;
        Ok(())
    }

    /// Delete the row for `path`. Returns `false` when there was none.
    pub fn remove(&self, path: &Path) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM files WHERE path = ?1", params![path_key(path)])?;
        Ok(removed > 0)
    }

    /// Delete the row for `path` and every row beneath it, for when `path`
    /// was (or may have been) a directory. Returns the number of rows removed.
    pub fn remove_tree(&self, path: &Path) -> Result<usize> {
        let key = path_key(path);
        let prefix = format!("{}{}", key.trim_end_matches(MAIN_SEPARATOR), MAIN_SEPARATOR);
        let removed = self.conn.execute(
            "DELETE FROM files WHERE path = ?1 OR substr(path, 1, length(?2)) = ?2",
            params![key, prefix],
        )?;
        Ok(removed)
    }

    pub fn get(&self, path: &Path) -> Result<Option<FileRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT path, parent_folder, filename, last_modified, created_by \
                 FROM files WHERE path = ?1",
                params![path_key(path)],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn all(&self) -> Result<Vec<FileRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, parent_folder, filename, last_modified, created_by FROM files",
        )?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let path: String = row.get(0)?;
    let stamp: String = row.get(3)?;
    let last_modified = NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(FileRecord {
        parent_folder: row.get(1)?,
        path: PathBuf::from(path),
        filename: row.get(2)?,
        last_modified,
        created_by: row.get(4)?,
    })
}
