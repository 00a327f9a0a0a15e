//! Monitoring session: owns the store and runs the ingest/classify/project cycle.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::classify::{self, MatchGroup, MatchSettings};
use crate::config::{parse_threshold, ExtensionPair, PairwatchConfig};
use crate::error::{Error, Result};
use crate::events::{FsNotice, MonitorEvent, StoreOp};
use crate::filter::DeliverableFilter;
use crate::normalize::EventNormalizer;
use crate::store::MetadataStore;
use crate::view::{self, Snapshot, SnapshotSink};
use crate::watcher::FolderMonitor;

struct MatchState {
    pairs: Vec<ExtensionPair>,
    /// `None` while the last threshold supplied was malformed
    threshold: Option<u8>,
    highlighted: HashSet<PathBuf>,
}

pub struct Session {
    root: PathBuf,
    store: Mutex<MetadataStore>,
    normalizer: EventNormalizer,
    matching: Mutex<MatchState>,
}

impl Session {
    /// Validate `config` and `root`, then open a fresh store at the
    /// configured location. Nothing is watched yet.
    pub fn open<P: AsRef<Path>>(root: P, config: &PairwatchConfig) -> Result<Self> {
        let root = validate_root(root.as_ref())?;
        config.validate()?;

        let db = &config.store.path;
        let db_dir = match db.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !db_dir.is_dir() {
            return Err(Error::Config(format!(
                "store directory does not exist: {}",
                db_dir.display()
            )));
        }
        if db.is_dir() {
            return Err(Error::Config(format!("store path is a directory: {}", db.display())));
        }

        let store = MetadataStore::open(db).map_err(|e| {
            Error::Config(format!("cannot open store at {}: {}", db.display(), e))
        })?;
        info!("Store opened at {}", db.display());
        Ok(Self::with_store(root, store, config))
    }

    /// Session over an in-memory store.
    pub fn in_memory<P: AsRef<Path>>(root: P, config: &PairwatchConfig) -> Result<Self> {
        let root = validate_root(root.as_ref())?;
        config.validate()?;
        Ok(Self::with_store(root, MetadataStore::open_in_memory()?, config))
    }

    fn with_store(root: PathBuf, store: MetadataStore, config: &PairwatchConfig) -> Self {
        let normalizer = EventNormalizer::new(DeliverableFilter::new(&config.scan));
        let threshold = config.matching.parsed_threshold();
        if threshold.is_none() {
            warn!(
                "Invalid similarity threshold {:?}; highlighting disabled",
                config.matching.threshold
            );
        }

        Self {
            root,
            store: Mutex::new(store),
            normalizer,
            matching: Mutex::new(MatchState {
                pairs: config.scan.pairs.clone(),
                threshold,
                highlighted: HashSet::new(),
            }),
        }
    }

    /// Replace the account name stamped on records written from now on.
    pub fn with_observer(mut self, observer: impl Into<String>) -> Self {
        self.normalizer = self.normalizer.with_observer(observer);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn normalizer(&self) -> &EventNormalizer {
        &self.normalizer
    }

    /// Supply a new threshold as entered by the user. Returns the parsed
    /// value; a malformed one suspends classification and keeps the last
    /// highlighted set.
    pub fn set_threshold(&self, raw: &str) -> Option<u8> {
        let parsed = parse_threshold(raw);
        if parsed.is_none() {
            warn!("Invalid similarity threshold {:?}; keeping previous highlighting", raw);
        }
        self.lock_matching().threshold = parsed;
        parsed
    }

    pub fn threshold(&self) -> Option<u8> {
        self.lock_matching().threshold
    }

    pub fn apply(&self, op: &StoreOp) -> Result<()> {
        let store = self.lock_store();
        match op {
            StoreOp::Upsert(record) => {
                store.upsert(record)?;
                debug!("Upserted {}", record.path.display());
            }
            StoreOp::Remove(path) => {
                let removed = store.remove_tree(path)?;
                if removed > 0 {
                    debug!("Removed {} record(s) at {}", removed, path.display());
                }
            }
        }
        Ok(())
    }

    /// Normalize and apply one notice. Returns the new snapshot when the
    /// notice produced a mutation.
    pub fn handle_notice(&self, notice: &FsNotice) -> Result<Option<Snapshot>> {
        let ops = self.normalizer.normalize(notice);
        if ops.is_empty() {
            return Ok(None);
        }
        for op in &ops {
            self.apply(op)?;
        }
        Ok(Some(self.snapshot()?))
    }

    /// Apply a path found by a directory walk.
    pub fn discover(&self, path: &Path) -> Result<Option<Snapshot>> {
        match self.normalizer.discover(path) {
            Some(op) => {
                self.apply(&op)?;
                Ok(Some(self.snapshot()?))
            }
            None => Ok(None),
        }
    }

    /// Synchronous recursive walk of the root. Returns the number of
    /// records written.
    pub fn initial_scan(&self) -> Result<usize> {
        let ops = self.normalizer.discover_tree(&self.root);
        for op in &ops {
            self.apply(op)?;
        }
        let written = ops.len();
        info!("Initial scan of {} recorded {} files", self.root.display(), written);
        Ok(written)
    }

    /// Classify and project the current record set.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let records = self.lock_store().all()?;

        let highlighted = {
            let mut matching = self.lock_matching();
            if let Some(threshold) = matching.threshold {
                let settings = MatchSettings {
                    threshold,
                    pairs: matching.pairs.clone(),
                };
                matching.highlighted = classify::highlighted(&records, &settings);
            }
            matching.highlighted.clone()
        };

        Ok(view::project(records, &highlighted))
    }

    /// Matching groups under the current threshold; empty while it is malformed.
    pub fn groups(&self) -> Result<Vec<MatchGroup>> {
        let records = self.lock_store().all()?;
        let matching = self.lock_matching();
        Ok(match matching.threshold {
            Some(threshold) => classify::groups(
                &records,
                &MatchSettings {
                    threshold,
                    pairs: matching.pairs.clone(),
                },
            ),
            None => Vec::new(),
        })
    }

    /// Subscribe to changes under the root. Notices queue up until [`run`]
    /// consumes them, so nothing is lost while the initial scan runs.
    ///
    /// [`run`]: Session::run
    pub fn subscribe(&self) -> Result<FolderMonitor> {
        let monitor = FolderMonitor::new(&self.root)?;
        info!("Monitoring started in folder: {}", self.root.display());
        Ok(monitor)
    }

    /// Process notices one at a time until a stop message arrives or the
    /// monitor goes away. Store failures end the session.
    pub fn run(&self, monitor: &FolderMonitor, sink: &mut dyn SnapshotSink) -> Result<()> {
        while let Ok(event) = monitor.recv() {
            match event {
                MonitorEvent::Notice(notice) => {
                    if let Some(snapshot) = self.handle_notice(&notice)? {
                        sink.on_record_set_changed(&snapshot);
                    }
                }
                MonitorEvent::Stop => {
                    info!("Monitoring stopped");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Subscribe, scan, publish the first snapshot, then monitor until stopped.
    /// `on_start` receives the monitor before scanning so callers can wire a
    /// stop handle.
    pub fn watch<F>(&self, sink: &mut dyn SnapshotSink, on_start: F) -> Result<()>
    where
        F: FnOnce(&FolderMonitor) -> Result<()>,
    {
        let monitor = self.subscribe()?;
        on_start(&monitor)?;
        self.initial_scan()?;
        sink.on_record_set_changed(&self.snapshot()?);
        self.run(&monitor, sink)
    }

    fn lock_store(&self) -> MutexGuard<'_, MetadataStore> {
        // Statements are atomic, so a poisoned store is still consistent.
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_matching(&self) -> MutexGuard<'_, MatchState> {
        self.matching.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn validate_root(root: &Path) -> Result<PathBuf> {
    if !root.exists() {
        return Err(Error::Config(format!("Path does not exist: {}", root.display())));
    }
    if !root.is_dir() {
        return Err(Error::Config(format!("Path is not a directory: {}", root.display())));
    }
    Ok(root.canonicalize()?)
}
