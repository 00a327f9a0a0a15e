//! Configuration management for pairwatch
//!
//! Defaults, optionally overlaid by a TOML file, then by `PAIRWATCH_*`
//! environment variables. Command-line flags are applied last by the binary.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Marker folder name used by the drawing office layout this tool targets.
pub const DEFAULT_MARKER: &str = "Работа";
pub const DEFAULT_THRESHOLD: u8 = 80;

/// Two file formats that are exported side by side for one deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
pub enum ExtensionPair {
    /// Revit model and its IFC export
    #[serde(rename = "rvt-ifc")]
    #[value(name = "rvt-ifc")]
    RvtIfc,
    /// AutoCAD drawing and its IFC export
    #[serde(rename = "dwg-ifc")]
    #[value(name = "dwg-ifc")]
    DwgIfc,
}

impl ExtensionPair {
    pub fn extensions(&self) -> (&'static str, &'static str) {
        match self {
            ExtensionPair::RvtIfc => ("rvt", "ifc"),
            ExtensionPair::DwgIfc => ("dwg", "ifc"),
        }
    }

    /// True when `a` and `b` are the two sides of this pair, in either order.
    pub fn joins(&self, a: &str, b: &str) -> bool {
        let (left, right) = self.extensions();
        (a == left && b == right) || (a == right && b == left)
    }
}

/// Global configuration for pairwatch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairwatchConfig {
    /// What counts as a tracked file
    pub scan: ScanConfig,
    /// Pair matching settings
    pub matching: MatchingConfig,
    /// Metadata store settings
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory name that marks its contents as deliverables
    pub marker: String,
    /// Active extension pairs; their union is the tracked extension set
    pub pairs: Vec<ExtensionPair>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Similarity threshold 0-100 as entered by the user. Kept as text
    /// because a malformed value disables highlighting instead of failing.
    pub threshold: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file, recreated at session start
    pub path: PathBuf,
}

impl Default for PairwatchConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            matching: MatchingConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            pairs: vec![ExtensionPair::RvtIfc],
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD.to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("pairwatch.db"),
        }
    }
}

/// Parse a user-supplied threshold. `None` for anything that is not an
/// integer in 0..=100.
pub fn parse_threshold(raw: &str) -> Option<u8> {
    raw.trim().parse::<u8>().ok().filter(|t| *t <= 100)
}

impl ScanConfig {
    /// Union of the extensions of every active pair.
    pub fn active_extensions(&self) -> BTreeSet<String> {
        self.pairs
            .iter()
            .flat_map(|pair| {
                let (a, b) = pair.extensions();
                [a.to_string(), b.to_string()]
            })
            .collect()
    }
}

impl MatchingConfig {
    pub fn parsed_threshold(&self) -> Option<u8> {
        parse_threshold(&self.threshold)
    }
}

/// Configuration loading and management
impl PairwatchConfig {
    /// Load configuration from a TOML file. Missing keys fall back to defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Load from `path` when given, otherwise start from defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Override with environment variables if present
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("PAIRWATCH_THRESHOLD") {
            self.matching.threshold = val;
        }

        if let Ok(val) = std::env::var("PAIRWATCH_MARKER") {
            if !val.is_empty() {
                self.scan.marker = val;
            }
        }

        if let Ok(val) = std::env::var("PAIRWATCH_DB") {
            if !val.is_empty() {
                self.store.path = PathBuf::from(val);
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scan.marker.is_empty() {
            return Err(Error::Config("marker folder name must not be empty".to_string()));
        }

        if self.scan.marker.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "marker folder must be a single directory name, got {:?}",
                self.scan.marker
            )));
        }

        if self.scan.pairs.is_empty() {
            return Err(Error::Config("at least one extension pair must be active".to_string()));
        }

        if self.store.path.as_os_str().is_empty() {
            return Err(Error::Config("store path must not be empty".to_string()));
        }

        Ok(())
    }
}
