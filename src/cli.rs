use std::path::PathBuf;
use clap::{Parser, ValueEnum};

use crate::config::{ExtensionPair, PairwatchConfig};
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "pairwatch")]
#[command(version)]
#[command(about = "Watches CAD/BIM deliverable folders and flags same-day cross-format export pairs")]
#[command(long_about = "pairwatch scans a project tree for model files kept under a marker folder, \
records their metadata in a SQLite file and highlights files that look like the same deliverable \
exported in two formats on the same day. After the initial scan it keeps watching for changes.")]
pub struct Cli {
    /// Directory to watch for changes
    #[arg(value_name = "PATH", help = "Path to watch (defaults to current directory)")]
    pub path: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE", help = "Configuration file")]
    pub config: Option<PathBuf>,

    /// SQLite file, recreated on start
    #[arg(long, value_name = "FILE", help = "Metadata store location")]
    pub db: Option<PathBuf>,

    /// Marker folder name
    #[arg(long, help = "Folder name that marks deliverables")]
    pub marker: Option<String>,

    /// Active extension pairs
    #[arg(long, value_delimiter = ',', help = "Extension pairs to match (rvt-ifc,dwg-ifc)")]
    pub pairs: Option<Vec<ExtensionPair>>,

    /// Similarity threshold, 0-100
    #[arg(short, long, help = "Minimum name similarity for a pair (0-100)")]
    pub threshold: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Disable colors in output
    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,

    /// Output format
    #[arg(long, default_value = "text", help = "Output format")]
    pub output: OutputFormat,

    /// Scan once and exit
    #[arg(long, help = "Print the initial scan and exit without monitoring")]
    pub once: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table of all records (default)
    Text,
    /// One JSON snapshot per line
    Json,
    /// Single line per record
    Compact,
}

impl Cli {
    pub fn get_watch_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }

    /// Defaults, then config file, then environment, then flags.
    pub fn resolve_config(&self) -> Result<PairwatchConfig> {
        let mut config = PairwatchConfig::load_or_default(self.config.as_deref())?;
        config.apply_env();

        if let Some(db) = &self.db {
            config.store.path = db.clone();
        }
        if let Some(marker) = &self.marker {
            config.scan.marker = marker.clone();
        }
        if let Some(pairs) = &self.pairs {
            let mut pairs = pairs.clone();
            pairs.sort();
            pairs.dedup();
            config.scan.pairs = pairs;
        }
        if let Some(threshold) = &self.threshold {
            config.matching.threshold = threshold.clone();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_ansi(!self.no_color)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let path = self.get_watch_path();

        if !path.exists() {
            return Err(format!("Path does not exist: {}", path.display()));
        }

        if !path.is_dir() {
            return Err(format!("Path is not a directory: {}", path.display()));
        }

        if let Some(config) = &self.config {
            if !config.is_file() {
                return Err(format!("Config file not found: {}", config.display()));
            }
        }

        Ok(())
    }
}
