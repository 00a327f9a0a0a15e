use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use ignore::WalkBuilder;

use crate::config::ScanConfig;

/// Decides which paths are tracked deliverables.
#[derive(Debug, Clone)]
pub struct DeliverableFilter {
    marker: String,
    extensions: BTreeSet<String>,
}

impl DeliverableFilter {
    pub fn new(scan: &ScanConfig) -> Self {
        Self {
            marker: scan.marker.clone(),
            extensions: scan.active_extensions(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }

    /// Case-sensitive: `Tower.RVT` is not tracked when `rvt` is.
    pub fn has_tracked_extension<P: AsRef<Path>>(&self, path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .map_or(false, |ext| self.extensions.contains(ext))
    }

    /// Name of the directory holding the innermost marker folder above `path`.
    pub fn project_folder<P: AsRef<Path>>(&self, path: P) -> Option<String> {
        let parent = path.as_ref().parent()?;
        let marker_dir = parent
            .ancestors()
            .find(|dir| dir.file_name().map_or(false, |name| name == self.marker.as_str()))?;

        Some(
            marker_dir
                .parent()
                .and_then(|p| p.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )
    }

    /// Returns the grouping folder when `path` is a tracked deliverable.
    pub fn qualify<P: AsRef<Path>>(&self, path: P) -> Option<String> {
        let path = path.as_ref();
        if !self.has_tracked_extension(path) {
            return None;
        }
        self.project_folder(path)
    }

    /// Recursively list regular files under `root` that qualify.
    pub fn walk<P: AsRef<Path>>(&self, root: P) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for result in WalkBuilder::new(root.as_ref())
            .standard_filters(false)
            .follow_links(false)
            .build()
        {
            match result {
                Ok(entry) => {
                    let is_file = entry.file_type().map_or(false, |ft| ft.is_file());
                    if is_file && self.qualify(entry.path()).is_some() {
                        files.push(entry.into_path());
                    }
                }
                Err(err) => {
                    tracing::warn!("Error walking directory: {}", err);
                }
            }
        }

        files
    }
}
