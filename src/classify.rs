//! Same-day, cross-format pair detection
//!
//! Records are bucketed by `(parent_folder, calendar day)`. Inside a bucket
//! every unordered pair whose extensions form an active [`ExtensionPair`]
//! and whose stems are similar enough is a match; both sides get highlighted.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use similar::TextDiff;

use crate::config::{ExtensionPair, DEFAULT_THRESHOLD};
use crate::events::FileRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSettings {
    /// Inclusive lower bound on [`similarity`], 0-100
    pub threshold: u8,
    pub pairs: Vec<ExtensionPair>,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            pairs: vec![ExtensionPair::RvtIfc],
        }
    }
}

impl MatchSettings {
    fn is_cross_pair(&self, a: &FileRecord, b: &FileRecord) -> bool {
        match (a.extension(), b.extension()) {
            (Some(ea), Some(eb)) => self.pairs.iter().any(|pair| pair.joins(ea, eb)),
            _ => false,
        }
    }

    /// Whether two records form a matching deliverable pair.
    pub fn is_match(&self, a: &FileRecord, b: &FileRecord) -> bool {
        a.path != b.path
            && self.is_cross_pair(a, b)
            && a.last_modified.date() == b.last_modified.date()
            && similarity(a.stem(), b.stem()) >= self.threshold
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub parent_folder: String,
    pub day: NaiveDate,
}

/// Records of one bucket that take part in at least one matching pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchGroup {
    pub key: BucketKey,
    pub paths: Vec<PathBuf>,
}

/// Character-level similarity of two names on a 0-100 scale.
///
/// `2 * M / (len_a + len_b)` where `M` counts characters kept by the
/// shortest edit script, rounded to the nearest integer. Two empty names
/// score 100.
pub fn similarity(a: &str, b: &str) -> u8 {
    let ratio = TextDiff::from_chars(a, b).ratio();
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

pub fn buckets(records: &[FileRecord]) -> BTreeMap<BucketKey, Vec<&FileRecord>> {
    let mut buckets: BTreeMap<BucketKey, Vec<&FileRecord>> = BTreeMap::new();
    for record in records {
        let key = BucketKey {
            parent_folder: record.parent_folder.clone(),
            day: record.last_modified.date(),
        };
        buckets.entry(key).or_default().push(record);
    }
    buckets
}

/// Matching groups, one per bucket with at least one match, in key order.
pub fn groups(records: &[FileRecord], settings: &MatchSettings) -> Vec<MatchGroup> {
    let mut groups = Vec::new();

    for (key, members) in buckets(records) {
        if members.len() < 2 {
            continue;
        }

        let mut hit = vec![false; members.len()];
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                if settings.is_match(members[i], members[j]) {
                    hit[i] = true;
                    hit[j] = true;
                }
            }
        }

        let mut paths: Vec<PathBuf> = members
            .iter()
            .zip(&hit)
            .filter(|(_, hit)| **hit)
            .map(|(record, _)| record.path.clone())
            .collect();

        if !paths.is_empty() {
            paths.sort();
            groups.push(MatchGroup { key, paths });
        }
    }

    groups
}

/// Paths participating in at least one matching pair.
pub fn highlighted(records: &[FileRecord], settings: &MatchSettings) -> HashSet<PathBuf> {
    groups(records, settings)
        .into_iter()
        .flat_map(|group| group.paths)
        .collect()
}
