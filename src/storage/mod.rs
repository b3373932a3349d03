//! Storage abstractions for snapshot persistence.
//!
//! Every run writes one immutable snapshot per lineage. Nothing is ever
//! overwritten, so the directory doubles as an audit trail.
//!
//! ## Directory Structure
//!
//! ```text
//! output/
//! ├── tenders_india_water_tenders_20250106_090000.csv
//! ├── tenders_india_water_tenders_20250107_090000.csv
//! └── projects_india_transport_projects_20250107_090000.csv
//! ```

pub mod local;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{LineageKey, Snapshot, Timestamp};

// Re-export for convenience
pub use local::CsvSnapshotStore;

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot as a new artifact.
    ///
    /// Returns the location of the written artifact.
    async fn save(&mut self, snapshot: &Snapshot) -> Result<PathBuf>;

    /// The most recent snapshot of `lineage` strictly older than `before`.
    async fn latest_before(
        &self,
        lineage: &LineageKey,
        before: Timestamp,
    ) -> Result<Option<Snapshot>>;

    /// Every known lineage with its newest timestamp.
    fn lineages(&self) -> Vec<(LineageKey, Timestamp)>;
}

/// Ordered timestamps per lineage.
#[derive(Debug, Clone, Default)]
pub struct LineageIndex {
    entries: BTreeMap<LineageKey, BTreeSet<Timestamp>>,
}

impl LineageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot. Returns false if it was already indexed.
    pub fn insert(&mut self, lineage: LineageKey, timestamp: Timestamp) -> bool {
        self.entries.entry(lineage).or_default().insert(timestamp)
    }

    /// Greatest timestamp strictly less than `before`.
    pub fn latest_before(&self, lineage: &LineageKey, before: Timestamp) -> Option<Timestamp> {
        self.entries
            .get(lineage)?
            .range(..before)
            .next_back()
            .copied()
    }

    pub fn latest(&self, lineage: &LineageKey) -> Option<Timestamp> {
        self.entries.get(lineage)?.last().copied()
    }

    pub fn contains(&self, lineage: &LineageKey, timestamp: Timestamp) -> bool {
        self.entries
            .get(lineage)
            .is_some_and(|set| set.contains(&timestamp))
    }

    pub fn lineages(&self) -> Vec<(LineageKey, Timestamp)> {
        self.entries
            .iter()
            .filter_map(|(key, set)| set.last().map(|ts| (key.clone(), *ts)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
