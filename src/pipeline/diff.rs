//! Change detection between consecutive snapshots of one lineage.
//!
//! A record is new when its identity key is absent from the previous
//! snapshot. Without a previous snapshot every record is new.

use std::collections::HashSet;

use crate::models::{IdentityKey, Record, Snapshot};

/// New records found in one lineage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// No previous snapshot existed
    pub first_run: bool,
    /// Records absent from the previous snapshot, in source order
    pub new_records: Vec<Record>,
}

impl ChangeSet {
    pub fn has_changes(&self) -> bool {
        !self.new_records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.new_records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.new_records.is_empty()
    }
}

/// Computes the records of a snapshot that its predecessor lacks.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    identity: IdentityKey,
}

impl ChangeDetector {
    pub fn new(identity: IdentityKey) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> IdentityKey {
        self.identity
    }

    /// Diff `current` against `previous`.
    pub fn diff(&self, current: &Snapshot, previous: Option<&Snapshot>) -> ChangeSet {
        let Some(previous) = previous else {
            return ChangeSet {
                first_run: true,
                new_records: current.records.clone(),
            };
        };

        let previous_keys: HashSet<(&str, &str)> = previous
            .records
            .iter()
            .map(|r| self.identity.key(r))
            .collect();

        let new_records = current
            .records
            .iter()
            .filter(|r| !previous_keys.contains(&self.identity.key(r)))
            .cloned()
            .collect();

        ChangeSet {
            first_run: false,
            new_records,
        }
    }
}
