//! Which manifest files built which targets

use dashmap::DashMap;
use kresolve_core::{FileId, TargetKey};
use std::collections::HashSet;
use tracing::info;

/// Maps each resolved file to the keys its latest resolution built.
///
/// Entries are replaced on every resolution but never removed, so the map
/// grows with the number of distinct files seen during a watch session.
#[derive(Debug, Default)]
pub struct FileTargets {
    files: DashMap<FileId, Vec<TargetKey>>,
}

impl FileTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `file` with the keys it built, replacing any earlier set
    pub fn record(&self, file: FileId, keys: Vec<TargetKey>) {
        self.files.insert(file, keys);
    }

    pub fn keys(&self, file: &FileId) -> Option<Vec<TargetKey>> {
        self.files.get(file).map(|keys| keys.clone())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files whose recorded keys intersect `changed`, with the matching keys.
    /// Sorted by file so re-enqueue order is deterministic.
    pub fn affected_by(&self, changed: &HashSet<TargetKey>) -> Vec<(FileId, Vec<TargetKey>)> {
        let mut affected: Vec<(FileId, Vec<TargetKey>)> = self
            .files
            .iter()
            .filter_map(|entry| {
                let matching: Vec<TargetKey> = entry
                    .value()
                    .iter()
                    .filter(|key| changed.contains(*key))
                    .cloned()
                    .collect();
                (!matching.is_empty()).then(|| (entry.key().clone(), matching))
            })
            .collect();
        affected.sort_by(|a, b| a.0.cmp(&b.0));
        affected
    }

    /// React to a batch of changed targets.
    ///
    /// Every matching key is invalidated first, then each affected file is
    /// resubmitted exactly once. Keys that were not changed stay cached.
    /// Returns the number of files resubmitted.
    pub fn retrigger(
        &self,
        changed: &HashSet<TargetKey>,
        mut invalidate: impl FnMut(&TargetKey),
        mut resubmit: impl FnMut(FileId),
    ) -> usize {
        let affected = self.affected_by(changed);

        let mut invalidated = HashSet::new();
        for (_, keys) in &affected {
            for key in keys {
                if invalidated.insert(key.clone()) {
                    invalidate(key);
                }
            }
        }

        let count = affected.len();
        for (file, keys) in affected {
            info!(file = %file, targets = ?keys, "re-resolving after change");
            resubmit(file);
        }
        count
    }
}
