// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::source::SpecificationSource;
use crate::table::{SpecTable, TaskRanges};
use locoqc_core::{LocoError, PhaseGrid, PhasePoint, RangeKey, VariableRange};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

/// Record of one applied update, sufficient to revert it.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateReceipt {
    /// Store revision produced by this update.
    pub revision: u64,
    pub applied: Vec<VariableRange>,
    /// Entries the update replaced, as they were before.
    pub previous: Vec<VariableRange>,
    /// Keys that did not exist before the update.
    pub inserted: Vec<RangeKey>,
}

/// Receipts kept by default; older ones are dropped first.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

#[derive(Debug)]
struct StoreState {
    table: Arc<SpecTable>,
    revision: u64,
    history: VecDeque<UpdateReceipt>,
    history_limit: usize,
}

impl StoreState {
    fn record(&mut self, receipt: UpdateReceipt) {
        self.history.push_back(receipt);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }
}

/// Single source of truth for acceptable ranges.
///
/// Readers work on [`SpecificationStore::snapshot`]s; updates build a new table
/// and swap it in under the write lock, so a snapshot never observes a
/// partially applied update.
#[derive(Debug)]
pub struct SpecificationStore {
    state: RwLock<StoreState>,
}

impl SpecificationStore {
    pub fn new(table: SpecTable) -> Self {
        Self {
            state: RwLock::new(StoreState {
                table: Arc::new(table),
                revision: 0,
                history: VecDeque::new(),
                history_limit: DEFAULT_HISTORY_LIMIT,
            }),
        }
    }

    /// Keeps at most `limit` receipts in [`Self::history`]. Reverting only
    /// needs the caller's receipt, so trimming never blocks a revert.
    pub fn with_history_limit(self, limit: usize) -> Self {
        {
            let mut state = self.write();
            state.history_limit = limit;
            while state.history.len() > limit {
                state.history.pop_front();
            }
        }
        self
    }

    /// Loads the table once from an injected declarative source.
    pub fn from_source(source: &dyn SpecificationSource) -> Result<Self, LocoError> {
        let grid = source
            .phase_grid()
            .map_err(|err| LocoError::specification_init(format!("phase grid: {err}")))?;
        let ranges = source.load_ranges().map_err(|err| match err {
            LocoError::SpecificationInit(_) => err,
            other => LocoError::specification_init(other.to_string()),
        })?;
        let table = SpecTable::from_ranges(grid, ranges)?;
        tracing::info!(
            entries = table.len(),
            tasks = table.known_tasks().len(),
            "specification store loaded"
        );
        Ok(Self::new(table))
    }

    pub fn from_ranges(grid: PhaseGrid, ranges: Vec<VariableRange>) -> Result<Self, LocoError> {
        Ok(Self::new(SpecTable::from_ranges(grid, ranges)?))
    }

    /// Consistent read-only view of the current table.
    pub fn snapshot(&self) -> Arc<SpecTable> {
        Arc::clone(&self.read().table)
    }

    pub fn revision(&self) -> u64 {
        self.read().revision
    }

    /// Receipts of recent updates and reverts, oldest first.
    pub fn history(&self) -> Vec<UpdateReceipt> {
        self.read().history.iter().cloned().collect()
    }

    /// Takes the recorded receipts, leaving the history empty.
    pub fn drain_history(&self) -> Vec<UpdateReceipt> {
        self.write().history.drain(..).collect()
    }

    pub fn phase_grid(&self) -> PhaseGrid {
        self.snapshot().grid().clone()
    }

    /// `None` means the triple is not validated, not that it is invalid.
    pub fn get_range(&self, task: &str, variable: &str, phase_point: PhasePoint) -> Option<VariableRange> {
        self.snapshot().get(task, variable, phase_point).cloned()
    }

    /// Empty for a task without entries.
    pub fn get_task_ranges(&self, task: &str) -> TaskRanges {
        self.snapshot().task_ranges(task).cloned().unwrap_or_default()
    }

    pub fn known_tasks(&self) -> BTreeSet<String> {
        self.snapshot().known_tasks()
    }

    pub fn known_variables(&self, task: &str) -> BTreeSet<String> {
        self.snapshot().known_variables(task)
    }

    /// Replaces or adds entries atomically and returns the replaced values.
    pub fn apply_update(&self, updates: Vec<VariableRange>) -> Result<Vec<VariableRange>, LocoError> {
        Ok(self.apply_update_with_receipt(updates)?.previous)
    }

    /// Like [`Self::apply_update`], returning the full receipt.
    pub fn apply_update_with_receipt(
        &self,
        updates: Vec<VariableRange>,
    ) -> Result<UpdateReceipt, LocoError> {
        let mut state = self.write();
        let current = Arc::clone(&state.table);

        let mut seen = HashSet::with_capacity(updates.len());
        for update in &updates {
            current.check_entry(update)?;
            if !seen.insert(&update.key) {
                return Err(LocoError::specification_conflict(format!(
                    "update batch targets {} more than once",
                    update.key
                )));
            }
        }

        if updates.is_empty() {
            return Ok(UpdateReceipt {
                revision: state.revision,
                applied: vec![],
                previous: vec![],
                inserted: vec![],
            });
        }

        let mut next = (*current).clone();
        let mut previous = Vec::new();
        let mut inserted = Vec::new();
        for update in &updates {
            match next.insert(update.clone()) {
                Some(old) => previous.push(old),
                None => inserted.push(update.key.clone()),
            }
        }

        state.revision += 1;
        state.table = Arc::new(next);
        let receipt = UpdateReceipt {
            revision: state.revision,
            applied: updates,
            previous,
            inserted,
        };
        state.record(receipt.clone());
        tracing::info!(
            revision = receipt.revision,
            replaced = receipt.previous.len(),
            inserted = receipt.inserted.len(),
            "specification updated"
        );
        Ok(receipt)
    }

    /// Undoes the most recent update: restores replaced entries and removes
    /// inserted ones. Only the latest revision can be reverted.
    pub fn revert(&self, receipt: &UpdateReceipt) -> Result<UpdateReceipt, LocoError> {
        let mut state = self.write();
        if receipt.revision != state.revision {
            return Err(LocoError::specification_conflict(format!(
                "cannot revert revision {}: store is at revision {}",
                receipt.revision, state.revision
            )));
        }
        if receipt.applied.is_empty() {
            return Ok(receipt.clone());
        }

        let mut next = (*state.table).clone();
        let mut undone = Vec::with_capacity(receipt.applied.len());
        for key in &receipt.inserted {
            if let Some(removed) = next.remove(key) {
                undone.push(removed);
            }
        }
        for range in &receipt.previous {
            if let Some(replaced) = next.insert(range.clone()) {
                undone.push(replaced);
            }
        }

        state.revision += 1;
        state.table = Arc::new(next);
        let revert_receipt = UpdateReceipt {
            revision: state.revision,
            applied: receipt.previous.clone(),
            previous: undone,
            inserted: vec![],
        };
        state.record(revert_receipt.clone());
        tracing::info!(
            revision = revert_receipt.revision,
            reverted = receipt.revision,
            "specification update reverted"
        );
        Ok(revert_receipt)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::SpecificationStore;
    use locoqc_core::{PhaseGrid, PhasePoint, VariableRange};

    fn knee(phase: u8, min: f64, max: f64) -> VariableRange {
        VariableRange::new(
            "walking",
            "knee_flexion_angle",
            PhasePoint::whole_percent(phase),
            min,
            max,
        )
        .with_units("rad")
    }

    fn store() -> SpecificationStore {
        SpecificationStore::from_ranges(
            PhaseGrid::canonical(),
            vec![knee(0, -0.1, 1.5), knee(25, 0.0, 0.8)],
        )
        .expect("store should load")
    }

    #[test]
    fn get_range_returns_none_for_unspecified_triples() {
        let store = store();
        assert!(store.get_range("walking", "knee_flexion_angle", PhasePoint::whole_percent(0)).is_some());
        assert!(store.get_range("walking", "hip_flexion_angle", PhasePoint::whole_percent(0)).is_none());
        assert!(store.get_range("sprinting", "knee_flexion_angle", PhasePoint::whole_percent(0)).is_none());
        assert!(store.get_task_ranges("sprinting").is_empty());
        assert_eq!(store.get_task_ranges("walking")["knee_flexion_angle"].len(), 2);
    }

    #[test]
    fn apply_update_returns_previous_values_and_bumps_revision() {
        let store = store();
        let previous = store
            .apply_update(vec![knee(0, -0.2, 1.6), knee(50, 0.1, 1.0)])
            .expect("update should apply");
        assert_eq!(previous, vec![knee(0, -0.1, 1.5)]);
        assert_eq!(store.revision(), 1);
        let history = store.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].inserted.len(), 1);
        assert_eq!(
            store
                .get_range("walking", "knee_flexion_angle", PhasePoint::whole_percent(0))
                .map(|r| (r.min, r.max)),
            Some((-0.2, 1.6))
        );
    }

    #[test]
    fn apply_update_with_inverted_bounds_leaves_store_unchanged() {
        let store = store();
        let before = store.snapshot();
        let err = store
            .apply_update(vec![knee(25, 0.1, 0.9), knee(0, 1.0, 0.5)])
            .expect_err("min > max must conflict");
        assert!(err.to_string().starts_with("specification conflict"));
        assert_eq!(*store.snapshot(), *before);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn apply_update_rejects_duplicate_keys_in_one_batch() {
        let store = store();
        let err = store
            .apply_update(vec![knee(25, 0.1, 0.9), knee(25, 0.2, 0.9)])
            .expect_err("duplicate keys");
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn snapshots_are_isolated_from_later_updates() {
        let store = store();
        let snapshot = store.snapshot();
        store
            .apply_update(vec![knee(0, -0.5, 2.5)])
            .expect("update should apply");
        assert_eq!(
            snapshot
                .get("walking", "knee_flexion_angle", PhasePoint::whole_percent(0))
                .map(|r| r.max),
            Some(1.5)
        );
    }

    #[test]
    fn revert_restores_previous_and_removes_inserted_entries() {
        let store = store();
        let original = store.snapshot();
        let receipt = store
            .apply_update_with_receipt(vec![knee(0, -0.3, 1.7), knee(75, 0.2, 0.4)])
            .expect("update should apply");
        store.revert(&receipt).expect("latest revision can be reverted");
        assert_eq!(*store.snapshot(), *original);
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn revert_of_stale_receipt_is_a_conflict() {
        let store = store();
        let first = store
            .apply_update_with_receipt(vec![knee(0, -0.3, 1.7)])
            .expect("first update");
        store
            .apply_update(vec![knee(25, 0.0, 0.9)])
            .expect("second update");
        let err = store.revert(&first).expect_err("stale receipt");
        assert!(err.to_string().contains("cannot revert revision 1"));
    }

    #[test]
    fn history_is_bounded_and_drainable() {
        let store = store().with_history_limit(2);
        for step in 1..=4 {
            store
                .apply_update(vec![knee(50, 0.0, f64::from(step))])
                .expect("update should apply");
        }
        let revisions: Vec<u64> = store.history().iter().map(|r| r.revision).collect();
        assert_eq!(revisions, vec![3, 4]);

        let latest = store.history().pop().expect("latest receipt kept");
        store.revert(&latest).expect("latest revision can be reverted");
        let drained = store.drain_history();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].revision, 5);
        assert!(store.history().is_empty());
        assert_eq!(store.revision(), 5);
    }
}
