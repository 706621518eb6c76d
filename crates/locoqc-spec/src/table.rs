// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use locoqc_core::{LocoError, PhaseGrid, PhasePoint, RangeKey, VariableRange};
use std::collections::{BTreeMap, BTreeSet};

/// Ranges of one task: variable → phase point → range.
pub type TaskRanges = BTreeMap<String, BTreeMap<PhasePoint, VariableRange>>;

/// Immutable keyed lookup table behind the specification store.
///
/// Every held entry has finite bounds with `min <= max` and a phase point on
/// the table's grid.
#[derive(Clone, Debug, PartialEq)]
pub struct SpecTable {
    grid: PhaseGrid,
    entries: BTreeMap<String, TaskRanges>,
}

impl SpecTable {
    pub fn new(grid: PhaseGrid) -> Self {
        Self {
            grid,
            entries: BTreeMap::new(),
        }
    }

    /// Builds a table from a bootstrap list; any bad entry fails the load.
    pub fn from_ranges(grid: PhaseGrid, ranges: Vec<VariableRange>) -> Result<Self, LocoError> {
        let mut table = Self::new(grid);
        for range in ranges {
            table
                .check_entry(&range)
                .map_err(|err| LocoError::specification_init(err_message(err)))?;
            if table.get_key(&range.key).is_some() {
                return Err(LocoError::specification_init(format!(
                    "duplicate range for {}",
                    range.key
                )));
            }
            table.insert(range);
        }
        Ok(table)
    }

    pub fn grid(&self) -> &PhaseGrid {
        &self.grid
    }

    pub fn get(&self, task: &str, variable: &str, phase_point: PhasePoint) -> Option<&VariableRange> {
        self.entries.get(task)?.get(variable)?.get(&phase_point)
    }

    pub fn get_key(&self, key: &RangeKey) -> Option<&VariableRange> {
        self.get(&key.task, &key.variable, key.phase_point)
    }

    pub fn task_ranges(&self, task: &str) -> Option<&TaskRanges> {
        self.entries.get(task)
    }

    pub fn known_tasks(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn known_variables(&self, task: &str) -> BTreeSet<String> {
        self.entries
            .get(task)
            .map(|variables| variables.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_task(&self, task: &str) -> bool {
        self.entries.contains_key(task)
    }

    /// All entries in (task, variable, phase point) order.
    pub fn iter(&self) -> impl Iterator<Item = &VariableRange> {
        self.entries
            .values()
            .flat_map(|variables| variables.values())
            .flat_map(|points| points.values())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the table with one entry substituted or added.
    pub fn with_replaced(&self, range: VariableRange) -> Result<Self, LocoError> {
        self.check_entry(&range)?;
        let mut next = self.clone();
        next.insert(range);
        Ok(next)
    }

    /// Rejects entries that would break the table invariant.
    pub fn check_entry(&self, range: &VariableRange) -> Result<(), LocoError> {
        if !range.min.is_finite() || !range.max.is_finite() {
            return Err(LocoError::specification_conflict(format!(
                "{} has non-finite bounds [{}, {}]",
                range.key, range.min, range.max
            )));
        }
        if range.min > range.max {
            return Err(LocoError::specification_conflict(format!(
                "{} would have min {} > max {}",
                range.key, range.min, range.max
            )));
        }
        if !self.grid.contains(range.key.phase_point) {
            return Err(LocoError::specification_conflict(format!(
                "{} uses phase point {} outside the specification grid",
                range.key, range.key.phase_point
            )));
        }
        if range.key.task.is_empty() || range.key.variable.is_empty() {
            return Err(LocoError::specification_conflict(format!(
                "range key '{}' must name a task and a variable",
                range.key
            )));
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, range: VariableRange) -> Option<VariableRange> {
        self.entries
            .entry(range.key.task.clone())
            .or_default()
            .entry(range.key.variable.clone())
            .or_default()
            .insert(range.key.phase_point, range)
    }

    pub(crate) fn remove(&mut self, key: &RangeKey) -> Option<VariableRange> {
        let variables = self.entries.get_mut(&key.task)?;
        let points = variables.get_mut(&key.variable)?;
        let removed = points.remove(&key.phase_point);
        if points.is_empty() {
            variables.remove(&key.variable);
        }
        if variables.is_empty() {
            self.entries.remove(&key.task);
        }
        removed
    }
}

fn err_message(err: LocoError) -> String {
    match err {
        LocoError::SpecificationConflict(message) => message,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::SpecTable;
    use locoqc_core::{PhaseGrid, PhasePoint, RangeKey, VariableRange};

    fn knee(phase: u8, min: f64, max: f64) -> VariableRange {
        VariableRange::new(
            "walking",
            "knee_flexion_angle",
            PhasePoint::whole_percent(phase),
            min,
            max,
        )
    }

    #[test]
    fn from_ranges_indexes_by_task_variable_and_phase() {
        let table = SpecTable::from_ranges(
            PhaseGrid::canonical(),
            vec![knee(0, -0.1, 1.5), knee(25, 0.0, 0.6)],
        )
        .expect("table should load");
        assert_eq!(table.len(), 2);
        assert_eq!(
            table
                .get("walking", "knee_flexion_angle", PhasePoint::whole_percent(25))
                .map(|range| range.max),
            Some(0.6)
        );
        assert!(table.get("walking", "knee_flexion_angle", PhasePoint::whole_percent(50)).is_none());
        assert!(table.known_variables("running").is_empty());
    }

    #[test]
    fn from_ranges_rejects_duplicates_and_inverted_bounds() {
        let err = SpecTable::from_ranges(
            PhaseGrid::canonical(),
            vec![knee(0, -0.1, 1.5), knee(0, 0.0, 1.0)],
        )
        .expect_err("duplicate key");
        assert!(err.to_string().contains("duplicate range"));

        let err = SpecTable::from_ranges(PhaseGrid::canonical(), vec![knee(0, 1.0, 0.5)])
            .expect_err("min > max");
        assert!(err.to_string().starts_with("specification store failed to initialize"));
    }

    #[test]
    fn off_grid_phase_point_is_a_conflict() {
        let table = SpecTable::new(PhaseGrid::canonical());
        let err = table
            .with_replaced(knee(60, 0.0, 1.0))
            .expect_err("60% is not on the canonical grid");
        assert!(err.to_string().contains("outside the specification grid"));
    }

    #[test]
    fn remove_prunes_empty_task_entries() {
        let mut table = SpecTable::from_ranges(PhaseGrid::canonical(), vec![knee(0, -0.1, 1.5)])
            .expect("table should load");
        let key = RangeKey::new("walking", "knee_flexion_angle", PhasePoint::whole_percent(0));
        assert!(table.remove(&key).is_some());
        assert!(table.known_tasks().is_empty());
        assert!(table.is_empty());
    }
}
