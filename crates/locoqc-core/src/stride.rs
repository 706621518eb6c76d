// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::phase::PhasePoint;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Unique identity of one gait cycle.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StrideId {
    pub subject_id: String,
    pub trial_id: String,
    pub cycle_id: String,
}

impl StrideId {
    pub fn new(
        subject_id: impl Into<String>,
        trial_id: impl Into<String>,
        cycle_id: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            trial_id: trial_id.into(),
            cycle_id: cycle_id.into(),
        }
    }
}

impl fmt::Display for StrideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.subject_id, self.trial_id, self.cycle_id)
    }
}

/// Result of looking up one (variable, phase point) cell of a stride.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Measurement {
    /// The stride carries no samples for this variable at all.
    NotMeasured,
    /// The variable is present but this phase point was not sampled.
    MissingPhase,
    Value(f64),
}

/// One gait cycle for one subject and trial.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct StrideRecord {
    pub id: StrideId,
    pub task: String,
    /// Number of phase samples the stride was built from, when it claims to
    /// be phase-indexed.
    pub phase_sample_count: Option<usize>,
    values: BTreeMap<String, BTreeMap<PhasePoint, f64>>,
}

impl StrideRecord {
    pub fn new(id: StrideId, task: impl Into<String>) -> Self {
        Self {
            id,
            task: task.into(),
            phase_sample_count: None,
            values: BTreeMap::new(),
        }
    }

    pub fn with_phase_sample_count(mut self, samples: usize) -> Self {
        self.phase_sample_count = Some(samples);
        self
    }

    /// Records a value; NaN marks the phase point as missing but still
    /// registers the variable as measured.
    pub fn with_value(mut self, variable: impl Into<String>, phase: PhasePoint, value: f64) -> Self {
        self.insert(variable, phase, value);
        self
    }

    pub fn insert(&mut self, variable: impl Into<String>, phase: PhasePoint, value: f64) {
        let points = self.values.entry(variable.into()).or_default();
        if value.is_nan() {
            points.remove(&phase);
        } else {
            points.insert(phase, value);
        }
    }

    /// Registers a variable without any sampled phase point.
    pub fn mark_measured(&mut self, variable: impl Into<String>) {
        self.values.entry(variable.into()).or_default();
    }

    pub fn measurement(&self, variable: &str, phase: PhasePoint) -> Measurement {
        match self.values.get(variable) {
            None => Measurement::NotMeasured,
            Some(points) => points
                .get(&phase)
                .map_or(Measurement::MissingPhase, |&value| Measurement::Value(value)),
        }
    }

    pub fn value(&self, variable: &str, phase: PhasePoint) -> Option<f64> {
        match self.measurement(variable, phase) {
            Measurement::Value(value) => Some(value),
            Measurement::NotMeasured | Measurement::MissingPhase => None,
        }
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn has_variable(&self, variable: &str) -> bool {
        self.values.contains_key(variable)
    }

    /// All sampled `(variable, phase, value)` cells in key order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, PhasePoint, f64)> {
        self.values.iter().flat_map(|(variable, points)| {
            points
                .iter()
                .map(move |(&phase, &value)| (variable.as_str(), phase, value))
        })
    }

    /// Overwrites one already-sampled cell; returns false when absent.
    pub fn replace_value(&mut self, variable: &str, phase: PhasePoint, value: f64) -> bool {
        match self.values.get_mut(variable).and_then(|points| points.get_mut(&phase)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// Ordered collection of strides plus the declared variable inventory.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub variables: BTreeSet<String>,
    pub strides: Vec<StrideRecord>,
}

impl Dataset {
    pub fn new(
        name: impl Into<String>,
        variables: BTreeSet<String>,
        strides: Vec<StrideRecord>,
    ) -> Self {
        Self {
            name: name.into(),
            variables,
            strides,
        }
    }

    /// Uses the union of variables seen in the strides as the inventory.
    pub fn from_strides(name: impl Into<String>, strides: Vec<StrideRecord>) -> Self {
        let variables = strides
            .iter()
            .flat_map(|stride| stride.variables().map(str::to_string))
            .collect();
        Self::new(name, variables, strides)
    }

    /// Distinct task labels present in the strides.
    pub fn tasks(&self) -> BTreeSet<String> {
        self.strides
            .iter()
            .map(|stride| stride.task.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.strides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strides.is_empty()
    }

    /// Same name and inventory with a different stride list.
    pub fn with_strides(&self, strides: Vec<StrideRecord>) -> Self {
        Self {
            name: self.name.clone(),
            variables: self.variables.clone(),
            strides,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Dataset, Measurement, StrideId, StrideRecord};
    use crate::PhasePoint;

    fn stride() -> StrideRecord {
        StrideRecord::new(StrideId::new("S01", "T1", "3"), "walking")
            .with_value("knee_flexion_angle", PhasePoint::whole_percent(0), 0.2)
            .with_value("knee_flexion_angle", PhasePoint::whole_percent(25), f64::NAN)
    }

    #[test]
    fn measurement_distinguishes_absent_variable_from_missing_phase() {
        let stride = stride();
        assert_eq!(
            stride.measurement("knee_flexion_angle", PhasePoint::whole_percent(0)),
            Measurement::Value(0.2)
        );
        assert_eq!(
            stride.measurement("knee_flexion_angle", PhasePoint::whole_percent(25)),
            Measurement::MissingPhase
        );
        assert_eq!(
            stride.measurement("hip_flexion_angle", PhasePoint::whole_percent(0)),
            Measurement::NotMeasured
        );
    }

    #[test]
    fn stride_id_display_joins_components() {
        assert_eq!(StrideId::new("S01", "T1", "3").to_string(), "S01/T1/3");
    }

    #[test]
    fn dataset_from_strides_collects_inventory_and_tasks() {
        let running = StrideRecord::new(StrideId::new("S02", "T1", "0"), "running").with_value(
            "ankle_moment",
            PhasePoint::whole_percent(50),
            1.1,
        );
        let dataset = Dataset::from_strides("demo", vec![stride(), running]);
        assert_eq!(dataset.len(), 2);
        assert!(dataset.variables.contains("ankle_moment"));
        assert!(dataset.variables.contains("knee_flexion_angle"));
        assert_eq!(
            dataset.tasks().into_iter().collect::<Vec<_>>(),
            vec!["running".to_string(), "walking".to_string()]
        );
    }

    #[test]
    fn replace_value_only_touches_sampled_cells() {
        let mut stride = stride();
        assert!(stride.replace_value("knee_flexion_angle", PhasePoint::whole_percent(0), 0.9));
        assert_eq!(
            stride.value("knee_flexion_angle", PhasePoint::whole_percent(0)),
            Some(0.9)
        );
        assert!(!stride.replace_value("knee_flexion_angle", PhasePoint::whole_percent(25), 0.9));
        assert_eq!(stride.cells().count(), 1);
    }
}
