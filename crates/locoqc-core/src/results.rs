// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::phase::PhasePoint;
use crate::range::{Bounds, RangeKey, VariableRange};
use crate::stride::StrideId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// How much of the specification a stride or dataset was checked against.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationScope {
    /// Nothing checkable; a pass carries no evidence.
    Minimal,
    Partial,
    Full,
}

/// Why a stride was rejected.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub enum RejectionReason {
    OutOfRange {
        variable: String,
        phase_point: PhasePoint,
        value: f64,
        expected: Bounds,
        units: String,
    },
    UnknownTask {
        task: String,
    },
    PhaseStructure {
        observed: usize,
        expected: usize,
    },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                variable,
                phase_point,
                value,
                expected,
                units,
            } => {
                write!(f, "{variable} at {phase_point} = {value}")?;
                if !units.is_empty() {
                    write!(f, " {units}")?;
                }
                write!(f, " outside expected {expected}")
            }
            Self::UnknownTask { task } => write!(f, "unknown task '{task}'"),
            Self::PhaseStructure { observed, expected } => write!(
                f,
                "phase-indexed stride has {observed} samples, expected {expected}"
            ),
        }
    }
}

/// Per-stride validation result.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationOutcome {
    pub stride_id: StrideId,
    pub task: String,
    pub valid: bool,
    pub rejection_reasons: Vec<RejectionReason>,
    /// (variable, phase point) pairs compared against a range.
    pub checked_pairs: usize,
    /// Specified pairs of an available variable the stride did not sample.
    pub skipped_pairs: usize,
    pub scope: ValidationScope,
    pub notes: Vec<String>,
}

impl ValidationOutcome {
    /// Out-of-range reasons only.
    pub fn violations(&self) -> impl Iterator<Item = &RejectionReason> {
        self.rejection_reasons
            .iter()
            .filter(|reason| matches!(reason, RejectionReason::OutOfRange { .. }))
    }

    /// One line per reason, prefixed with the stride identity.
    pub fn describe(&self) -> Vec<String> {
        self.rejection_reasons
            .iter()
            .map(|reason| format!("stride {} ({}): {reason}", self.stride_id, self.task))
            .collect()
    }
}

/// Coverage of one dataset against the specification.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoverageReport {
    pub dataset: String,
    pub detected_tasks: BTreeSet<String>,
    pub validated_tasks: BTreeSet<String>,
    /// Detected tasks with no specification entries.
    pub skipped_tasks: BTreeSet<String>,
    pub available_variables: BTreeMap<String, BTreeSet<String>>,
    pub missing_standard_variables: BTreeMap<String, BTreeSet<String>>,
    /// Declared variables that no specified task knows.
    pub unknown_variables: BTreeSet<String>,
    pub coverage_fraction: BTreeMap<String, f64>,
    pub warnings: Vec<String>,
}

impl CoverageReport {
    pub fn available_for(&self, task: &str) -> Option<&BTreeSet<String>> {
        self.available_variables.get(task)
    }

    pub fn is_validated(&self, task: &str) -> bool {
        self.validated_tasks.contains(task)
    }

    pub fn scope_for(&self, task: &str) -> ValidationScope {
        match self.coverage_fraction.get(task) {
            Some(&fraction) if fraction >= 1.0 => ValidationScope::Full,
            Some(&fraction) if fraction > 0.0 => ValidationScope::Partial,
            _ => ValidationScope::Minimal,
        }
    }

    /// True when no detected task has a single checkable variable.
    pub fn minimal_validation_scope(&self) -> bool {
        self.validated_tasks
            .iter()
            .all(|task| self.available_variables.get(task).is_none_or(BTreeSet::is_empty))
    }
}

/// Statistical method used to derive a proposed range.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TuningMethod {
    Percentile,
    Iqr,
    ZScore,
}

impl TuningMethod {
    pub fn label(self) -> &'static str {
        match self {
            Self::Percentile => "percentile",
            Self::Iqr => "iqr",
            Self::ZScore => "zscore",
        }
    }
}

impl fmt::Display for TuningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Effect of one proposal on one dataset.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetImpact {
    pub dataset: String,
    pub baseline_valid: usize,
    pub proposed_valid: usize,
    /// Valid under the current specification, invalid under the proposal.
    pub newly_invalid: usize,
    /// Invalid under the current specification, valid under the proposal.
    pub newly_valid: usize,
}

impl DatasetImpact {
    pub fn improved(&self) -> bool {
        self.newly_valid > self.newly_invalid
    }

    pub fn degraded(&self) -> bool {
        self.newly_invalid > self.newly_valid
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImpactSummary {
    pub datasets_improved: usize,
    pub datasets_degraded: usize,
    pub per_dataset: Vec<DatasetImpact>,
}

impl ImpactSummary {
    pub fn from_datasets(per_dataset: Vec<DatasetImpact>) -> Self {
        Self {
            datasets_improved: per_dataset.iter().filter(|d| d.improved()).count(),
            datasets_degraded: per_dataset.iter().filter(|d| d.degraded()).count(),
            per_dataset,
        }
    }
}

/// Proposed replacement for one specification entry.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct TuningProposal {
    pub key: RangeKey,
    /// `None` when the triple has no current entry.
    pub old_range: Option<VariableRange>,
    pub new_range: VariableRange,
    pub method: TuningMethod,
    pub confidence: f64,
    pub supporting_sample_size: usize,
    pub low_confidence: bool,
    /// The pooled distribution had (near) zero spread and the range was widened.
    pub degenerate: bool,
    pub relative_change: Option<f64>,
    pub significant_change: bool,
    pub impact: Option<ImpactSummary>,
}

impl TuningProposal {
    pub fn is_new_entry(&self) -> bool {
        self.old_range.is_none()
    }

    pub fn datasets_improved(&self) -> Option<usize> {
        self.impact.as_ref().map(|impact| impact.datasets_improved)
    }

    pub fn datasets_degraded(&self) -> Option<usize> {
        self.impact.as_ref().map(|impact| impact.datasets_degraded)
    }
}
