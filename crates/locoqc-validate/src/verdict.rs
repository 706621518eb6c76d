// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::validator::ValidationSummary;
use std::fmt;

/// Why a whole dataset is not worth using.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetRejection {
    Empty,
    NoValidStrides,
    /// Every phase-indexed stride has the wrong sample count.
    BrokenPhaseStructure { affected: usize, expected: usize },
}

impl fmt::Display for DatasetRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("dataset holds no strides"),
            Self::NoValidStrides => f.write_str("no stride passed validation"),
            Self::BrokenPhaseStructure { affected, expected } => write!(
                f,
                "all {affected} phase-indexed strides deviate from {expected} samples per cycle"
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetVerdict {
    Usable,
    Rejected(DatasetRejection),
}

impl DatasetVerdict {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Usable)
    }
}

/// Dataset-level recommendation derived from a summary. The caller decides
/// whether to act on it.
pub fn assess_dataset(summary: &ValidationSummary) -> DatasetVerdict {
    if summary.is_empty() {
        return DatasetVerdict::Rejected(DatasetRejection::Empty);
    }
    if summary.phase_structure_broken() {
        let expected = summary
            .structural_issues
            .first()
            .map_or(0, |issue| issue.expected);
        return DatasetVerdict::Rejected(DatasetRejection::BrokenPhaseStructure {
            affected: summary.structural_issues.len(),
            expected,
        });
    }
    if summary.valid_strides == 0 {
        return DatasetVerdict::Rejected(DatasetRejection::NoValidStrides);
    }
    DatasetVerdict::Usable
}
