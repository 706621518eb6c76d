// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use locoqc_core::{Dataset, StrideId};
use std::collections::BTreeSet;

/// A phase-indexed stride whose sample count differs from the deployment's.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuralIssue {
    pub stride_id: StrideId,
    pub observed: usize,
    pub expected: usize,
}

/// Phase-cardinality check over a whole dataset, independent of ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PhaseStructureReport {
    pub expected: usize,
    /// Strides that claim phase indexing.
    pub phase_indexed: usize,
    pub issues: Vec<StructuralIssue>,
    /// Distinct sample counts seen across phase-indexed strides.
    pub observed_cardinalities: BTreeSet<usize>,
}

impl PhaseStructureReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Every phase-indexed stride is malformed, so "N samples per cycle"
    /// cannot be verified for this dataset at all.
    pub fn all_broken(&self) -> bool {
        self.phase_indexed > 0 && self.issues.len() == self.phase_indexed
    }

    pub fn inconsistent_cardinality(&self) -> bool {
        self.observed_cardinalities.len() > 1
    }
}

pub fn check_phase_structure(dataset: &Dataset, expected: usize) -> PhaseStructureReport {
    let mut report = PhaseStructureReport {
        expected,
        ..PhaseStructureReport::default()
    };
    for stride in &dataset.strides {
        let Some(observed) = stride.phase_sample_count else {
            continue;
        };
        report.phase_indexed += 1;
        report.observed_cardinalities.insert(observed);
        if observed != expected {
            report.issues.push(StructuralIssue {
                stride_id: stride.id.clone(),
                observed,
                expected,
            });
        }
    }
    report
}
