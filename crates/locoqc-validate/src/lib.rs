// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod batch;
pub mod structure;
pub mod validator;
pub mod verdict;

pub use batch::{DatasetValidation, validate_datasets};
pub use structure::{PhaseStructureReport, StructuralIssue, check_phase_structure};
pub use validator::{FilterResult, StrideValidator, ValidationSummary};
pub use verdict::{DatasetRejection, DatasetVerdict, assess_dataset};

/// Stride validator crate name helper.
pub fn crate_name() -> &'static str {
    let _ = locoqc_coverage::crate_name();
    "locoqc-validate"
}
