// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Shared data model for locomotion stride quality gating: phase grid,
//! strides and datasets, specification ranges, validation/coverage/tuning
//! results, errors and run control.

pub mod config;
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod frame;
pub mod phase;
pub mod range;
pub mod results;
pub mod run_context;
#[cfg(feature = "serde")]
pub mod schema_migration;
pub mod stride;

pub use config::{EngineConfig, TunerConfig, UnknownTaskPolicy, ValidatorConfig};
pub use control::{CancelToken, ExecutionMode};
pub use diagnostics::{DIAGNOSTICS_SCHEMA_VERSION, Diagnostics};
pub use error::LocoError;
pub use frame::{Column, Frame, FrameLayout, PhaseColumn};
pub use phase::{CANONICAL_PHASE_SAMPLES, PhaseGrid, PhasePoint};
pub use range::{Bounds, RangeKey, RangeSource, VariableRange};
pub use results::{
    CoverageReport, DatasetImpact, ImpactSummary, RejectionReason, TuningMethod, TuningProposal,
    ValidationOutcome, ValidationScope,
};
pub use run_context::{ProgressSink, RunContext};
#[cfg(feature = "serde")]
pub use schema_migration::{
    CURRENT_SCHEMA_VERSION, EngineConfigWire, MAX_FORWARD_COMPAT_SCHEMA_VERSION, UnknownFields,
    engine_config_from_json, validate_schema_version,
};
pub use stride::{Dataset, Measurement, StrideId, StrideRecord};

/// Core shared types for locoqc.
pub fn crate_name() -> &'static str {
    "locoqc-core"
}
