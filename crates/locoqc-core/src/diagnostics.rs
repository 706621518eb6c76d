// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::control::ExecutionMode;
use std::borrow::Cow;

/// Diagnostics schema version for validation and tuning run metadata.
pub const DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Structured metadata captured from one validation or tuning run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostics {
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub component: Cow<'static, str>,
    pub runtime_ms: Option<u64>,
    pub execution: ExecutionMode,
    pub thread_count: Option<usize>,
    /// Revision of the specification table the run read from.
    pub specification_revision: Option<u64>,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            schema_version: DIAGNOSTICS_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            component: Cow::Borrowed(""),
            runtime_ms: None,
            execution: ExecutionMode::Parallel,
            thread_count: None,
            specification_revision: None,
            notes: vec![],
            warnings: vec![],
        }
    }
}

impl Diagnostics {
    pub fn for_component(component: &'static str) -> Self {
        Self {
            component: Cow::Borrowed(component),
            ..Self::default()
        }
    }
}
