// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Error type shared by every locoqc crate.
///
/// Only conditions that make further processing meaningless are errors.
/// Partial data gaps (unknown task, missing variable, out-of-range value,
/// small tuning samples) are reported in outcomes instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LocoError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("malformed dataset structure: {0}")]
    Structure(String),
    #[error("specification store failed to initialize: {0}")]
    SpecificationInit(String),
    #[error("specification conflict: {0}")]
    SpecificationConflict(String),
    #[error("numerical issue: {0}")]
    NumericalIssue(String),
    #[error("cancelled")]
    Cancelled,
}

impl LocoError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn structure(message: impl Into<String>) -> Self {
        Self::Structure(message.into())
    }

    pub fn specification_init(message: impl Into<String>) -> Self {
        Self::SpecificationInit(message.into())
    }

    pub fn specification_conflict(message: impl Into<String>) -> Self {
        Self::SpecificationConflict(message.into())
    }

    pub fn numerical_issue(message: impl Into<String>) -> Self {
        Self::NumericalIssue(message.into())
    }

    pub fn cancelled() -> Self {
        Self::Cancelled
    }

    /// True for errors raised by an explicit abort rather than bad data.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::LocoError;

    #[test]
    fn display_prefixes_identify_the_error_tier() {
        assert_eq!(
            LocoError::invalid_input("confidence must be in (0, 1)").to_string(),
            "invalid input: confidence must be in (0, 1)"
        );
        assert_eq!(
            LocoError::specification_conflict("min > max").to_string(),
            "specification conflict: min > max"
        );
        assert_eq!(LocoError::cancelled().to_string(), "cancelled");
    }

    #[test]
    fn is_cancelled_only_matches_cancelled_variant() {
        assert!(LocoError::cancelled().is_cancelled());
        assert!(!LocoError::structure("ragged columns").is_cancelled());
    }
}
