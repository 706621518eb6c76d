// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::LocoError;
use crate::phase::CANONICAL_PHASE_SAMPLES;

const DEFAULT_MIN_SAMPLE_SIZE: usize = 10;
const DEFAULT_SIGNIFICANT_CHANGE_THRESHOLD: f64 = 0.10;
const DEFAULT_DEGENERATE_HALF_WIDTH: f64 = 1.0e-3;
const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

/// What the validator does with strides whose task has no specification.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownTaskPolicy {
    /// Keep the stride as valid-by-default with minimal validation scope.
    #[default]
    KeepUnvalidated,
    /// Reject the stride with an unknown-task reason.
    Reject,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Phase samples a phase-indexed stride must carry.
    pub expected_phase_samples: usize,
    pub unknown_task_policy: UnknownTaskPolicy,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            expected_phase_samples: CANONICAL_PHASE_SAMPLES,
            unknown_task_policy: UnknownTaskPolicy::default(),
        }
    }
}

impl ValidatorConfig {
    pub fn validate(&self) -> Result<(), LocoError> {
        if self.expected_phase_samples == 0 {
            return Err(LocoError::invalid_input(
                "ValidatorConfig.expected_phase_samples must be >= 1",
            ));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct TunerConfig {
    /// Pooled observations below this count flag a proposal as low confidence.
    pub min_sample_size: usize,
    /// Relative change against the current range that counts as significant.
    pub significant_change_threshold: f64,
    /// Half width applied when a derived range collapses to a point.
    pub degenerate_half_width: f64,
    pub iqr_multiplier: f64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
            significant_change_threshold: DEFAULT_SIGNIFICANT_CHANGE_THRESHOLD,
            degenerate_half_width: DEFAULT_DEGENERATE_HALF_WIDTH,
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
        }
    }
}

impl TunerConfig {
    pub fn validate(&self) -> Result<(), LocoError> {
        if self.min_sample_size == 0 {
            return Err(LocoError::invalid_input(
                "TunerConfig.min_sample_size must be >= 1",
            ));
        }
        if !self.significant_change_threshold.is_finite() || self.significant_change_threshold < 0.0
        {
            return Err(LocoError::invalid_input(format!(
                "TunerConfig.significant_change_threshold must be finite and >= 0, got {}",
                self.significant_change_threshold
            )));
        }
        if !self.degenerate_half_width.is_finite() || self.degenerate_half_width <= 0.0 {
            return Err(LocoError::invalid_input(format!(
                "TunerConfig.degenerate_half_width must be finite and > 0, got {}",
                self.degenerate_half_width
            )));
        }
        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(LocoError::invalid_input(format!(
                "TunerConfig.iqr_multiplier must be finite and >= 0, got {}",
                self.iqr_multiplier
            )));
        }
        Ok(())
    }
}

/// Top-level engine configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineConfig {
    pub validator: ValidatorConfig,
    pub tuner: TunerConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), LocoError> {
        self.validator.validate()?;
        self.tuner.validate()
    }
}
