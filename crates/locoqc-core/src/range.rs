// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::phase::PhasePoint;
use std::fmt;

/// Identity of one specification entry.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RangeKey {
    pub task: String,
    pub variable: String,
    pub phase_point: PhasePoint,
}

impl RangeKey {
    pub fn new(task: impl Into<String>, variable: impl Into<String>, phase_point: PhasePoint) -> Self {
        Self {
            task: task.into(),
            variable: variable.into(),
            phase_point,
        }
    }
}

impl fmt::Display for RangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.task, self.variable, self.phase_point)
    }
}

/// Closed numeric interval `[min, max]`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Non-finite values never fall inside.
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn is_well_formed(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Where a range came from.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RangeSource {
    /// Literature citation or other curated reference.
    Citation(String),
    /// Statistically derived from observed data; holds the method description.
    Derived(String),
}

impl Default for RangeSource {
    fn default() -> Self {
        Self::Citation(String::new())
    }
}

/// Acceptable range for one (task, variable, phase point) triple.
///
/// Construction does not check `min <= max`; the specification store is the
/// gatekeeper and refuses ill-formed ranges.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct VariableRange {
    pub key: RangeKey,
    pub min: f64,
    pub max: f64,
    pub typical: Option<Bounds>,
    pub units: String,
    pub source: RangeSource,
    pub sample_size: Option<usize>,
}

impl VariableRange {
    pub fn new(
        task: impl Into<String>,
        variable: impl Into<String>,
        phase_point: PhasePoint,
        min: f64,
        max: f64,
    ) -> Self {
        Self {
            key: RangeKey::new(task, variable, phase_point),
            min,
            max,
            typical: None,
            units: String::new(),
            source: RangeSource::default(),
            sample_size: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn with_typical(mut self, typical: Bounds) -> Self {
        self.typical = Some(typical);
        self
    }

    pub fn with_source(mut self, source: RangeSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = Some(sample_size);
        self
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        self.bounds().contains(value)
    }

    pub fn is_well_formed(&self) -> bool {
        self.bounds().is_well_formed()
    }

    /// Copy of this entry with new bounds; the key and units are kept.
    pub fn replaced_bounds(&self, min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            ..self.clone()
        }
    }
}
