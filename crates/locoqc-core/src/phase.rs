// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::LocoError;
use std::fmt;

/// Canonical number of evenly spaced samples per phase-indexed gait cycle.
pub const CANONICAL_PHASE_SAMPLES: usize = 150;

const CENTI_PER_PERCENT: u16 = 100;
const FULL_CYCLE_CENTI: u16 = 100 * CENTI_PER_PERCENT;

/// Normalized position within a gait cycle, stored in hundredths of a percent.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhasePoint(u16);

impl PhasePoint {
    pub const HEEL_STRIKE: Self = Self(0);

    /// Whole-percent constructor; values above 100 saturate to 100%.
    pub const fn whole_percent(percent: u8) -> Self {
        let clamped = if percent > 100 { 100 } else { percent };
        Self(clamped as u16 * CENTI_PER_PERCENT)
    }

    /// Builds a phase point from a percentage, rounded to 0.01%.
    pub fn from_percent(percent: f64) -> Result<Self, LocoError> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(LocoError::invalid_input(format!(
                "phase percent must be finite and within [0, 100], got {percent}"
            )));
        }
        let centi = (percent * f64::from(CENTI_PER_PERCENT)).round();
        Ok(Self(centi as u16))
    }

    pub fn centi_percent(self) -> u16 {
        self.0
    }

    pub fn percent(self) -> f64 {
        f64::from(self.0) / f64::from(CENTI_PER_PERCENT)
    }

    /// Position in `[0, 1]`.
    pub fn fraction(self) -> f64 {
        f64::from(self.0) / f64::from(FULL_CYCLE_CENTI)
    }

    /// Nearest sample index in a cycle of `samples` evenly spaced points,
    /// where sample `i` sits at `i / samples` of the cycle.
    pub fn sample_index(self, samples: usize) -> Option<usize> {
        if samples == 0 {
            return None;
        }
        let idx = (self.fraction() * samples as f64).round() as usize;
        Some(idx.min(samples - 1))
    }
}

impl fmt::Display for PhasePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / CENTI_PER_PERCENT;
        let frac = self.0 % CENTI_PER_PERCENT;
        if frac == 0 {
            write!(f, "{whole}%")
        } else if frac % 10 == 0 {
            write!(f, "{whole}.{}%", frac / 10)
        } else {
            write!(f, "{whole}.{frac:02}%")
        }
    }
}

/// The fixed set of phase points shared by the store, validator and tuner.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseGrid {
    points: Vec<PhasePoint>,
}

impl PhaseGrid {
    /// Validates that points are non-empty, strictly increasing and below 100%.
    pub fn new(points: Vec<PhasePoint>) -> Result<Self, LocoError> {
        if points.is_empty() {
            return Err(LocoError::invalid_input(
                "phase grid must contain at least one phase point",
            ));
        }
        if let Some(last) = points.last() {
            if last.0 >= FULL_CYCLE_CENTI {
                return Err(LocoError::invalid_input(format!(
                    "phase grid points must lie below 100%, got {last}"
                )));
            }
        }
        if let Some(pair) = points.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(LocoError::invalid_input(format!(
                "phase grid must be strictly increasing: {} is followed by {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self { points })
    }

    pub fn from_percentages(percentages: &[f64]) -> Result<Self, LocoError> {
        let points = percentages
            .iter()
            .map(|&percent| PhasePoint::from_percent(percent))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(points)
    }

    /// 0%, 25%, 50%, 75%.
    pub fn canonical() -> Self {
        Self {
            points: vec![
                PhasePoint::whole_percent(0),
                PhasePoint::whole_percent(25),
                PhasePoint::whole_percent(50),
                PhasePoint::whole_percent(75),
            ],
        }
    }

    pub fn points(&self) -> &[PhasePoint] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = PhasePoint> + '_ {
        self.points.iter().copied()
    }

    pub fn contains(&self, point: PhasePoint) -> bool {
        self.points.binary_search(&point).is_ok()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Default for PhaseGrid {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::{CANONICAL_PHASE_SAMPLES, PhaseGrid, PhasePoint};

    #[test]
    fn display_trims_fractional_percent() {
        assert_eq!(PhasePoint::whole_percent(25).to_string(), "25%");
        assert_eq!(
            PhasePoint::from_percent(12.5)
                .expect("12.5 is a valid phase")
                .to_string(),
            "12.5%"
        );
        assert_eq!(
            PhasePoint::from_percent(33.33)
                .expect("33.33 is a valid phase")
                .to_string(),
            "33.33%"
        );
    }

    #[test]
    fn from_percent_rejects_out_of_cycle_values() {
        assert!(PhasePoint::from_percent(-0.5).is_err());
        assert!(PhasePoint::from_percent(100.5).is_err());
        assert!(PhasePoint::from_percent(f64::NAN).is_err());
    }

    #[test]
    fn whole_percent_saturates() {
        assert_eq!(PhasePoint::whole_percent(250), PhasePoint::whole_percent(100));
    }

    #[test]
    fn sample_index_maps_canonical_points_into_150_samples() {
        let indices: Vec<usize> = PhaseGrid::canonical()
            .iter()
            .map(|point| {
                point
                    .sample_index(CANONICAL_PHASE_SAMPLES)
                    .expect("non-zero sample count")
            })
            .collect();
        assert_eq!(indices, vec![0, 38, 75, 113]);
        assert_eq!(PhasePoint::whole_percent(100).sample_index(150), Some(149));
        assert_eq!(PhasePoint::HEEL_STRIKE.sample_index(0), None);
    }

    #[test]
    fn grid_rejects_unsorted_duplicate_and_full_cycle_points() {
        assert!(PhaseGrid::new(vec![]).is_err());
        assert!(PhaseGrid::from_percentages(&[50.0, 25.0]).is_err());
        assert!(PhaseGrid::from_percentages(&[25.0, 25.0]).is_err());
        let err = PhaseGrid::from_percentages(&[0.0, 100.0]).expect_err("100% is excluded");
        assert!(err.to_string().contains("below 100%"));
    }

    #[test]
    fn canonical_grid_contains_quarter_points() {
        let grid = PhaseGrid::canonical();
        assert_eq!(grid.len(), 4);
        assert!(grid.contains(PhasePoint::whole_percent(75)));
        assert!(!grid.contains(PhasePoint::whole_percent(60)));
    }
}
