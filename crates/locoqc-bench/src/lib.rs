// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Deterministic synthetic fixtures shared by the benchmarks.

use locoqc_core::{Dataset, LocoError, PhaseGrid, StrideId, StrideRecord, VariableRange};
use locoqc_spec::SpecificationStore;

pub const VARIABLES: [&str; 6] = [
    "knee_flexion_angle",
    "hip_flexion_angle",
    "ankle_dorsiflexion_angle",
    "ankle_moment",
    "knee_moment",
    "grf_vertical",
];

pub fn lcg_next(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state
}

/// Uniform in [0, 1).
fn unit(state: &mut u64) -> f64 {
    (lcg_next(state) >> 11) as f64 / (1u64 << 53) as f64
}

/// Walking specification over every variable and canonical phase point.
pub fn walking_store() -> Result<SpecificationStore, LocoError> {
    let grid = PhaseGrid::canonical();
    let ranges = VARIABLES
        .iter()
        .flat_map(|variable| {
            grid.iter()
                .map(move |phase| VariableRange::new("walking", *variable, phase, 0.05, 0.95))
        })
        .collect();
    SpecificationStore::from_ranges(PhaseGrid::canonical(), ranges)
}

/// `strides` walking strides, each sampling every variable at every
/// canonical phase point; roughly a tenth of cells fall outside [0.05, 0.95].
pub fn walking_dataset(name: &str, strides: usize, seed: u64) -> Dataset {
    let grid = PhaseGrid::canonical();
    let mut state = seed;
    let records = (0..strides)
        .map(|i| {
            let mut stride = StrideRecord::new(
                StrideId::new(format!("S{:03}", i % 40), "T01", i.to_string()),
                "walking",
            )
            .with_phase_sample_count(150);
            for variable in VARIABLES {
                for phase in grid.iter() {
                    stride.insert(variable, phase, unit(&mut state));
                }
            }
            stride
        })
        .collect();
    Dataset::from_strides(name, records)
}
