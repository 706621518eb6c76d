// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use libfuzzer_sys::fuzz_target;
use locoqc_core::{
    Dataset, PhaseGrid, PhasePoint, RunContext, StrideId, StrideRecord, TunerConfig, TuningMethod,
    UnknownTaskPolicy, ValidatorConfig, VariableRange,
};
use locoqc_coverage::CoverageAnalyzer;
use locoqc_spec::SpecificationStore;
use locoqc_tune::RangeTuner;
use locoqc_validate::{StrideValidator, assess_dataset};

const TASKS: [&str; 3] = ["walking", "running", "sprinting"];
const VARIABLES: [&str; 3] = ["knee_flexion_angle", "hip_flexion_angle", "ankle_moment"];
const PHASES: [u8; 5] = [0, 25, 50, 75, 10];

fn build_value(cursor: &mut common::ByteCursor<'_>) -> f64 {
    match cursor.next_u8() % 8 {
        0 => f64::NAN,
        1 => f64::INFINITY,
        2 => cursor.next_f64(),
        _ => f64::from(cursor.next_i16()) / 4096.0,
    }
}

fn build_ranges(cursor: &mut common::ByteCursor<'_>) -> Vec<VariableRange> {
    let count = common::bounded(cursor.next_u8(), 0, 12);
    let mut ranges: Vec<VariableRange> = Vec::with_capacity(count);
    for _ in 0..count {
        let task = TASKS[usize::from(cursor.next_u8()) % 2];
        let variable = VARIABLES[usize::from(cursor.next_u8()) % VARIABLES.len()];
        let phase = PhasePoint::whole_percent(PHASES[usize::from(cursor.next_u8()) % 4]);
        let a = f64::from(cursor.next_i16()) / 4096.0;
        let b = f64::from(cursor.next_i16()) / 4096.0;
        let range = VariableRange::new(task, variable, phase, a.min(b), a.max(b));
        if ranges.iter().all(|existing| existing.key != range.key) {
            ranges.push(range);
        }
    }
    ranges
}

fn build_dataset(cursor: &mut common::ByteCursor<'_>) -> Dataset {
    let strides = common::bounded(cursor.next_u8(), 0, 24);
    let records = (0..strides)
        .map(|i| {
            let task = TASKS[usize::from(cursor.next_u8()) % TASKS.len()];
            let mut stride = StrideRecord::new(StrideId::new("S", "T", i.to_string()), task);
            if cursor.next_u8() & 1 == 1 {
                stride = stride.with_phase_sample_count(common::bounded(cursor.next_u8(), 140, 160));
            }
            let cells = common::bounded(cursor.next_u8(), 0, 10);
            for _ in 0..cells {
                let variable = VARIABLES[usize::from(cursor.next_u8()) % VARIABLES.len()];
                let phase = PhasePoint::whole_percent(PHASES[usize::from(cursor.next_u8()) % PHASES.len()]);
                stride.insert(variable, phase, build_value(cursor));
            }
            stride
        })
        .collect();
    Dataset::from_strides("fuzz", records)
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);
    let Ok(store) = SpecificationStore::from_ranges(PhaseGrid::canonical(), build_ranges(&mut cursor))
    else {
        return;
    };
    let dataset = build_dataset(&mut cursor);
    let ctx = if cursor.next_u8() & 1 == 0 {
        RunContext::new()
    } else {
        RunContext::sequential()
    };

    let config = ValidatorConfig {
        unknown_task_policy: if cursor.next_u8() & 1 == 0 {
            UnknownTaskPolicy::KeepUnvalidated
        } else {
            UnknownTaskPolicy::Reject
        },
        ..ValidatorConfig::default()
    };
    let validator = StrideValidator::new(&store, config).expect("default config is valid");
    let coverage = CoverageAnalyzer::new(&store).analyze(&dataset);
    let result = validator
        .filter_valid_strides_with_context(&dataset, &coverage, &ctx)
        .expect("generated strides have unique ids");
    let summary = &result.summary;
    assert!((0.0..=1.0).contains(&summary.pass_rate));
    assert_eq!(summary.pass_rate == 1.0, summary.invalid_strides == 0);
    let _ = assess_dataset(summary);

    let method = match cursor.next_u8() % 3 {
        0 => TuningMethod::Percentile,
        1 => TuningMethod::Iqr,
        _ => TuningMethod::ZScore,
    };
    let confidence = 0.5 + f64::from(cursor.next_u8() % 99) / 200.0;
    let tuner = RangeTuner::new(&store, TunerConfig::default()).expect("default config is valid");
    let proposals = tuner
        .tune_ranges_with_context(&[dataset], method, confidence, &ctx)
        .expect("per-triple numerical issues never abort tuning");
    for proposal in &proposals {
        assert!(proposal.new_range.min < proposal.new_range.max);
    }
});
