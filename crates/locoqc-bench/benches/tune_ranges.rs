// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use locoqc_bench::{walking_dataset, walking_store};
use locoqc_core::{RunContext, TunerConfig, TuningMethod};
use locoqc_tune::RangeTuner;

fn benchmark_tuning(c: &mut Criterion) {
    let store = walking_store().expect("benchmark specification should load");
    let datasets: Vec<_> = (0..4)
        .map(|i| walking_dataset(&format!("lab-{i}"), 5_000, 0xfeed_0000 + i))
        .collect();
    let tuner = RangeTuner::new(&store, TunerConfig::default())
        .expect("benchmark config should be valid");

    let mut group = c.benchmark_group("tune_ranges");

    for method in [TuningMethod::Percentile, TuningMethod::Iqr, TuningMethod::ZScore] {
        group.bench_function(format!("{method}_4x5000"), |b| {
            b.iter(|| {
                tuner
                    .tune_ranges(black_box(&datasets), method, 0.95)
                    .expect("tuning should succeed")
            })
        });
    }

    group.bench_function("percentile_sequential_4x5000", |b| {
        b.iter(|| {
            tuner
                .tune_ranges_with_context(
                    black_box(&datasets),
                    TuningMethod::Percentile,
                    0.95,
                    &RunContext::sequential(),
                )
                .expect("tuning should succeed")
        })
    });

    let proposals = tuner
        .tune_ranges(&datasets, TuningMethod::Percentile, 0.95)
        .expect("tuning should succeed");
    group.bench_function("impact_one_proposal_4x5000", |b| {
        b.iter(|| {
            tuner
                .analyze_impact(black_box(&proposals[0]), black_box(&datasets))
                .expect("impact should succeed")
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_tuning);
criterion_main!(benches);
