// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use locoqc_core::{PhaseGrid, PhasePoint, VariableRange};
use locoqc_spec::SpecificationStore;
use std::sync::Arc;
use std::thread;

fn range(variable: &str, phase: u8, min: f64, max: f64) -> VariableRange {
    VariableRange::new("walking", variable, PhasePoint::whole_percent(phase), min, max)
}

#[test]
fn concurrent_updates_are_serialized_and_all_recorded() {
    const THREADS: usize = 4;
    const UPDATES_PER_THREAD: usize = 25;

    let store = Arc::new(
        SpecificationStore::from_ranges(
            PhaseGrid::canonical(),
            vec![range("knee_flexion_angle", 0, -0.1, 1.5)],
        )
        .expect("store should load"),
    );

    let mut workers = Vec::with_capacity(THREADS);
    for worker in 0..THREADS {
        let store = Arc::clone(&store);
        workers.push(thread::spawn(move || {
            for step in 0..UPDATES_PER_THREAD {
                let width = 1.0 + (worker * UPDATES_PER_THREAD + step) as f64 * 0.01;
                store
                    .apply_update(vec![
                        range("knee_flexion_angle", 0, -width, width),
                        range("hip_flexion_angle", 25, -width, width),
                    ])
                    .expect("well-formed update should apply");
            }
        }));
    }
    for worker in workers {
        worker.join().expect("worker should join cleanly");
    }

    assert_eq!(store.revision(), (THREADS * UPDATES_PER_THREAD) as u64);
    assert_eq!(store.history().len(), THREADS * UPDATES_PER_THREAD);
    let inserted: usize = store
        .history()
        .iter()
        .map(|receipt| receipt.inserted.len())
        .sum();
    assert_eq!(inserted, 1, "hip range is inserted exactly once");
}

#[test]
fn readers_always_observe_whole_updates() {
    let store = Arc::new(
        SpecificationStore::from_ranges(
            PhaseGrid::canonical(),
            vec![
                range("knee_flexion_angle", 0, -1.0, 1.0),
                range("knee_flexion_angle", 25, -1.0, 1.0),
            ],
        )
        .expect("store should load"),
    );

    let writer_store = Arc::clone(&store);
    let writer = thread::spawn(move || {
        for step in 1..=200 {
            let width = 1.0 + step as f64;
            writer_store
                .apply_update(vec![
                    range("knee_flexion_angle", 0, -width, width),
                    range("knee_flexion_angle", 25, -width, width),
                ])
                .expect("update should apply");
        }
    });

    let reader_store = Arc::clone(&store);
    let reader = thread::spawn(move || {
        for _ in 0..500 {
            let snapshot = reader_store.snapshot();
            let first = snapshot
                .get("walking", "knee_flexion_angle", PhasePoint::whole_percent(0))
                .map(|r| r.max);
            let second = snapshot
                .get("walking", "knee_flexion_angle", PhasePoint::whole_percent(25))
                .map(|r| r.max);
            assert_eq!(first, second, "snapshot mixed two revisions");
        }
    });

    writer.join().expect("writer should join");
    reader.join().expect("reader should join");
}
