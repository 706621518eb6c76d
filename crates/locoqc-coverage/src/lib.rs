// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use locoqc_core::{CoverageReport, Dataset, RunContext};
use locoqc_spec::{SpecTable, SpecificationStore};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Computes which specified tasks and variables a dataset can be checked on.
///
/// Stateless apart from the specification snapshot it reads; absence of a
/// task or variable is always reported, never raised.
#[derive(Clone, Debug)]
pub struct CoverageAnalyzer {
    table: Arc<SpecTable>,
}

impl CoverageAnalyzer {
    /// Uses the store's current snapshot.
    pub fn new(store: &SpecificationStore) -> Self {
        Self {
            table: store.snapshot(),
        }
    }

    pub fn with_table(table: Arc<SpecTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &SpecTable {
        &self.table
    }

    pub fn analyze(&self, dataset: &Dataset) -> CoverageReport {
        analyze_with_table(&self.table, dataset)
    }

    /// Analyzes many datasets; output order follows input order.
    pub fn analyze_many(&self, datasets: &[Dataset], ctx: &RunContext<'_>) -> Vec<CoverageReport> {
        #[cfg(feature = "rayon")]
        if ctx.allows_parallel() {
            return datasets.par_iter().map(|dataset| self.analyze(dataset)).collect();
        }
        #[cfg(not(feature = "rayon"))]
        let _ = ctx;
        datasets.iter().map(|dataset| self.analyze(dataset)).collect()
    }
}

/// Coverage of `dataset` against one specification table.
pub fn analyze_with_table(table: &SpecTable, dataset: &Dataset) -> CoverageReport {
    let detected_tasks = dataset.tasks();
    let mut report = CoverageReport {
        dataset: dataset.name.clone(),
        detected_tasks: detected_tasks.clone(),
        ..CoverageReport::default()
    };

    for task in &detected_tasks {
        if !table.has_task(task) {
            let message = format!(
                "task '{task}' has no specification entries; its strides are not validated"
            );
            tracing::warn!(dataset = %dataset.name, task = %task, "skipping unspecified task");
            report.warnings.push(message);
            report.skipped_tasks.insert(task.clone());
            continue;
        }

        let known = table.known_variables(task);
        let available: BTreeSet<String> = known
            .intersection(&dataset.variables)
            .cloned()
            .collect();
        let missing: BTreeSet<String> = known.difference(&dataset.variables).cloned().collect();
        let fraction = if known.is_empty() {
            0.0
        } else {
            available.len() as f64 / known.len() as f64
        };
        if available.is_empty() {
            report.warnings.push(format!(
                "task '{task}' shares no variables with the specification; validation scope is minimal"
            ));
        }

        report.validated_tasks.insert(task.clone());
        report.coverage_fraction.insert(task.clone(), fraction);
        report.available_variables.insert(task.clone(), available);
        report
            .missing_standard_variables
            .insert(task.clone(), missing);
    }

    let specified: BTreeSet<String> = table
        .known_tasks()
        .iter()
        .flat_map(|task| table.known_variables(task))
        .collect();
    report.unknown_variables = dataset
        .variables
        .difference(&specified)
        .cloned()
        .collect();

    tracing::debug!(
        dataset = %dataset.name,
        validated = report.validated_tasks.len(),
        skipped = report.skipped_tasks.len(),
        "coverage analyzed"
    );
    report
}

/// Coverage crate name helper.
pub fn crate_name() -> &'static str {
    "locoqc-coverage"
}
