// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::validator::{FilterResult, StrideValidator};
use crate::verdict::{DatasetVerdict, assess_dataset};
use locoqc_core::{CoverageReport, Dataset, LocoError, RunContext};
use locoqc_coverage::CoverageAnalyzer;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Coverage, filtering and verdict for one dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetValidation {
    pub coverage: CoverageReport,
    pub result: FilterResult,
    pub verdict: DatasetVerdict,
}

impl StrideValidator {
    /// Runs coverage analysis and filtering against this validator's snapshot.
    pub fn validate_dataset(
        &self,
        dataset: &Dataset,
        ctx: &RunContext<'_>,
    ) -> Result<DatasetValidation, LocoError> {
        let coverage = CoverageAnalyzer::with_table(self.table().clone()).analyze(dataset);
        let result = self.filter_valid_strides_with_context(dataset, &coverage, ctx)?;
        let verdict = assess_dataset(&result.summary);
        if let DatasetVerdict::Rejected(reason) = &verdict {
            tracing::warn!(dataset = %dataset.name, %reason, "dataset not usable");
        }
        Ok(DatasetValidation {
            coverage,
            result,
            verdict,
        })
    }

    /// Validates independent datasets, in parallel when allowed. The cancel
    /// token is checked before each dataset; output order follows input order.
    pub fn validate_datasets(
        &self,
        datasets: &[Dataset],
        ctx: &RunContext<'_>,
    ) -> Result<Vec<DatasetValidation>, LocoError> {
        ctx.check_cancelled()?;
        let total = datasets.len().max(1) as f32;
        let done = AtomicUsize::new(0);
        let run_one = |dataset: &Dataset| -> Result<DatasetValidation, LocoError> {
            ctx.check_cancelled()?;
            let validation = self.validate_dataset(dataset, ctx)?;
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            ctx.report_progress(finished as f32 / total);
            Ok(validation)
        };

        #[cfg(feature = "rayon")]
        if ctx.allows_parallel() {
            let results: Result<Vec<_>, LocoError> = datasets.par_iter().map(run_one).collect();
            log_batch(datasets.len(), &results);
            return results;
        }
        let results: Result<Vec<_>, LocoError> = datasets.iter().map(run_one).collect();
        log_batch(datasets.len(), &results);
        results
    }
}

/// Free-function form of [`StrideValidator::validate_datasets`].
pub fn validate_datasets(
    validator: &StrideValidator,
    datasets: &[Dataset],
    ctx: &RunContext<'_>,
) -> Result<Vec<DatasetValidation>, LocoError> {
    validator.validate_datasets(datasets, ctx)
}

fn log_batch(count: usize, results: &Result<Vec<DatasetValidation>, LocoError>) {
    match results {
        Ok(validations) => tracing::info!(
            datasets = count,
            usable = validations.iter().filter(|v| v.verdict.is_usable()).count(),
            "batch validated"
        ),
        Err(err) if err.is_cancelled() => tracing::info!(datasets = count, "batch cancelled"),
        Err(err) => tracing::warn!(datasets = count, error = %err, "batch failed"),
    }
}
