// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::structure::{StructuralIssue, check_phase_structure};
use locoqc_core::{
    CoverageReport, Dataset, Diagnostics, LocoError, Measurement, RejectionReason, RunContext,
    StrideRecord, UnknownTaskPolicy, ValidationOutcome, ValidationScope, ValidatorConfig,
};
use locoqc_spec::{SpecTable, SpecificationStore};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Aggregate counts for one filtered dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationSummary {
    pub dataset: String,
    pub total_strides: usize,
    pub valid_strides: usize,
    pub invalid_strides: usize,
    /// `valid / total`, or 1.0 when the dataset holds no strides.
    pub pass_rate: f64,
    /// Strides that passed without a single checkable pair.
    pub minimal_scope_strides: usize,
    pub phase_indexed_strides: usize,
    pub structural_issues: Vec<StructuralIssue>,
    pub scope: ValidationScope,
    /// Out-of-range rejections per variable.
    pub violations_by_variable: BTreeMap<String, usize>,
    pub diagnostics: Diagnostics,
}

impl ValidationSummary {
    pub fn is_empty(&self) -> bool {
        self.total_strides == 0
    }

    /// Every phase-indexed stride carries the wrong number of samples.
    pub fn phase_structure_broken(&self) -> bool {
        self.phase_indexed_strides > 0 && self.structural_issues.len() == self.phase_indexed_strides
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterResult {
    /// Passing strides in input order, with the source variable inventory.
    pub filtered: Dataset,
    /// One outcome per input stride, in input order.
    pub outcomes: Vec<ValidationOutcome>,
    pub summary: ValidationSummary,
}

impl FilterResult {
    pub fn rejected(&self) -> impl Iterator<Item = &ValidationOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.valid)
    }
}

/// Checks strides against one specification snapshot.
#[derive(Clone, Debug)]
pub struct StrideValidator {
    table: Arc<SpecTable>,
    config: ValidatorConfig,
    revision: Option<u64>,
}

impl StrideValidator {
    /// Reads the store's current snapshot; later updates are not observed.
    pub fn new(store: &SpecificationStore, config: ValidatorConfig) -> Result<Self, LocoError> {
        config.validate()?;
        Ok(Self {
            table: store.snapshot(),
            config,
            revision: Some(store.revision()),
        })
    }

    pub fn with_table(table: Arc<SpecTable>, config: ValidatorConfig) -> Result<Self, LocoError> {
        config.validate()?;
        Ok(Self {
            table,
            config,
            revision: None,
        })
    }

    pub fn table(&self) -> &Arc<SpecTable> {
        &self.table
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn filter_valid_strides(
        &self,
        dataset: &Dataset,
        coverage: &CoverageReport,
    ) -> Result<FilterResult, LocoError> {
        self.filter_valid_strides_with_context(dataset, coverage, &RunContext::new())
    }

    pub fn filter_valid_strides_with_context(
        &self,
        dataset: &Dataset,
        coverage: &CoverageReport,
        ctx: &RunContext<'_>,
    ) -> Result<FilterResult, LocoError> {
        ctx.check_cancelled()?;
        let started_at = Instant::now();
        check_inputs(dataset, coverage)?;

        let outcomes = self.validate_strides(&dataset.strides, coverage, ctx);

        let filtered_strides: Vec<StrideRecord> = dataset
            .strides
            .iter()
            .zip(&outcomes)
            .filter(|(_, outcome)| outcome.valid)
            .map(|(stride, _)| stride.clone())
            .collect();
        let structure = check_phase_structure(dataset, self.config.expected_phase_samples);

        let total = outcomes.len();
        let valid = filtered_strides.len();
        let pass_rate = if total == 0 {
            1.0
        } else {
            valid as f64 / total as f64
        };
        let minimal_scope_strides = outcomes
            .iter()
            .filter(|outcome| outcome.valid && outcome.scope == ValidationScope::Minimal)
            .count();

        let mut violations_by_variable = BTreeMap::new();
        for outcome in &outcomes {
            for reason in outcome.violations() {
                if let RejectionReason::OutOfRange { variable, .. } = reason {
                    *violations_by_variable.entry(variable.clone()).or_insert(0) += 1;
                }
            }
        }

        let mut diagnostics = Diagnostics::for_component("stride-validator");
        diagnostics.execution = ctx.execution;
        diagnostics.thread_count = Some(thread_count(ctx));
        diagnostics.specification_revision = self.revision;
        diagnostics.runtime_ms = Some(started_at.elapsed().as_millis() as u64);
        diagnostics.warnings.extend(coverage.warnings.iter().cloned());
        if !structure.is_clean() {
            let message = format!(
                "{} of {} phase-indexed strides do not carry {} samples",
                structure.issues.len(),
                structure.phase_indexed,
                structure.expected
            );
            tracing::warn!(dataset = %dataset.name, affected = structure.issues.len(), "{message}");
            diagnostics.warnings.push(message);
        }
        if structure.inconsistent_cardinality() {
            diagnostics.warnings.push(format!(
                "phase-indexed strides use inconsistent sample counts: {:?}",
                structure.observed_cardinalities
            ));
        }
        if total > 0 && minimal_scope_strides == total {
            diagnostics
                .notes
                .push("no stride had a checkable pair; every pass is valid-by-default".to_string());
        }

        let summary = ValidationSummary {
            dataset: dataset.name.clone(),
            total_strides: total,
            valid_strides: valid,
            invalid_strides: total - valid,
            pass_rate,
            minimal_scope_strides,
            phase_indexed_strides: structure.phase_indexed,
            structural_issues: structure.issues,
            scope: dataset_scope(&outcomes),
            violations_by_variable,
            diagnostics,
        };
        tracing::info!(
            dataset = %summary.dataset,
            total = summary.total_strides,
            valid = summary.valid_strides,
            pass_rate = summary.pass_rate,
            scope = ?summary.scope,
            "strides filtered"
        );

        Ok(FilterResult {
            filtered: dataset.with_strides(filtered_strides),
            outcomes,
            summary,
        })
    }

    fn validate_strides(
        &self,
        strides: &[StrideRecord],
        coverage: &CoverageReport,
        ctx: &RunContext<'_>,
    ) -> Vec<ValidationOutcome> {
        #[cfg(feature = "rayon")]
        if ctx.allows_parallel() {
            return strides
                .par_iter()
                .map(|stride| self.validate_stride(stride, coverage))
                .collect();
        }
        #[cfg(not(feature = "rayon"))]
        let _ = ctx;
        strides
            .iter()
            .map(|stride| self.validate_stride(stride, coverage))
            .collect()
    }

    /// Checks one stride; never fails, every problem becomes a reason.
    pub fn validate_stride(&self, stride: &StrideRecord, coverage: &CoverageReport) -> ValidationOutcome {
        let mut reasons = Vec::new();
        let mut notes = Vec::new();
        let mut checked_pairs = 0usize;
        let mut skipped_pairs = 0usize;

        if let Some(observed) = stride.phase_sample_count {
            let expected = self.config.expected_phase_samples;
            if observed != expected {
                reasons.push(RejectionReason::PhaseStructure { observed, expected });
            }
        }

        let scope = if !coverage.is_validated(&stride.task) {
            match self.config.unknown_task_policy {
                UnknownTaskPolicy::KeepUnvalidated => notes.push(format!(
                    "unknown task '{}': stride kept without range checks",
                    stride.task
                )),
                UnknownTaskPolicy::Reject => reasons.push(RejectionReason::UnknownTask {
                    task: stride.task.clone(),
                }),
            }
            ValidationScope::Minimal
        } else {
            let task_ranges = self.table.task_ranges(&stride.task);
            let available = coverage.available_for(&stride.task);
            for variable in available.into_iter().flatten() {
                let Some(points) = task_ranges.and_then(|ranges| ranges.get(variable)) else {
                    continue;
                };
                for phase_point in self.table.grid().iter() {
                    let Some(range) = points.get(&phase_point) else {
                        continue;
                    };
                    match stride.measurement(variable, phase_point) {
                        Measurement::NotMeasured | Measurement::MissingPhase => skipped_pairs += 1,
                        Measurement::Value(value) => {
                            checked_pairs += 1;
                            if !range.contains(value) {
                                reasons.push(RejectionReason::OutOfRange {
                                    variable: variable.clone(),
                                    phase_point,
                                    value,
                                    expected: range.bounds(),
                                    units: range.units.clone(),
                                });
                            }
                        }
                    }
                }
            }

            if checked_pairs == 0 {
                notes.push("no checkable (variable, phase point) pairs; valid by default".to_string());
                ValidationScope::Minimal
            } else if skipped_pairs == 0 && coverage.scope_for(&stride.task) == ValidationScope::Full {
                ValidationScope::Full
            } else {
                ValidationScope::Partial
            }
        };

        let outcome = ValidationOutcome {
            stride_id: stride.id.clone(),
            task: stride.task.clone(),
            valid: reasons.is_empty(),
            rejection_reasons: reasons,
            checked_pairs,
            skipped_pairs,
            scope,
            notes,
        };
        if !outcome.valid {
            for line in outcome.describe() {
                tracing::debug!("{line}");
            }
        }
        outcome
    }
}

fn check_inputs(dataset: &Dataset, coverage: &CoverageReport) -> Result<(), LocoError> {
    if coverage.dataset != dataset.name {
        return Err(LocoError::invalid_input(format!(
            "coverage report is for dataset '{}', not '{}'",
            coverage.dataset, dataset.name
        )));
    }
    let mut seen = HashSet::with_capacity(dataset.strides.len());
    for stride in &dataset.strides {
        if !seen.insert(&stride.id) {
            return Err(LocoError::structure(format!(
                "cannot determine stride grouping: stride {} appears more than once in '{}'",
                stride.id, dataset.name
            )));
        }
    }
    Ok(())
}

/// Full only if every stride was fully checked, Minimal if none had a check.
fn dataset_scope(outcomes: &[ValidationOutcome]) -> ValidationScope {
    if outcomes.is_empty() {
        return ValidationScope::Minimal;
    }
    if outcomes.iter().all(|o| o.scope == ValidationScope::Full) {
        ValidationScope::Full
    } else if outcomes.iter().all(|o| o.scope == ValidationScope::Minimal) {
        ValidationScope::Minimal
    } else {
        ValidationScope::Partial
    }
}

fn thread_count(ctx: &RunContext<'_>) -> usize {
    #[cfg(feature = "rayon")]
    if ctx.allows_parallel() {
        return rayon::current_num_threads();
    }
    #[cfg(not(feature = "rayon"))]
    let _ = ctx;
    1
}
