// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::stats::derive_bounds;
use locoqc_core::{
    Dataset, Diagnostics, LocoError, RangeKey, RangeSource, RunContext, TunerConfig,
    TuningMethod, TuningProposal, ValidatorConfig, VariableRange,
};
use locoqc_spec::{SpecTable, SpecificationStore};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Floor for the current range width when computing relative change, and the
/// relative width below which a derived range counts as collapsed.
const WIDTH_EPSILON: f64 = 1.0e-12;

/// Proposals plus run metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct TuningRun {
    pub proposals: Vec<TuningProposal>,
    pub diagnostics: Diagnostics,
}

/// Derives candidate ranges from pooled observations. Never writes to the
/// store; proposals go through [`crate::ValidationSpecManager`].
#[derive(Clone, Debug)]
pub struct RangeTuner {
    table: Arc<SpecTable>,
    config: TunerConfig,
    validator_config: ValidatorConfig,
    revision: Option<u64>,
}

impl RangeTuner {
    pub fn new(store: &SpecificationStore, config: TunerConfig) -> Result<Self, LocoError> {
        config.validate()?;
        Ok(Self {
            table: store.snapshot(),
            config,
            validator_config: ValidatorConfig::default(),
            revision: Some(store.revision()),
        })
    }

    pub fn with_table(table: Arc<SpecTable>, config: TunerConfig) -> Result<Self, LocoError> {
        config.validate()?;
        Ok(Self {
            table,
            config,
            validator_config: ValidatorConfig::default(),
            revision: None,
        })
    }

    /// Validator settings used by impact analysis.
    pub fn with_validator_config(mut self, config: ValidatorConfig) -> Result<Self, LocoError> {
        config.validate()?;
        self.validator_config = config;
        Ok(self)
    }

    pub fn table(&self) -> &Arc<SpecTable> {
        &self.table
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub(crate) fn validator_config(&self) -> &ValidatorConfig {
        &self.validator_config
    }

    pub fn tune_ranges(
        &self,
        datasets: &[Dataset],
        method: TuningMethod,
        confidence: f64,
    ) -> Result<Vec<TuningProposal>, LocoError> {
        self.tune_ranges_with_context(datasets, method, confidence, &RunContext::new())
    }

    pub fn tune_ranges_with_context(
        &self,
        datasets: &[Dataset],
        method: TuningMethod,
        confidence: f64,
        ctx: &RunContext<'_>,
    ) -> Result<Vec<TuningProposal>, LocoError> {
        Ok(self
            .tune_ranges_with_diagnostics(datasets, method, confidence, ctx)?
            .proposals)
    }

    /// One proposal per pooled (task, variable, grid phase point) triple, in
    /// key order.
    pub fn tune_ranges_with_diagnostics(
        &self,
        datasets: &[Dataset],
        method: TuningMethod,
        confidence: f64,
        ctx: &RunContext<'_>,
    ) -> Result<TuningRun, LocoError> {
        if confidence.is_nan() || confidence <= 0.0 || confidence >= 1.0 {
            return Err(LocoError::invalid_input(format!(
                "confidence must be in (0, 1), got {confidence}"
            )));
        }
        let started_at = Instant::now();

        let pooled = self.pool(datasets, ctx)?;
        ctx.check_cancelled()?;
        ctx.report_progress(0.5);

        let (proposals, unreliable) = self.propose_all(pooled, method, confidence, ctx)?;
        ctx.report_progress(1.0);

        let mut diagnostics = Diagnostics::for_component("range-tuner");
        diagnostics.execution = ctx.execution;
        diagnostics.specification_revision = self.revision;
        diagnostics.runtime_ms = Some(started_at.elapsed().as_millis() as u64);
        diagnostics.notes.push(format!(
            "method={method} confidence={confidence} datasets={}",
            datasets.len()
        ));
        diagnostics.warnings.extend(unreliable);
        for proposal in &proposals {
            if proposal.low_confidence {
                diagnostics.warnings.push(format!(
                    "{} supported by only {} observations",
                    proposal.key, proposal.supporting_sample_size
                ));
            }
            if proposal.degenerate {
                diagnostics
                    .warnings
                    .push(format!("{} has zero spread; range widened", proposal.key));
            }
        }
        tracing::info!(
            proposals = proposals.len(),
            significant = proposals.iter().filter(|p| p.significant_change).count(),
            method = %method,
            "ranges tuned"
        );
        Ok(TuningRun {
            proposals,
            diagnostics,
        })
    }

    /// Gathers finite values per triple across every dataset before any
    /// statistic is computed.
    fn pool(
        &self,
        datasets: &[Dataset],
        ctx: &RunContext<'_>,
    ) -> Result<BTreeMap<RangeKey, Vec<f64>>, LocoError> {
        let grid = self.table.grid();
        let mut pooled: BTreeMap<RangeKey, Vec<f64>> = BTreeMap::new();
        for dataset in datasets {
            ctx.check_cancelled()?;
            for stride in &dataset.strides {
                for (variable, phase_point, value) in stride.cells() {
                    if !value.is_finite() || !grid.contains(phase_point) {
                        continue;
                    }
                    pooled
                        .entry(RangeKey::new(stride.task.as_str(), variable, phase_point))
                        .or_default()
                        .push(value);
                }
            }
        }
        Ok(pooled)
    }

    /// Statistics per triple are independent: a triple whose bounds cannot be
    /// computed is dropped with a warning instead of failing the run.
    fn propose_all(
        &self,
        pooled: BTreeMap<RangeKey, Vec<f64>>,
        method: TuningMethod,
        confidence: f64,
        ctx: &RunContext<'_>,
    ) -> Result<(Vec<TuningProposal>, Vec<String>), LocoError> {
        let entries: Vec<(RangeKey, Vec<f64>)> = pooled.into_iter().collect();
        #[cfg(feature = "rayon")]
        if ctx.allows_parallel() {
            let results: Vec<Result<TuningProposal, LocoError>> = entries
                .into_par_iter()
                .map(|(key, values)| self.propose(key, values, method, confidence))
                .collect();
            return split_unreliable(results);
        }
        #[cfg(not(feature = "rayon"))]
        let _ = ctx;
        let results: Vec<Result<TuningProposal, LocoError>> = entries
            .into_iter()
            .map(|(key, values)| self.propose(key, values, method, confidence))
            .collect();
        split_unreliable(results)
    }

    fn propose(
        &self,
        key: RangeKey,
        mut values: Vec<f64>,
        method: TuningMethod,
        confidence: f64,
    ) -> Result<TuningProposal, LocoError> {
        values.sort_by(f64::total_cmp);
        let sample_size = values.len();
        let (mut min, mut max) =
            derive_bounds(&key, &values, method, confidence, self.config.iqr_multiplier)?;

        let degenerate = max - min <= WIDTH_EPSILON * min.abs().max(max.abs()).max(1.0);
        if degenerate {
            let center = min + 0.5 * (max - min);
            // A fixed half width rounds away once it drops below an ulp of `center`.
            let half_width = self
                .config
                .degenerate_half_width
                .max(center.abs() * f64::EPSILON * 4.0);
            min = center - half_width;
            max = center + half_width;
            if !min.is_finite() || !max.is_finite() {
                return Err(LocoError::numerical_issue(format!(
                    "{key}: widened range around {center} is not finite"
                )));
            }
            tracing::warn!(key = %key, center, "derived range has zero width; widened");
        }

        let low_confidence = sample_size < self.config.min_sample_size;
        if low_confidence {
            tracing::warn!(
                key = %key,
                sample_size,
                min_sample_size = self.config.min_sample_size,
                "range proposal rests on few observations"
            );
        }

        let old_range = self.table.get_key(&key).cloned();
        let relative_change = old_range.as_ref().map(|old| {
            let width = (old.max - old.min).max(WIDTH_EPSILON);
            (min - old.min).abs().max((max - old.max).abs()) / width
        });
        let significant_change =
            relative_change.is_none_or(|change| change > self.config.significant_change_threshold);

        let source = RangeSource::Derived(format!("{method} c={confidence}"));
        let new_range = match &old_range {
            Some(old) => {
                let mut range = old.replaced_bounds(min, max);
                if range.typical.is_some_and(|t| t.min < min || t.max > max) {
                    range.typical = None;
                }
                range
            }
            None => VariableRange::new(
                key.task.clone(),
                key.variable.clone(),
                key.phase_point,
                min,
                max,
            ),
        }
        .with_source(source)
        .with_sample_size(sample_size);

        Ok(TuningProposal {
            key,
            old_range,
            new_range,
            method,
            confidence,
            supporting_sample_size: sample_size,
            low_confidence,
            degenerate,
            relative_change,
            significant_change,
            impact: None,
        })
    }
}

fn split_unreliable(
    results: Vec<Result<TuningProposal, LocoError>>,
) -> Result<(Vec<TuningProposal>, Vec<String>), LocoError> {
    let mut proposals = Vec::with_capacity(results.len());
    let mut unreliable = Vec::new();
    for result in results {
        match result {
            Ok(proposal) => proposals.push(proposal),
            Err(LocoError::NumericalIssue(detail)) => {
                tracing::warn!(%detail, "range proposal skipped");
                unreliable.push(format!("skipped: {detail}"));
            }
            Err(err) => return Err(err),
        }
    }
    Ok((proposals, unreliable))
}

#[cfg(test)]
mod tests {
    use super::RangeTuner;
    use locoqc_core::{
        CancelToken, Dataset, LocoError, PhaseGrid, PhasePoint, RangeSource, RunContext, StrideId,
        StrideRecord, TunerConfig, TuningMethod, VariableRange,
    };
    use locoqc_spec::SpecificationStore;

    fn store() -> SpecificationStore {
        SpecificationStore::from_ranges(
            PhaseGrid::canonical(),
            vec![
                VariableRange::new(
                    "walking",
                    "knee_flexion_angle",
                    PhasePoint::whole_percent(0),
                    0.0,
                    1.0,
                )
                .with_units("rad"),
            ],
        )
        .expect("store should load")
    }

    fn dataset(values: &[f64]) -> Dataset {
        let strides = values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                StrideRecord::new(StrideId::new("S01", "T1", i.to_string()), "walking").with_value(
                    "knee_flexion_angle",
                    PhasePoint::whole_percent(0),
                    *value,
                )
            })
            .collect();
        Dataset::from_strides("tuning", strides)
    }

    fn tuner() -> RangeTuner {
        RangeTuner::new(&store(), TunerConfig::default()).expect("config is valid")
    }

    #[test]
    fn confidence_outside_open_unit_interval_is_invalid_input() {
        let tuner = tuner();
        for confidence in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            let err = tuner
                .tune_ranges(&[dataset(&[0.1, 0.2])], TuningMethod::Percentile, confidence)
                .expect_err("confidence must be rejected");
            assert!(matches!(err, LocoError::InvalidInput(_)), "{confidence}: {err}");
        }
    }

    #[test]
    fn small_sample_is_flagged_low_confidence_but_still_proposed() {
        let proposals = tuner()
            .tune_ranges(&[dataset(&[0.2, 0.4, 0.6])], TuningMethod::Percentile, 0.95)
            .expect("tuning succeeds");
        assert_eq!(proposals.len(), 1);
        assert!(proposals[0].low_confidence);
        assert_eq!(proposals[0].supporting_sample_size, 3);
        assert_eq!(proposals[0].new_range.units, "rad");
    }

    #[test]
    fn constant_sample_is_widened_and_flagged_degenerate() {
        let proposals = tuner()
            .tune_ranges(&[dataset(&[0.3; 20])], TuningMethod::ZScore, 0.95)
            .expect("tuning succeeds");
        let proposal = &proposals[0];
        assert!(proposal.degenerate);
        assert!((proposal.new_range.min - 0.299).abs() < 1e-12);
        assert!((proposal.new_range.max - 0.301).abs() < 1e-12);
        assert!(proposal.new_range.min < proposal.new_range.max);
    }

    #[test]
    fn large_constant_sample_still_gets_a_positive_width() {
        let proposals = tuner()
            .tune_ranges(&[dataset(&[1.0e14; 20])], TuningMethod::Percentile, 0.95)
            .expect("tuning succeeds");
        let proposal = &proposals[0];
        assert!(proposal.degenerate);
        assert!(
            proposal.new_range.min < proposal.new_range.max,
            "[{}, {}]",
            proposal.new_range.min,
            proposal.new_range.max
        );
        assert!(proposal.new_range.contains(1.0e14));
    }

    #[test]
    fn overflowing_triple_is_skipped_and_the_rest_survive() {
        let strides = (0..10)
            .map(|i| {
                let moment = if i % 2 == 0 { 1.0e308 } else { -1.0e308 };
                StrideRecord::new(StrideId::new("S01", "T1", i.to_string()), "walking")
                    .with_value(
                        "knee_flexion_angle",
                        PhasePoint::whole_percent(0),
                        0.4 + f64::from(i) * 0.01,
                    )
                    .with_value("ankle_moment", PhasePoint::whole_percent(0), moment)
            })
            .collect();
        let run = tuner()
            .tune_ranges_with_diagnostics(
                &[Dataset::from_strides("overflow", strides)],
                TuningMethod::ZScore,
                0.95,
                &RunContext::new(),
            )
            .expect("one bad triple does not abort the run");
        assert_eq!(run.proposals.len(), 1);
        assert_eq!(run.proposals[0].key.variable, "knee_flexion_angle");
        assert!(
            run.diagnostics
                .warnings
                .iter()
                .any(|warning| warning.contains("walking/ankle_moment@0%")),
            "{:?}",
            run.diagnostics.warnings
        );
    }

    #[test]
    fn relative_change_is_measured_against_current_width() {
        // Percentile bounds of 0.0..=1.2 in steps of 0.01 at c=0.5 are [0.3, 0.9].
        let values: Vec<f64> = (0..=120).map(|i| f64::from(i) / 100.0).collect();
        let proposals = tuner()
            .tune_ranges(&[dataset(&values)], TuningMethod::Percentile, 0.5)
            .expect("tuning succeeds");
        let proposal = &proposals[0];
        let change = proposal.relative_change.expect("existing range");
        assert!((change - 0.3).abs() < 1e-9, "{change}");
        assert!(proposal.significant_change);
        assert_eq!(
            proposal.new_range.source,
            RangeSource::Derived("percentile c=0.5".to_string())
        );
    }

    #[test]
    fn unspecified_triple_becomes_a_new_significant_entry() {
        let stride = StrideRecord::new(StrideId::new("S09", "T1", "0"), "stair_ascent").with_value(
            "hip_flexion_angle",
            PhasePoint::whole_percent(50),
            0.4,
        );
        let proposals = tuner()
            .tune_ranges(
                &[Dataset::from_strides("stairs", vec![stride])],
                TuningMethod::Percentile,
                0.95,
            )
            .expect("tuning succeeds");
        assert!(proposals[0].is_new_entry());
        assert!(proposals[0].significant_change);
        assert!(proposals[0].relative_change.is_none());
    }

    #[test]
    fn off_grid_and_non_finite_values_are_not_pooled() {
        let mut stride = StrideRecord::new(StrideId::new("S01", "T1", "0"), "walking")
            .with_value("knee_flexion_angle", PhasePoint::whole_percent(0), 0.5)
            .with_value("knee_flexion_angle", PhasePoint::whole_percent(10), 0.5);
        stride.insert("knee_flexion_angle", PhasePoint::whole_percent(25), f64::INFINITY);
        let proposals = tuner()
            .tune_ranges(
                &[Dataset::from_strides("mixed", vec![stride])],
                TuningMethod::Percentile,
                0.95,
            )
            .expect("tuning succeeds");
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].key.phase_point, PhasePoint::whole_percent(0));
    }

    #[test]
    fn cancelled_run_returns_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let ctx = RunContext::new().with_cancel(&cancel);
        let err = tuner()
            .tune_ranges_with_context(&[dataset(&[0.1])], TuningMethod::Iqr, 0.95, &ctx)
            .expect_err("cancelled");
        assert!(err.is_cancelled());
    }

    #[test]
    fn tuning_never_touches_the_store() {
        let store = store();
        let tuner = RangeTuner::new(&store, TunerConfig::default()).expect("config is valid");
        tuner
            .tune_ranges(&[dataset(&[5.0; 30])], TuningMethod::Percentile, 0.95)
            .expect("tuning succeeds");
        assert_eq!(store.revision(), 0);
        assert_eq!(
            store
                .get_range("walking", "knee_flexion_angle", PhasePoint::whole_percent(0))
                .map(|r| r.max),
            Some(1.0)
        );
    }
}
