// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::tuner::RangeTuner;
use locoqc_core::{
    Dataset, DatasetImpact, ImpactSummary, LocoError, RunContext, TuningProposal, ValidatorConfig,
};
use locoqc_spec::SpecTable;
use locoqc_validate::StrideValidator;
use std::sync::Arc;

impl RangeTuner {
    /// Compares stride validity under the current snapshot with validity
    /// under the same snapshot with `proposal.new_range` substituted.
    pub fn analyze_impact(
        &self,
        proposal: &TuningProposal,
        test_datasets: &[Dataset],
    ) -> Result<ImpactSummary, LocoError> {
        self.analyze_impact_with_context(proposal, test_datasets, &RunContext::new())
    }

    pub fn analyze_impact_with_context(
        &self,
        proposal: &TuningProposal,
        test_datasets: &[Dataset],
        ctx: &RunContext<'_>,
    ) -> Result<ImpactSummary, LocoError> {
        let baseline = self.baseline_validity(test_datasets, ctx)?;
        self.impact_against(proposal, test_datasets, &baseline, ctx)
    }

    /// Fills `impact` on every proposal; the baseline is computed once.
    pub fn attach_impact(
        &self,
        proposals: &mut [TuningProposal],
        test_datasets: &[Dataset],
        ctx: &RunContext<'_>,
    ) -> Result<(), LocoError> {
        let baseline = self.baseline_validity(test_datasets, ctx)?;
        let total = proposals.len().max(1) as f32;
        for (done, proposal) in proposals.iter_mut().enumerate() {
            proposal.impact = Some(self.impact_against(proposal, test_datasets, &baseline, ctx)?);
            ctx.report_progress((done + 1) as f32 / total);
        }
        Ok(())
    }

    fn baseline_validity(
        &self,
        test_datasets: &[Dataset],
        ctx: &RunContext<'_>,
    ) -> Result<Vec<Vec<bool>>, LocoError> {
        test_datasets
            .iter()
            .map(|dataset| stride_validity(self.table(), self.validator_config(), dataset, ctx))
            .collect()
    }

    fn impact_against(
        &self,
        proposal: &TuningProposal,
        test_datasets: &[Dataset],
        baseline: &[Vec<bool>],
        ctx: &RunContext<'_>,
    ) -> Result<ImpactSummary, LocoError> {
        let substituted = Arc::new(self.table().with_replaced(proposal.new_range.clone())?);
        let mut per_dataset = Vec::with_capacity(test_datasets.len());
        for (dataset, before) in test_datasets.iter().zip(baseline) {
            ctx.check_cancelled()?;
            let after = stride_validity(&substituted, self.validator_config(), dataset, ctx)?;
            per_dataset.push(compare(&dataset.name, before, &after));
        }
        let summary = ImpactSummary::from_datasets(per_dataset);
        if summary.datasets_degraded > 0 {
            tracing::warn!(
                key = %proposal.key,
                degraded = summary.datasets_degraded,
                improved = summary.datasets_improved,
                "proposal degrades validation on some datasets"
            );
        } else {
            tracing::debug!(
                key = %proposal.key,
                improved = summary.datasets_improved,
                "proposal impact analyzed"
            );
        }
        Ok(summary)
    }
}

fn stride_validity(
    table: &Arc<SpecTable>,
    config: &ValidatorConfig,
    dataset: &Dataset,
    ctx: &RunContext<'_>,
) -> Result<Vec<bool>, LocoError> {
    let validator = StrideValidator::with_table(Arc::clone(table), config.clone())?;
    let validation = validator.validate_dataset(dataset, ctx)?;
    Ok(validation
        .result
        .outcomes
        .iter()
        .map(|outcome| outcome.valid)
        .collect())
}

fn compare(dataset: &str, before: &[bool], after: &[bool]) -> DatasetImpact {
    let mut impact = DatasetImpact {
        dataset: dataset.to_string(),
        baseline_valid: before.iter().filter(|valid| **valid).count(),
        proposed_valid: after.iter().filter(|valid| **valid).count(),
        newly_invalid: 0,
        newly_valid: 0,
    };
    for (was, is) in before.iter().zip(after) {
        match (was, is) {
            (true, false) => impact.newly_invalid += 1,
            (false, true) => impact.newly_valid += 1,
            _ => {}
        }
    }
    impact
}
