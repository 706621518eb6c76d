// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::tuner::RangeTuner;
use locoqc_core::{LocoError, RangeKey, TunerConfig, TuningProposal, VariableRange};
use locoqc_spec::{SpecificationStore, UpdateReceipt};
use std::fmt;
use std::sync::Arc;

/// Which proposals [`ValidationSpecManager::apply_proposals`] lets through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyPolicy {
    pub skip_low_confidence: bool,
    pub skip_degenerate: bool,
    pub only_significant: bool,
    /// Skip proposals whose attached impact degrades any dataset.
    pub skip_degrading: bool,
}

impl Default for ApplyPolicy {
    fn default() -> Self {
        Self {
            skip_low_confidence: true,
            skip_degenerate: false,
            only_significant: true,
            skip_degrading: true,
        }
    }
}

impl ApplyPolicy {
    /// Applies every proposal handed in.
    pub fn accept_all() -> Self {
        Self {
            skip_low_confidence: false,
            skip_degenerate: false,
            only_significant: false,
            skip_degrading: false,
        }
    }

    fn skip_reason(&self, proposal: &TuningProposal) -> Option<SkipReason> {
        if self.skip_low_confidence && proposal.low_confidence {
            return Some(SkipReason::LowConfidence);
        }
        if self.skip_degenerate && proposal.degenerate {
            return Some(SkipReason::Degenerate);
        }
        if self.only_significant && !proposal.significant_change {
            return Some(SkipReason::NotSignificant);
        }
        if self.skip_degrading {
            if let Some(degraded) = proposal.datasets_degraded().filter(|count| *count > 0) {
                return Some(SkipReason::Degrades { datasets: degraded });
            }
        }
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    LowConfidence,
    Degenerate,
    NotSignificant,
    Degrades { datasets: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowConfidence => f.write_str("too few supporting observations"),
            Self::Degenerate => f.write_str("derived range collapsed to a point"),
            Self::NotSignificant => f.write_str("change below significance threshold"),
            Self::Degrades { datasets } => write!(f, "degrades validation on {datasets} datasets"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkippedProposal {
    pub proposal: TuningProposal,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApplyOutcome {
    /// Receipt of the single atomic update; its `applied` list is empty when
    /// every proposal was skipped.
    pub receipt: UpdateReceipt,
    pub skipped: Vec<SkippedProposal>,
}

impl ApplyOutcome {
    pub fn applied_keys(&self) -> impl Iterator<Item = &RangeKey> {
        self.receipt.applied.iter().map(|range| &range.key)
    }
}

/// Owns the write path from tuning proposals to a shared store.
#[derive(Clone, Debug)]
pub struct ValidationSpecManager {
    store: Arc<SpecificationStore>,
}

impl ValidationSpecManager {
    pub fn new(store: Arc<SpecificationStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<SpecificationStore> {
        &self.store
    }

    /// Tuner bound to the store's current snapshot.
    pub fn tuner(&self, config: TunerConfig) -> Result<RangeTuner, LocoError> {
        RangeTuner::new(&self.store, config)
    }

    /// Filters `proposals` through `policy` and applies the survivors in one
    /// atomic update. A conflict leaves the store untouched.
    pub fn apply_proposals(
        &self,
        proposals: Vec<TuningProposal>,
        policy: &ApplyPolicy,
    ) -> Result<ApplyOutcome, LocoError> {
        let mut accepted: Vec<VariableRange> = Vec::new();
        let mut skipped = Vec::new();
        for proposal in proposals {
            match policy.skip_reason(&proposal) {
                Some(reason) => {
                    tracing::debug!(key = %proposal.key, %reason, "proposal skipped");
                    skipped.push(SkippedProposal { proposal, reason });
                }
                None => accepted.push(proposal.new_range),
            }
        }

        let receipt = self.store.apply_update_with_receipt(accepted)?;
        tracing::info!(
            revision = receipt.revision,
            applied = receipt.applied.len(),
            skipped = skipped.len(),
            "tuning proposals applied"
        );
        Ok(ApplyOutcome { receipt, skipped })
    }

    /// Reverts the update recorded by `receipt`; it must be the latest one.
    pub fn rollback(&self, receipt: &UpdateReceipt) -> Result<UpdateReceipt, LocoError> {
        self.store.revert(receipt)
    }
}
