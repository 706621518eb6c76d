// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

mod impact;
pub mod manager;
pub mod stats;
pub mod tuner;

pub use manager::{ApplyOutcome, ApplyPolicy, SkipReason, SkippedProposal, ValidationSpecManager};
pub use tuner::{RangeTuner, TuningRun};

/// Range tuning crate name helper.
pub fn crate_name() -> &'static str {
    let _ = locoqc_validate::crate_name();
    "locoqc-tune"
}

#[cfg(test)]
mod tests {
    use super::crate_name;

    #[test]
    fn crate_name_matches_expected() {
        assert_eq!(crate_name(), "locoqc-tune");
    }
}
