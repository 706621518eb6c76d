// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::LocoError;
use crate::control::{CancelToken, ExecutionMode};

/// Receives coarse progress updates from batch operations.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, fraction: f32);
}

/// Run options passed through batch validation and tuning calls.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub cancel: Option<&'a CancelToken>,
    pub execution: ExecutionMode,
    pub progress: Option<&'a dyn ProgressSink>,
}

impl Default for RunContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> RunContext<'a> {
    /// Parallel execution, no cancellation, no progress reporting.
    pub fn new() -> Self {
        Self {
            cancel: None,
            execution: ExecutionMode::Parallel,
            progress: None,
        }
    }

    /// Forces single-threaded processing.
    pub fn sequential() -> Self {
        Self::new().with_execution(ExecutionMode::Sequential)
    }

    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_progress_sink(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }

    pub fn check_cancelled(&self) -> Result<(), LocoError> {
        if self.is_cancelled() {
            return Err(LocoError::cancelled());
        }
        Ok(())
    }

    pub fn allows_parallel(&self) -> bool {
        self.execution == ExecutionMode::Parallel
    }

    /// Emits clamped progress to the sink, if configured.
    pub fn report_progress(&self, fraction: f32) {
        if !fraction.is_finite() {
            return;
        }
        if let Some(sink) = self.progress {
            sink.on_progress(fraction.clamp(0.0, 1.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ProgressSink, RunContext};
    use crate::control::{CancelToken, ExecutionMode};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockProgressSink {
        values: Mutex<Vec<f32>>,
    }

    impl ProgressSink for MockProgressSink {
        fn on_progress(&self, fraction: f32) {
            self.values
                .lock()
                .expect("progress mutex should lock")
                .push(fraction);
        }
    }

    #[test]
    fn new_sets_parallel_without_hooks() {
        let ctx = RunContext::new();
        assert!(ctx.cancel.is_none());
        assert!(ctx.progress.is_none());
        assert!(ctx.allows_parallel());
        assert!(!RunContext::sequential().allows_parallel());
        assert_eq!(
            RunContext::sequential().execution,
            ExecutionMode::Sequential
        );
    }

    #[test]
    fn check_cancelled_returns_cancelled_error_when_requested() {
        let cancel = CancelToken::new();
        let ctx = RunContext::new().with_cancel(&cancel);
        assert!(ctx.check_cancelled().is_ok());
        cancel.cancel();
        let err = ctx
            .check_cancelled()
            .expect_err("cancelled token should return an error");
        assert_eq!(err.to_string(), "cancelled");
    }

    #[test]
    fn report_progress_clamps_and_ignores_non_finite_values() {
        let progress = MockProgressSink::default();
        let ctx = RunContext::new().with_progress_sink(&progress);

        ctx.report_progress(-0.2);
        ctx.report_progress(0.25);
        ctx.report_progress(1.2);
        ctx.report_progress(f32::NAN);

        let got = progress
            .values
            .lock()
            .expect("progress values should lock")
            .clone();
        assert_eq!(got, vec![0.0, 0.25, 1.0]);
    }
}
