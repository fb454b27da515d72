//! The three-way result a pipeline step returns.

use maestro_core::Error;

/// What a [`crate::steps::PipelineStep`] decided after inspecting the
/// in-flight deployment record.
#[derive(Debug)]
pub enum StepOutcome {
    /// Continue with the next step; any mutation already landed on the
    /// context's deployment record.
    Success,
    /// Terminate the deployment with `phase = failed`, persisting `cause`.
    Error(Error),
    /// Requeue the same step after a backoff. Only `check-configuration`
    /// is allowed to return this.
    Retry(String),
}

impl StepOutcome {
    pub fn error(err: impl Into<Error>) -> Self {
        StepOutcome::Error(err.into())
    }
}
