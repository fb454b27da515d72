//! Drives the fixed step list against a [`DeploymentContext`], persisting
//! between steps and handling the `retry` backoff.
//!
//! A linear sequence — the steps here are strictly ordered, no dependency
//! graph — returning a three-way [`StepOutcome`] rather than a boolean
//! stage result.

use std::time::Duration;

use maestro_core::collaborators::Clock;
use maestro_core::deployment::Phase;
use maestro_core::Error;
use tracing::{error, info, warn};

use crate::context::DeploymentContext;
use crate::outcome::StepOutcome;
use crate::steps::{full_pipeline, PipelineStep};

/// A step that keeps returning `retry` this many times in a row is treated
/// as a hard failure, so the deployment still reaches a terminal phase in
/// bounded time.
const MAX_RETRIES_PER_STEP: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Outcome of running the whole pipeline to completion.
#[derive(Debug)]
pub enum PipelineResult {
    Completed,
    Failed { step: &'static str, cause: Error },
}

pub struct PipelineRunner {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Default for PipelineRunner {
    fn default() -> Self {
        Self { steps: full_pipeline() }
    }
}

impl PipelineRunner {
    pub fn new(steps: Vec<Box<dyn PipelineStep>>) -> Self {
        Self { steps }
    }

    pub async fn run(&self, ctx: &mut DeploymentContext) -> PipelineResult {
        for step in &self.steps {
            let mut attempts = 0;
            loop {
                info!(step = step.name(), deployment = %ctx.deployment.id, "running pipeline step");
                match step.run(ctx).await {
                    StepOutcome::Success => break,
                    StepOutcome::Retry(reason) => {
                        attempts += 1;
                        if attempts >= MAX_RETRIES_PER_STEP {
                            let cause = Error::ConfigurationUnexpectedResponse(reason);
                            self.fail(ctx, step.name(), &cause).await;
                            return PipelineResult::Failed { step: step.name(), cause };
                        }
                        warn!(step = step.name(), reason, attempts, "pipeline step asked to retry");
                        tokio::time::sleep(RETRY_BACKOFF).await;
                        continue;
                    }
                    StepOutcome::Error(cause) => {
                        error!(step = step.name(), error = %cause, "pipeline step failed");
                        self.fail(ctx, step.name(), &cause).await;
                        return PipelineResult::Failed { step: step.name(), cause };
                    }
                }
            }

            if let Err(e) = ctx.store.store_deployment(&ctx.deployment).await {
                error!(step = step.name(), error = %e, "failed to persist deployment between pipeline steps");
                return PipelineResult::Failed { step: step.name(), cause: e };
            }
        }

        PipelineResult::Completed
    }

    async fn fail(&self, ctx: &mut DeploymentContext, step: &'static str, cause: &Error) {
        ctx.deployment.phase = Phase::Failed;
        ctx.deployment.end = Some(ctx.clock.now());
        ctx.deployment.failure_cause = Some(cause.to_string());
        if let Err(e) = ctx.store.store_deployment(&ctx.deployment).await {
            error!(step, error = %e, "failed to persist failed deployment");
        }
        let _ = ctx.store.append_log(ctx.deployment.id, &format!("{step} failed: {cause}")).await;
    }
}
