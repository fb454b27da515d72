//! Worker that claims messages from the [`WorkQueue`] and drives each one to
//! a persisted state transition: sleep, claim, dispatch between the two
//! message kinds, loop.

use std::sync::Arc;
use std::time::Duration;

use maestro_core::collaborators::{Clock, CloudFacade, ConfigurationService, MetadataService, PolicyConfigurationService};
use maestro_core::store::DeploymentStore;
use maestro_db::PgStore;
use maestro_executor::TaskExecutor;
use maestro_pipeline::{DeploymentContext, PipelineResult, PipelineRunner};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::queue::{MessageKind, WorkQueue};

/// The external collaborators a `Prepare` message needs to build a
/// [`DeploymentContext`]. Grouped so `Worker::new` doesn't grow an
/// ever-longer positional argument list as more are added.
pub struct Collaborators {
    pub cloud: Arc<dyn CloudFacade>,
    pub metadata: Arc<dyn MetadataService>,
    pub configuration: Arc<dyn ConfigurationService>,
    pub policy: Arc<dyn PolicyConfigurationService>,
    pub clock: Arc<dyn Clock>,
}

pub struct Worker {
    id: String,
    queue: Arc<WorkQueue>,
    store: Arc<PgStore>,
    pipeline: Arc<PipelineRunner>,
    executor: Arc<TaskExecutor>,
    collaborators: Collaborators,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        queue: Arc<WorkQueue>,
        store: Arc<PgStore>,
        pipeline: Arc<PipelineRunner>,
        executor: Arc<TaskExecutor>,
        collaborators: Collaborators,
    ) -> Self {
        Self { id: id.into(), queue, store, pipeline, executor, collaborators }
    }

    /// Run the worker loop. Never returns; intended to be spawned as its own
    /// task, one per desired level of concurrency.
    pub async fn run(&self) {
        info!(worker_id = %self.id, "starting worker");

        loop {
            match self.queue.claim(&self.id).await {
                Ok(Some(message)) => {
                    info!(worker_id = %self.id, message_id = %message.id, deployment = %message.deployment_id, "claimed message");
                    match self.process(message.deployment_id, message.kind).await {
                        Ok(()) => {
                            if let Err(e) = self.queue.complete(message.id).await {
                                warn!(message_id = %message.id, error = %e, "failed to mark message complete");
                            }
                        }
                        Err(e) => {
                            warn!(message_id = %message.id, error = %e, "message processing failed");
                            if let Err(e) = self.queue.fail(message.id, &e.to_string()).await {
                                warn!(message_id = %message.id, error = %e, "failed to mark message failed");
                            }
                        }
                    }
                }
                Ok(None) => sleep(Duration::from_secs(1)).await,
                Err(e) => {
                    warn!(error = %e, "failed to claim message");
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    async fn process(&self, deployment_id: maestro_core::id::ResourceId, kind: MessageKind) -> maestro_core::Result<()> {
        match kind {
            MessageKind::Prepare => {
                let deployment = self.store.get_deployment(deployment_id).await?;
                let mut ctx = DeploymentContext {
                    deployment,
                    cloud: self.collaborators.cloud.clone(),
                    metadata: self.collaborators.metadata.clone(),
                    configuration: self.collaborators.configuration.clone(),
                    policy: self.collaborators.policy.clone(),
                    store: self.store.clone(),
                    clock: self.collaborators.clock.clone(),
                };
                match self.pipeline.run(&mut ctx).await {
                    PipelineResult::Completed => {
                        self.queue.enqueue(ctx.deployment.id, MessageKind::Execute).await?;
                        Ok(())
                    }
                    PipelineResult::Failed { cause, .. } => Err(cause),
                }
            }
            MessageKind::Execute => {
                let mut deployment = self.store.get_deployment(deployment_id).await?;
                self.executor.run(&mut deployment).await
            }
        }
    }
}
