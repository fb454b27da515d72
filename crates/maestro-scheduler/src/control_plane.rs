//! The deployment control plane: begin/undo/rollback/pause/resume plus the
//! global lock and in-progress registry, driving a persisted [`Deployment`]
//! record through the [`WorkQueue`].

use std::sync::{Arc, LazyLock};

use maestro_core::deployment::{AsgState, Deployment, DeploymentKey, Phase, Status};
use maestro_core::id::ResourceId;
use maestro_core::store::DeploymentStore;
use maestro_core::task::initial_task_sequence;
use maestro_core::{Error, Result};
use maestro_db::PgStore;
use regex::Regex;

use crate::queue::{MessageKind, WorkQueue};

static APPLICATION_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]+$").unwrap());

pub fn validate_application_name(name: &str) -> Result<()> {
    if APPLICATION_NAME.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("application name '{name}' does not match ^[a-z]+$")))
    }
}

/// Parameters accepted by [`ControlPlane::begin`].
pub struct BeginRequest {
    pub application: String,
    pub environment: String,
    pub region: String,
    pub user: String,
    pub message: String,
    pub image_id: String,
    pub hash: String,
    pub silent: bool,
}

pub struct ControlPlane {
    store: Arc<PgStore>,
    queue: Arc<WorkQueue>,
}

impl ControlPlane {
    pub fn new(store: Arc<PgStore>, queue: Arc<WorkQueue>) -> Self {
        Self { store, queue }
    }

    async fn guard_lock(&self) -> Result<()> {
        if self.store.is_locked().await? {
            return Err(Error::Conflict("Maestro is currently closed for business.".to_string()));
        }
        Ok(())
    }

    async fn claim(&self, deployment: &Deployment) -> Result<()> {
        if !self.store.claim_in_progress(&deployment.key(), deployment.id).await? {
            return Err(Error::Conflict(format!("a deployment is already in progress for {}", deployment.key())));
        }
        Ok(())
    }

    pub async fn begin(&self, request: BeginRequest) -> Result<ResourceId> {
        self.guard_lock().await?;
        validate_application_name(&request.application)?;

        let now = chrono::Utc::now();
        let deployment = Deployment {
            id: ResourceId::new(),
            application: request.application,
            environment: request.environment,
            region: request.region,
            user: request.user,
            message: request.message,
            created: now,
            start: None,
            end: None,
            phase: Phase::Preparation,
            status: Status::Running,
            new_state: AsgState { requested_image_id: Some(request.image_id), hash: Some(request.hash), ..Default::default() },
            previous_state: None,
            tasks: initial_task_sequence(),
            rollback: false,
            silent: request.silent,
            failure_cause: None,
        };

        self.store.store_deployment(&deployment).await?;
        self.claim(&deployment).await?;
        self.queue.enqueue(deployment.id, MessageKind::Prepare).await?;
        Ok(deployment.id)
    }

    /// Emit a new deployment that swaps `new_state`/`previous_state` and
    /// re-runs the task sequence against the reversed orientation. No
    /// pipeline re-run is needed: both states were already resolved.
    pub async fn undo(&self, application: &str, environment: &str, region: &str) -> Result<ResourceId> {
        self.guard_lock().await?;

        let last = self
            .store
            .last_deployment_for(application, environment, region)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no deployment for {application}/{environment}/{region}")))?;

        let key = DeploymentKey { application: application.to_string(), environment: environment.to_string(), region: region.to_string() };
        let in_progress = self.store.in_progress_deployment(&key).await?.is_some();
        if !in_progress && last.status == Status::Completed {
            return Err(Error::InvalidInput("undo requires an in-progress deployment or one that did not complete successfully".to_string()));
        }

        let mut undone = last;
        undone.id = ResourceId::new();
        undone.created = chrono::Utc::now();
        undone.start = None;
        undone.end = None;
        undone.failure_cause = None;
        undone.status = Status::Running;
        undone.phase = Phase::Deployment;
        undone.tasks = initial_task_sequence();
        undone.rollback = false;

        let reversed_previous = Some(undone.new_state);
        undone.new_state = undone.previous_state.take().unwrap_or_default();
        undone.previous_state = reversed_previous;

        self.store.store_deployment(&undone).await?;
        self.claim(&undone).await?;
        self.queue.enqueue(undone.id, MessageKind::Execute).await?;
        Ok(undone.id)
    }

    /// Emit a new deployment seeded with the penultimate completed
    /// deployment's hash and image, re-running the pipeline from scratch.
    pub async fn rollback(&self, application: &str, environment: &str, region: &str) -> Result<ResourceId> {
        self.guard_lock().await?;

        let target = self
            .store
            .penultimate_completed_deployment_for(application, environment, region)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no prior completed deployment for {application}/{environment}/{region}")))?;

        let image_id = target
            .new_state
            .image_details
            .as_ref()
            .map(|d| d.id.clone())
            .or(target.new_state.requested_image_id.clone())
            .ok_or_else(|| Error::MissingField("image-details".to_string()))?;
        let hash = target.new_state.hash.clone().ok_or_else(|| Error::MissingField("hash".to_string()))?;

        let deployment = Deployment {
            id: ResourceId::new(),
            application: application.to_string(),
            environment: environment.to_string(),
            region: region.to_string(),
            user: target.user.clone(),
            message: format!("rollback to {}", target.id),
            created: chrono::Utc::now(),
            start: None,
            end: None,
            phase: Phase::Preparation,
            status: Status::Running,
            new_state: AsgState { requested_image_id: Some(image_id), hash: Some(hash), ..Default::default() },
            previous_state: None,
            tasks: initial_task_sequence(),
            rollback: true,
            silent: false,
            failure_cause: None,
        };

        self.store.store_deployment(&deployment).await?;
        self.claim(&deployment).await?;
        self.queue.enqueue(deployment.id, MessageKind::Prepare).await?;
        Ok(deployment.id)
    }

    pub async fn register_pause(&self, key: &DeploymentKey) -> Result<bool> {
        Ok(self.store.pause(key).await?)
    }

    pub async fn unregister_pause(&self, key: &DeploymentKey) -> Result<()> {
        Ok(self.store.resume(key).await?)
    }

    pub async fn resume(&self, key: &DeploymentKey) -> Result<()> {
        self.guard_lock().await?;

        if !self.store.is_paused(key).await? {
            return Err(Error::Conflict(format!("{key} is not paused")));
        }
        self.store.resume(key).await?;

        if let Some(deployment_id) = self.store.in_progress_deployment(key).await? {
            self.queue.enqueue(deployment_id, MessageKind::Execute).await?;
        }
        Ok(())
    }

    pub async fn lock(&self) -> Result<bool> {
        Ok(self.store.try_lock().await?)
    }

    pub async fn unlock(&self) -> Result<()> {
        Ok(self.store.unlock().await?)
    }

    pub async fn is_locked(&self) -> Result<bool> {
        Ok(self.store.is_locked().await?)
    }

    pub async fn list_in_progress(&self) -> Result<Vec<DeploymentKey>> {
        Ok(self.store.list_in_progress().await?)
    }

    pub async fn list_paused(&self) -> Result<Vec<DeploymentKey>> {
        Ok(self.store.list_paused().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_lowercase_letters_only() {
        assert!(validate_application_name("search").is_ok());
        assert!(validate_application_name("").is_err());
        assert!(validate_application_name("Search").is_err());
        assert!(validate_application_name("search-api").is_err());
        assert!(validate_application_name("search2").is_err());
    }
}
