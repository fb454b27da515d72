//! Store adapter ports (C1): the narrow interface the rest of the core
//! consumes over the external document store. Concrete implementations
//! (e.g. `maestro-db::PgDeploymentStore`) own the durability guarantees:
//! atomic log append, monotone task status, and per-deployment write
//! serialization.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::application::Application;
use crate::deployment::{Deployment, DeploymentKey};
use crate::id::ResourceId;
use crate::task::Task;
use crate::Result;

#[async_trait]
pub trait DeploymentStore: Send + Sync {
    async fn store_deployment(&self, deployment: &Deployment) -> Result<()>;
    async fn get_deployment(&self, id: ResourceId) -> Result<Deployment>;

    /// Merge `partial` into `new_state.deployment_params` for `id`.
    async fn add_to_deployment_parameters(&self, id: ResourceId, partial: Value) -> Result<()>;

    /// Append a timestamped line to the deployment-level log stream
    /// (distinct from any one task's log).
    async fn append_log(&self, id: ResourceId, message: &str) -> Result<()>;

    async fn get_logs(&self, id: ResourceId, since: Option<DateTime<Utc>>) -> Result<Vec<crate::task::LogEntry>>;

    /// The most recently created deployment for this
    /// application/environment/region, regardless of status, used by `undo`
    /// to locate the run it reverses.
    async fn last_deployment_for(
        &self,
        application: &str,
        environment: &str,
        region: &str,
    ) -> Result<Option<Deployment>>;

    /// The last *completed* deployment before the most recent one, for
    /// `rollback`.
    async fn penultimate_completed_deployment_for(
        &self,
        application: &str,
        environment: &str,
        region: &str,
    ) -> Result<Option<Deployment>>;

    /// The most recent *completed* deployment (other than `excluding`) whose
    /// captured `new_state.auto_scaling_group_name` matches `asg_name`, used
    /// by `populate-previous-state` to recover a predecessor's captured
    /// configuration once the cloud façade has confirmed which ASG, if any,
    /// is actually live.
    async fn deployment_for_asg_name(
        &self,
        application: &str,
        environment: &str,
        region: &str,
        asg_name: &str,
        excluding: ResourceId,
    ) -> Result<Option<Deployment>>;

    async fn query_deployments(&self, query: DeploymentQuery) -> Result<Vec<Deployment>>;
}

#[derive(Debug, Clone, Default)]
pub struct DeploymentQuery {
    pub application: Option<String>,
    pub environment: Option<String>,
    pub region: Option<String>,
    pub status: Option<crate::deployment::Status>,
    pub from: Option<DateTime<Utc>>,
    pub size: Option<u32>,
    pub start_from: Option<u32>,
    pub start_to: Option<u32>,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Upsert a task, preserving append-only log and monotone status.
    /// Implementations reject a regressing status.
    async fn store_task(&self, deployment_id: ResourceId, task: &Task) -> Result<()>;
    async fn get_tasks(&self, deployment_id: ResourceId) -> Result<Vec<Task>>;
}

/// The pause flag the control plane (C6) exposes to the executor. The
/// executor consults this between tasks, never mid-task.
#[async_trait]
pub trait PauseRegistry: Send + Sync {
    async fn is_paused(&self, key: &DeploymentKey) -> Result<bool>;
}

/// Tracks which deployment keys currently have a run in flight, so the
/// control plane can reject a concurrent `deploy`/`undo`/`rollback` against
/// the same application/environment/region.
#[async_trait]
pub trait InProgressRegistry: Send + Sync {
    async fn release(&self, key: &DeploymentKey) -> Result<()>;
}

/// The application registry backing `/applications`. Deliberately
/// narrow: name, known environments, and a contact, not the full metadata
/// the out-of-scope metadata service owns.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn upsert(&self, application: &Application) -> Result<()>;
    async fn get(&self, name: &str) -> Result<Option<Application>>;
    async fn list(&self) -> Result<Vec<Application>>;

    /// Distinct environment names across every registered application,
    /// sorted.
    async fn list_environments(&self) -> Result<Vec<String>>;
}
