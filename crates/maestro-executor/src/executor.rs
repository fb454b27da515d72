//! Task executor (C4): drives a deployment's fixed six-task sequence to
//! completion, the transition rule, and the control plane's pause gate.
//!
//! Owns the collaborator handles and walks a fixed list, persisting after
//! every step and stopping at the first fatal error.

use std::collections::BTreeMap;
use std::sync::Arc;

use maestro_core::collaborators::{Clock, CloudFacade, InstanceHealthCheck, ProviderRedirect};
use maestro_core::deployment::{Deployment, Phase, Status};
use maestro_core::store::{DeploymentStore, InProgressRegistry, PauseRegistry, TaskStore};
use maestro_core::task::Action;
use maestro_core::{Error, Result};
use serde_json::Value;
use tracing::{error, info};

use crate::naming_strategy::{name_from_location, name_from_task_log};
use crate::tracker::{RemoteTaskTracker, TrackerOutcome};
use crate::waiter::{ElbHealthWaiter, InstanceHealthWaiter};

pub struct TaskExecutor {
    cloud: Arc<dyn CloudFacade>,
    tasks: Arc<dyn TaskStore>,
    deployments: Arc<dyn DeploymentStore>,
    pause: Arc<dyn PauseRegistry>,
    in_progress: Arc<dyn InProgressRegistry>,
    clock: Arc<dyn Clock>,
    tracker: RemoteTaskTracker,
    instance_health: InstanceHealthWaiter,
    elb_health: ElbHealthWaiter,
    tracker_max_duration_ticks: u64,
}

impl TaskExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cloud: Arc<dyn CloudFacade>,
        tasks: Arc<dyn TaskStore>,
        deployments: Arc<dyn DeploymentStore>,
        pause: Arc<dyn PauseRegistry>,
        in_progress: Arc<dyn InProgressRegistry>,
        clock: Arc<dyn Clock>,
        instance_health_check: Arc<dyn InstanceHealthCheck>,
        system: &maestro_config::system::SystemConfig,
    ) -> Self {
        Self {
            tracker: RemoteTaskTracker::new(cloud.clone(), tasks.clone(), system.tracker_poll_interval),
            instance_health: InstanceHealthWaiter::new(instance_health_check, system.health_waiter_poll_interval),
            elb_health: ElbHealthWaiter::new(cloud.clone(), system.health_waiter_poll_interval),
            cloud,
            tasks,
            deployments,
            pause,
            in_progress,
            clock,
            tracker_max_duration_ticks: system.tracker_max_duration_ticks(),
        }
    }

    /// Drive `deployment` from its first non-terminal task to either
    /// deployment completion, a paused stop, or a fatal failure.
    pub async fn run(&self, deployment: &mut Deployment) -> Result<()> {
        while let Some(index) = deployment.tasks.iter().position(|t| !t.status.is_terminal()) {
            if self.pause.is_paused(&deployment.key()).await? {
                info!(deployment = %deployment.id, "pause flag set, suspending before next task");
                deployment.status = Status::Paused;
                self.deployments.store_deployment(deployment).await?;
                return Ok(());
            }

            if deployment.tasks[index].status == maestro_core::task::TaskStatus::Pending {
                deployment.tasks[index].start(self.clock.now());
                self.tasks.store_task(deployment.id, &deployment.tasks[index]).await?;
            }

            let action = deployment.tasks[index].action;
            info!(deployment = %deployment.id, task = ?action, "starting task");

            match self.run_task(deployment, index).await {
                Ok(()) => {
                    let now = self.clock.now();
                    deployment.tasks[index].complete(now);
                    self.tasks.store_task(deployment.id, &deployment.tasks[index]).await?;
                }
                Err(cause) => {
                    error!(deployment = %deployment.id, task = ?action, error = %cause, "task failed");
                    let now = self.clock.now();
                    deployment.tasks[index].fail(now, cause.to_string());
                    self.tasks.store_task(deployment.id, &deployment.tasks[index]).await?;
                    self.fail_deployment(deployment, &cause).await?;
                    return Err(cause);
                }
            }
        }

        let now = self.clock.now();
        deployment.phase = Phase::Completed;
        deployment.status = Status::Completed;
        deployment.end = Some(now);
        self.deployments.store_deployment(deployment).await?;
        self.in_progress.release(&deployment.key()).await?;
        Ok(())
    }

    async fn fail_deployment(&self, deployment: &mut Deployment, cause: &Error) -> Result<()> {
        let now = self.clock.now();
        deployment.phase = Phase::Failed;
        deployment.status = Status::Failed;
        deployment.end = Some(now);
        deployment.failure_cause = Some(cause.to_string());
        self.deployments.store_deployment(deployment).await?;
        self.in_progress.release(&deployment.key()).await?;
        Ok(())
    }

    async fn run_task(&self, deployment: &mut Deployment, index: usize) -> Result<()> {
        match deployment.tasks[index].action {
            Action::CreateAsg => self.run_create_asg(deployment, index).await,
            Action::WaitForInstanceHealth => self.run_wait_for_instance_health(deployment).await,
            Action::EnableAsg => self.run_enable_asg(deployment, index).await,
            Action::WaitForElbHealth => self.run_wait_for_elb_health(deployment).await,
            Action::DisableAsg => self.run_disable_asg(deployment, index).await,
            Action::DeleteAsg => self.run_delete_asg(deployment, index).await,
        }
    }

    async fn run_create_asg(&self, deployment: &mut Deployment, index: usize) -> Result<()> {
        let params = build_asg_params(deployment);
        let redirect = self.cloud.create_asg(&deployment.region, params).await?;
        let name = self.settle_name(deployment, index, redirect).await?;
        deployment.new_state.auto_scaling_group_name = Some(name);
        Ok(())
    }

    async fn run_enable_asg(&self, deployment: &mut Deployment, index: usize) -> Result<()> {
        let asg_name = deployment
            .new_state
            .auto_scaling_group_name
            .clone()
            .ok_or_else(|| Error::Internal("enable-asg run before the new ASG name was known".to_string()))?;
        let redirect = self.cloud.enable_asg(&deployment.region, &asg_name).await?;
        self.settle(deployment, index, redirect).await
    }

    async fn run_disable_asg(&self, deployment: &mut Deployment, index: usize) -> Result<()> {
        let Some(asg_name) = previous_asg_name(deployment).map(str::to_string) else {
            return Ok(());
        };
        let redirect = self.cloud.disable_asg(&deployment.region, &asg_name).await?;
        self.settle(deployment, index, redirect).await
    }

    async fn run_delete_asg(&self, deployment: &mut Deployment, index: usize) -> Result<()> {
        let Some(asg_name) = previous_asg_name(deployment).map(str::to_string) else {
            return Ok(());
        };
        let redirect = self.cloud.delete_asg(&deployment.region, &asg_name).await?;
        self.settle(deployment, index, redirect).await
    }

    async fn run_wait_for_instance_health(&self, deployment: &mut Deployment) -> Result<()> {
        let asg_name = deployment
            .new_state
            .auto_scaling_group_name
            .clone()
            .ok_or_else(|| Error::Internal("wait-for-instance-health run before the new ASG name was known".to_string()))?;
        let instances = self.cloud.list_instances(&deployment.region, &asg_name).await?;
        let port = service_port(deployment);
        let path = healthcheck_path(deployment);
        let attempts = param_u32(deployment, "instance-healthy-attempts", 50);

        if self.instance_health.wait(&instances, port, &path, attempts).await? {
            Ok(())
        } else {
            Err(Error::Internal(format!("instances in '{asg_name}' did not become healthy within {attempts} attempts")))
        }
    }

    async fn run_wait_for_elb_health(&self, deployment: &mut Deployment) -> Result<()> {
        let load_balancers = deployment.new_state.selected_load_balancers.clone();
        let health_check_type = param_str(deployment, "health-check-type").unwrap_or("EC2").to_string();
        if load_balancers.is_empty() || health_check_type != "ELB" {
            return Ok(());
        }

        let asg_name = deployment
            .new_state
            .auto_scaling_group_name
            .clone()
            .ok_or_else(|| Error::Internal("wait-for-elb-health run before the new ASG name was known".to_string()))?;
        let instances = self.cloud.list_instances(&deployment.region, &asg_name).await?;
        let attempts = param_u32(deployment, "load-balancer-healthy-attempts", 50);

        if self.elb_health.wait(&deployment.region, &load_balancers, &asg_name, &instances, attempts).await? {
            Ok(())
        } else {
            Err(Error::Internal(format!("load balancers did not report '{asg_name}' healthy within {attempts} attempts")))
        }
    }

    /// Resolve a state-changing call's redirect to completion, without
    /// needing the ASG name it may have produced (enable/disable/delete).
    async fn settle(&self, deployment: &mut Deployment, index: usize, redirect: ProviderRedirect) -> Result<()> {
        match redirect.remote_task {
            None => Ok(()),
            Some(remote) => {
                deployment.tasks[index].remote = Some(remote);
                self.tasks.store_task(deployment.id, &deployment.tasks[index]).await?;
                let outcome = self.tracker.track(deployment.id, &mut deployment.tasks[index], self.tracker_max_duration_ticks).await?;
                outcome_to_result(outcome)
            }
        }
    }

    /// As `settle`, but also recovers the new ASG's name, trying the
    /// redirect's own location first and falling back to scanning the
    /// tracked task's log once it has advanced far enough to log the
    /// creation line.
    async fn settle_name(&self, deployment: &mut Deployment, index: usize, redirect: ProviderRedirect) -> Result<String> {
        match redirect.remote_task {
            None => name_from_location(&redirect.location)
                .ok_or_else(|| Error::Internal(format!("could not extract ASG name from redirect '{}'", redirect.location))),
            Some(remote) => {
                deployment.tasks[index].remote = Some(remote);
                self.tasks.store_task(deployment.id, &deployment.tasks[index]).await?;
                let outcome = self.tracker.track(deployment.id, &mut deployment.tasks[index], self.tracker_max_duration_ticks).await?;
                outcome_to_result(outcome)?;
                name_from_task_log(&deployment.tasks[index])
                    .or_else(|| name_from_location(&redirect.location))
                    .ok_or_else(|| Error::Internal("could not extract ASG name from tracked task's log".to_string()))
            }
        }
    }
}

fn outcome_to_result(outcome: TrackerOutcome) -> Result<()> {
    match outcome {
        TrackerOutcome::Completed => Ok(()),
        TrackerOutcome::Failed => Err(Error::Internal("remote task ended in 'failed'".to_string())),
        TrackerOutcome::Terminated => Err(Error::Internal("remote task ended in 'terminated'".to_string())),
        TrackerOutcome::TimedOut => Err(Error::Internal("remote task timed out".to_string())),
    }
}

fn previous_asg_name(deployment: &Deployment) -> Option<&str> {
    deployment.previous_state.as_ref().and_then(|s| s.auto_scaling_group_name.as_deref())
}

fn param_u32(deployment: &Deployment, key: &str, default: u32) -> u32 {
    deployment.new_state.deployment_params.get(key).and_then(Value::as_u64).map(|v| v as u32).unwrap_or(default)
}

fn param_str<'a>(deployment: &'a Deployment, key: &str) -> Option<&'a str> {
    deployment.new_state.deployment_params.get(key).and_then(Value::as_str)
}

fn service_port(deployment: &Deployment) -> u16 {
    deployment
        .new_state
        .tyranitar
        .application_properties
        .get("service")
        .and_then(|service| service.get("port"))
        .and_then(Value::as_u64)
        .map(|port| port as u16)
        .unwrap_or(maestro_config::system::DEFAULT_SERVICE_PORT)
}

fn healthcheck_path(deployment: &Deployment) -> String {
    deployment
        .new_state
        .tyranitar
        .application_properties
        .get("service")
        .and_then(|service| service.get("healthcheck"))
        .and_then(|healthcheck| healthcheck.get("path"))
        .and_then(Value::as_str)
        .unwrap_or(maestro_config::system::DEFAULT_HEALTHCHECK_PATH)
        .to_string()
}

/// Assemble the create/successor-ASG form parameters from the resolved
/// deployment record. The wire shape is whatever the concrete `CloudFacade`
/// adapter expects; this just flattens `new_state` into the
/// `BTreeMap<String, Vec<String>>` the port signature takes.
fn build_asg_params(deployment: &Deployment) -> BTreeMap<String, Vec<String>> {
    let state = &deployment.new_state;
    let mut params = BTreeMap::new();

    let single = |v: String| vec![v];
    if let Some(name) = &state.auto_scaling_group_name {
        params.insert("auto-scaling-group-name".to_string(), single(name.clone()));
    }
    if let Some(name) = &state.launch_configuration_name {
        params.insert("launch-configuration-name".to_string(), single(name.clone()));
    }
    if let Some(image) = &state.image_details {
        params.insert("image-id".to_string(), single(image.id.clone()));
    }
    params.insert("instance-type".to_string(), single(param_str(deployment, "instance-type").unwrap_or("t1.micro").to_string()));
    params.insert("min".to_string(), single(param_u32(deployment, "min", 1).to_string()));
    params.insert("max".to_string(), single(param_u32(deployment, "max", 1).to_string()));
    params.insert("desired-capacity".to_string(), single(param_u32(deployment, "desired-capacity", 1).to_string()));
    params.insert("default-cooldown".to_string(), single(param_u32(deployment, "default-cooldown", 10).to_string()));
    params.insert("health-check-grace-period".to_string(), single(param_u32(deployment, "health-check-grace-period", 600).to_string()));
    params.insert("health-check-type".to_string(), single(param_str(deployment, "health-check-type").unwrap_or("EC2").to_string()));

    if !state.selected_security_group_ids.is_empty() {
        params.insert("security-group-ids".to_string(), state.selected_security_group_ids.clone());
    }
    if !state.selected_subnets.is_empty() {
        params.insert("selected-subnets".to_string(), state.selected_subnets.clone());
    }
    if let Some(vpc_zone_identifier) = &state.vpc_zone_identifier {
        params.insert("vpc-zone-identifier".to_string(), single(vpc_zone_identifier.clone()));
    }
    if !state.availability_zones.is_empty() {
        params.insert("availability-zones".to_string(), state.availability_zones.clone());
    }
    if !state.termination_policies.is_empty() {
        params.insert("termination-policies".to_string(), state.termination_policies.clone());
    }
    if !state.selected_load_balancers.is_empty() {
        params.insert("load-balancer-names".to_string(), state.selected_load_balancers.clone());
    }
    if let Some(user_data) = &state.user_data {
        params.insert("user-data".to_string(), single(user_data.clone()));
    }
    for tag in &state.auto_scaling_group_tags {
        params.entry(format!("tag[{}]", tag.key)).or_insert_with(Vec::new).push(tag.value.clone());
    }

    params
}
