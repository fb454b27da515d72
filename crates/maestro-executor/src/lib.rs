//! External-task tracker (C2), task executor (C4), and health waiters (C5).

pub mod executor;
pub mod naming_strategy;
pub mod tracker;
pub mod waiter;

pub use executor::TaskExecutor;
pub use tracker::{RemoteTaskTracker, TrackerOutcome};
pub use waiter::{ElbHealthWaiter, InstanceHealthWaiter, PollWaiter};

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use maestro_core::collaborators::{
        CloudFacade, InstanceDescriptor, InstanceHealth, InstanceHealthCheck, LoadBalancerDescriptor, ProviderRedirect,
        RemoteTaskObservation, RemoteTaskStatus, SecurityGroupDescriptor, SubnetDescriptor, SystemClock,
    };
    use maestro_core::deployment::{Deployment, DeploymentKey, ImageDetails, Onix, Phase, Status};
    use maestro_core::id::ResourceId;
    use maestro_core::store::{DeploymentQuery, DeploymentStore, InProgressRegistry, PauseRegistry, TaskStore};
    use maestro_core::task::{initial_task_sequence, RemoteTaskRef, Task};
    use maestro_core::{Error, Result};

    use super::*;

    struct MockFacade {
        instances: Vec<InstanceDescriptor>,
    }

    #[async_trait]
    impl CloudFacade for MockFacade {
        async fn list_security_groups(&self, _region: &str) -> Result<Vec<SecurityGroupDescriptor>> {
            Ok(vec![])
        }
        async fn list_subnets(&self, _region: &str, _purpose: &str) -> Result<Vec<SubnetDescriptor>> {
            Ok(vec![])
        }
        async fn list_load_balancers(&self, _region: &str, _names: &[String]) -> Result<Vec<LoadBalancerDescriptor>> {
            Ok(vec![])
        }
        async fn get_image(&self, _region: &str, _image_id: &str) -> Result<ImageDetails> {
            unimplemented!("not exercised by executor tests")
        }
        async fn find_latest_asg(&self, _application: &str, _environment: &str, _region: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn list_instances(&self, _region: &str, _asg_name: &str) -> Result<Vec<InstanceDescriptor>> {
            Ok(self.instances.clone())
        }
        async fn instance_health_from_load_balancer(
            &self,
            _region: &str,
            _load_balancer: &str,
            _asg_name: &str,
        ) -> Result<std::collections::BTreeMap<String, InstanceHealth>> {
            Ok(self.instances.iter().map(|i| (i.instance_id.clone(), InstanceHealth::Healthy)).collect())
        }
        async fn create_asg(&self, _region: &str, _params: BTreeMap<String, Vec<String>>) -> Result<ProviderRedirect> {
            Ok(ProviderRedirect { location: "https://provider.example.com/asgs/search-poke-v001".to_string(), remote_task: None })
        }
        async fn enable_asg(&self, _region: &str, _asg_name: &str) -> Result<ProviderRedirect> {
            Ok(ProviderRedirect { location: "https://provider.example.com/asgs/search-poke-v001".to_string(), remote_task: None })
        }
        async fn disable_asg(&self, _region: &str, _asg_name: &str) -> Result<ProviderRedirect> {
            Ok(ProviderRedirect { location: "https://provider.example.com/asgs/search-poke-v001".to_string(), remote_task: None })
        }
        async fn delete_asg(&self, _region: &str, _asg_name: &str) -> Result<ProviderRedirect> {
            Ok(ProviderRedirect { location: "https://provider.example.com/asgs/search-poke-v001".to_string(), remote_task: None })
        }
        async fn poll_task(&self, _remote: &RemoteTaskRef) -> Result<RemoteTaskObservation> {
            unimplemented!("not exercised when create_asg never returns a remote task")
        }
    }

    #[async_trait]
    impl InstanceHealthCheck for MockFacade {
        async fn check(&self, _ip: &str, _port: u16, _path: &str) -> Result<bool> {
            Ok(true)
        }
    }

    struct MockStore {
        deployment: Mutex<Deployment>,
    }

    #[async_trait]
    impl DeploymentStore for MockStore {
        async fn store_deployment(&self, deployment: &Deployment) -> Result<()> {
            *self.deployment.lock().unwrap() = deployment.clone();
            Ok(())
        }
        async fn get_deployment(&self, _id: ResourceId) -> Result<Deployment> {
            Ok(self.deployment.lock().unwrap().clone())
        }
        async fn add_to_deployment_parameters(&self, _id: ResourceId, _partial: serde_json::Value) -> Result<()> {
            Ok(())
        }
        async fn append_log(&self, _id: ResourceId, _message: &str) -> Result<()> {
            Ok(())
        }
        async fn get_logs(&self, _id: ResourceId, _since: Option<chrono::DateTime<chrono::Utc>>) -> Result<Vec<maestro_core::task::LogEntry>> {
            Ok(vec![])
        }
        async fn last_deployment_for(&self, _application: &str, _environment: &str, _region: &str) -> Result<Option<Deployment>> {
            Ok(None)
        }
        async fn penultimate_completed_deployment_for(&self, _application: &str, _environment: &str, _region: &str) -> Result<Option<Deployment>> {
            Ok(None)
        }
        async fn deployment_for_asg_name(
            &self,
            _application: &str,
            _environment: &str,
            _region: &str,
            _asg_name: &str,
            _excluding: ResourceId,
        ) -> Result<Option<Deployment>> {
            Ok(None)
        }
        async fn query_deployments(&self, _query: DeploymentQuery) -> Result<Vec<Deployment>> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl TaskStore for MockStore {
        async fn store_task(&self, _deployment_id: ResourceId, task: &Task) -> Result<()> {
            let mut deployment = self.deployment.lock().unwrap();
            if let Some(existing) = deployment.tasks.iter_mut().find(|t| t.id == task.id) {
                *existing = task.clone();
            }
            Ok(())
        }
        async fn get_tasks(&self, _deployment_id: ResourceId) -> Result<Vec<Task>> {
            Ok(self.deployment.lock().unwrap().tasks.clone())
        }
    }

    struct NeverPaused;

    #[async_trait]
    impl PauseRegistry for NeverPaused {
        async fn is_paused(&self, _key: &DeploymentKey) -> Result<bool> {
            Ok(false)
        }
    }

    struct NoopInProgress;

    #[async_trait]
    impl InProgressRegistry for NoopInProgress {
        async fn release(&self, _key: &DeploymentKey) -> Result<()> {
            Ok(())
        }
    }

    fn new_deployment() -> Deployment {
        let mut deployment = Deployment {
            id: ResourceId::new(),
            application: "search".to_string(),
            environment: "poke".to_string(),
            region: "eu-west-1".to_string(),
            user: "alice".to_string(),
            message: "initial".to_string(),
            created: chrono::Utc::now(),
            start: None,
            end: None,
            phase: Phase::Deployment,
            status: Status::Running,
            new_state: Default::default(),
            previous_state: None,
            tasks: initial_task_sequence(),
            rollback: false,
            silent: false,
            failure_cause: None,
        };
        deployment.new_state.deployment_params.insert("instance-healthy-attempts".to_string(), serde_json::json!(3));
        deployment.new_state.deployment_params.insert("load-balancer-healthy-attempts".to_string(), serde_json::json!(3));
        deployment.new_state.deployment_params.insert("health-check-type".to_string(), serde_json::json!("EC2"));
        deployment.new_state.onix = Some(Onix { contact: Some("alice".to_string()), owner: Some("alice".to_string()), email: None });
        deployment
    }

    fn new_executor(instances: Vec<InstanceDescriptor>) -> (TaskExecutor, Arc<MockStore>) {
        let facade = Arc::new(MockFacade { instances });
        let store = Arc::new(MockStore { deployment: Mutex::new(new_deployment()) });
        let mut system = maestro_config::SystemConfig::from_env();
        system.tracker_poll_interval = std::time::Duration::from_millis(1);
        system.health_waiter_poll_interval = std::time::Duration::from_millis(1);
        system.tracker_max_duration_secs = 5;

        let executor = TaskExecutor::new(
            facade.clone(),
            store.clone(),
            store.clone(),
            Arc::new(NeverPaused),
            Arc::new(NoopInProgress),
            Arc::new(SystemClock),
            facade,
            &system,
        );
        (executor, store)
    }

    #[tokio::test]
    async fn drives_a_fresh_deployment_with_no_predecessor_to_completion() {
        let instances = vec![InstanceDescriptor { instance_id: "i-1".to_string(), private_ip: "10.0.0.1".to_string() }];
        let (executor, store) = new_executor(instances);
        let mut deployment = store.deployment.lock().unwrap().clone();

        let result = executor.run(&mut deployment).await;

        assert!(result.is_ok(), "{result:?}");
        assert_eq!(deployment.phase, Phase::Completed);
        assert_eq!(deployment.status, Status::Completed);
        assert!(deployment.tasks.iter().all(|t| t.status == maestro_core::task::TaskStatus::Completed));
        assert_eq!(deployment.new_state.auto_scaling_group_name.as_deref(), Some("search-poke-v001"));
    }

    #[tokio::test]
    async fn disable_and_delete_are_no_ops_without_a_predecessor() {
        let (executor, store) = new_executor(vec![]);
        let mut deployment = store.deployment.lock().unwrap().clone();

        executor.run(&mut deployment).await.unwrap();

        let disable = deployment.tasks.iter().find(|t| matches!(t.action, maestro_core::task::Action::DisableAsg)).unwrap();
        assert_eq!(disable.status, maestro_core::task::TaskStatus::Completed);
        assert!(disable.remote.is_none());
    }
}
