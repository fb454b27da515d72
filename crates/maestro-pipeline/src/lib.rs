//! The parameter pipeline (C3): an ordered chain of validators/enrichers
//! that produces a fully-resolved deployment record from a minimal request.

pub mod context;
pub mod outcome;
pub mod runner;
pub mod steps;

pub use context::DeploymentContext;
pub use outcome::StepOutcome;
pub use runner::{PipelineResult, PipelineRunner};

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use maestro_core::collaborators::{
        CloudFacade, ConfigurationService, InstanceHealth, LoadBalancerDescriptor, MetadataService,
        PolicyCheckResult, PolicyConfigurationService, ProviderRedirect, RemoteTaskObservation,
        SecurityGroupDescriptor, SubnetDescriptor, SystemClock,
    };
    use maestro_core::deployment::{Deployment, ImageDetails, Onix, Phase, Status, VirtualizationType};
    use maestro_core::id::ResourceId;
    use maestro_core::store::{DeploymentQuery, DeploymentStore};
    use maestro_core::task::{initial_task_sequence, LogEntry, RemoteTaskRef};
    use maestro_core::{Error, Result};

    use super::*;

    #[derive(Default)]
    struct MockFacade {
        latest_asg: Option<String>,
    }

    #[async_trait]
    impl CloudFacade for MockFacade {
        async fn list_security_groups(&self, _region: &str) -> Result<Vec<SecurityGroupDescriptor>> {
            Ok(vec![SecurityGroupDescriptor { id: "sg-1".to_string(), name: "web".to_string() }])
        }
        async fn list_subnets(&self, _region: &str, _purpose: &str) -> Result<Vec<SubnetDescriptor>> {
            Ok(vec![
                SubnetDescriptor { id: "subnet-a".to_string(), zone: "a".to_string(), purpose: "internal".to_string() },
                SubnetDescriptor { id: "subnet-b".to_string(), zone: "b".to_string(), purpose: "internal".to_string() },
            ])
        }
        async fn list_load_balancers(&self, _region: &str, names: &[String]) -> Result<Vec<LoadBalancerDescriptor>> {
            Ok(names.iter().map(|n| LoadBalancerDescriptor { name: n.clone(), health_check_type: "EC2".to_string() }).collect())
        }
        async fn get_image(&self, _region: &str, image_id: &str) -> Result<ImageDetails> {
            Ok(ImageDetails {
                id: image_id.to_string(),
                name: "search-1.0.0.hvm".to_string(),
                application: "search".to_string(),
                version: "1.0.0".to_string(),
                virtualization_type: VirtualizationType::Hvm,
            })
        }
        async fn find_latest_asg(&self, _application: &str, _environment: &str, _region: &str) -> Result<Option<String>> {
            Ok(self.latest_asg.clone())
        }
        async fn list_instances(&self, _region: &str, _asg_name: &str) -> Result<Vec<maestro_core::collaborators::InstanceDescriptor>> {
            Ok(vec![])
        }
        async fn instance_health_from_load_balancer(
            &self,
            _region: &str,
            _load_balancer: &str,
            _asg_name: &str,
        ) -> Result<BTreeMap<String, InstanceHealth>> {
            Ok(BTreeMap::new())
        }
        async fn create_asg(&self, _region: &str, _params: BTreeMap<String, Vec<String>>) -> Result<ProviderRedirect> {
            unimplemented!("not exercised by pipeline tests")
        }
        async fn enable_asg(&self, _region: &str, _asg_name: &str) -> Result<ProviderRedirect> {
            unimplemented!("not exercised by pipeline tests")
        }
        async fn disable_asg(&self, _region: &str, _asg_name: &str) -> Result<ProviderRedirect> {
            unimplemented!("not exercised by pipeline tests")
        }
        async fn delete_asg(&self, _region: &str, _asg_name: &str) -> Result<ProviderRedirect> {
            unimplemented!("not exercised by pipeline tests")
        }
        async fn poll_task(&self, _remote: &RemoteTaskRef) -> Result<RemoteTaskObservation> {
            unimplemented!("not exercised by pipeline tests")
        }
    }

    struct MockMetadata;

    #[async_trait]
    impl MetadataService for MockMetadata {
        async fn get_owner(&self, _application: &str) -> Result<Onix> {
            Ok(Onix { contact: Some("alice".to_string()), owner: Some("alice".to_string()), email: Some("alice@example.com".to_string()) })
        }
    }

    struct MockConfiguration;

    #[async_trait]
    impl ConfigurationService for MockConfiguration {
        async fn latest_hash(&self, _environment: &str, _application: &str) -> Result<String> {
            Ok("hash-1".to_string())
        }
        async fn hash_exists(&self, _environment: &str, _application: &str, _hash: &str) -> Result<bool> {
            Ok(true)
        }
        async fn application_properties(&self, _application: &str, _hash: &str) -> Result<serde_json::Value> {
            Ok(serde_json::json!({"service": {"port": 8080}}))
        }
        async fn deployment_params(&self, _application: &str, _hash: &str) -> Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
        async fn launch_data(&self, _application: &str, _hash: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    struct MockPolicy;

    #[async_trait]
    impl PolicyConfigurationService for MockPolicy {
        async fn check(&self, _application: &str, _environment: &str) -> Result<PolicyCheckResult> {
            Ok(PolicyCheckResult::Allowed)
        }
    }

    #[derive(Default)]
    struct MockStore {
        predecessor: Option<Deployment>,
    }

    #[async_trait]
    impl DeploymentStore for MockStore {
        async fn store_deployment(&self, _deployment: &Deployment) -> Result<()> {
            Ok(())
        }
        async fn get_deployment(&self, id: ResourceId) -> Result<Deployment> {
            Err(Error::NotFound(id.to_string()))
        }
        async fn add_to_deployment_parameters(&self, _id: ResourceId, _partial: serde_json::Value) -> Result<()> {
            Ok(())
        }
        async fn append_log(&self, _id: ResourceId, _message: &str) -> Result<()> {
            Ok(())
        }
        async fn get_logs(&self, _id: ResourceId, _since: Option<chrono::DateTime<chrono::Utc>>) -> Result<Vec<LogEntry>> {
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
            asg_name: &str,
            _excluding: ResourceId,
        ) -> Result<Option<Deployment>> {
            Ok(self
                .predecessor
                .clone()
                .filter(|d| d.new_state.auto_scaling_group_name.as_deref() == Some(asg_name)))
        }
        async fn query_deployments(&self, _query: DeploymentQuery) -> Result<Vec<Deployment>> {
            Ok(vec![])
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
            phase: Phase::Preparation,
            status: Status::Running,
            new_state: Default::default(),
            previous_state: None,
            tasks: initial_task_sequence(),
            rollback: false,
            silent: false,
            failure_cause: None,
        };
        deployment.new_state.requested_image_id = Some("ami-123".to_string());
        deployment
    }

    fn new_context() -> DeploymentContext {
        DeploymentContext {
            deployment: new_deployment(),
            cloud: Arc::new(MockFacade::default()),
            metadata: Arc::new(MockMetadata),
            configuration: Arc::new(MockConfiguration),
            policy: Arc::new(MockPolicy),
            store: Arc::new(MockStore::default()),
            clock: Arc::new(SystemClock),
        }
    }

    #[tokio::test]
    async fn first_deployment_resolves_to_deployment_phase() {
        let mut ctx = new_context();
        let runner = PipelineRunner::default();
        let result = runner.run(&mut ctx).await;
        assert!(matches!(result, PipelineResult::Completed), "{result:?}");
        assert_eq!(ctx.deployment.phase, Phase::Deployment);
        assert_eq!(ctx.deployment.new_state.auto_scaling_group_name.as_deref(), Some("search-poke-v001"));
        assert!(ctx.deployment.new_state.user_data.is_some());
    }

    #[tokio::test]
    async fn successor_deployment_recovers_predecessor_state_from_its_live_asg() {
        use crate::steps::{PipelineStep, PopulatePreviousState};

        let user_data = maestro_config::userdata::render_base64(&maestro_config::userdata::UserDataContext {
            application: "search".to_string(),
            environment: "poke".to_string(),
            region: "eu-west-1".to_string(),
            hash: "old-hash".to_string(),
            image_id: "ami-111".to_string(),
            extra_vars: Default::default(),
        });

        let mut predecessor = new_deployment();
        predecessor.status = Status::Completed;
        predecessor.new_state.auto_scaling_group_name = Some("search-poke-v023".to_string());
        predecessor.new_state.user_data = Some(user_data);

        let mut ctx = new_context();
        ctx.cloud = Arc::new(MockFacade { latest_asg: Some("search-poke-v023".to_string()) });
        ctx.store = Arc::new(MockStore { predecessor: Some(predecessor) });

        let result = PopulatePreviousState.run(&mut ctx).await;
        assert!(matches!(result, StepOutcome::Success), "{result:?}");

        let previous = ctx.deployment.previous_state.expect("predecessor should have been recovered");
        assert_eq!(previous.auto_scaling_group_name.as_deref(), Some("search-poke-v023"));
        assert_eq!(previous.hash.as_deref(), Some("old-hash"));
    }

    #[tokio::test]
    async fn no_live_asg_means_no_predecessor_even_with_matching_history() {
        use crate::steps::{PipelineStep, PopulatePreviousState};

        let mut predecessor = new_deployment();
        predecessor.status = Status::Completed;
        predecessor.new_state.auto_scaling_group_name = Some("search-poke-v023".to_string());

        let mut ctx = new_context();
        ctx.store = Arc::new(MockStore { predecessor: Some(predecessor) });

        let result = PopulatePreviousState.run(&mut ctx).await;
        assert!(matches!(result, StepOutcome::Success), "{result:?}");
        assert!(ctx.deployment.previous_state.is_none());
    }

    #[tokio::test]
    async fn missing_message_fails_the_deployment() {
        let mut ctx = new_context();
        ctx.deployment.message = String::new();
        let runner = PipelineRunner::default();
        let result = runner.run(&mut ctx).await;
        match result {
            PipelineResult::Failed { step, .. } => assert_eq!(step, "validate-message"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(ctx.deployment.phase, Phase::Failed);
    }
}
