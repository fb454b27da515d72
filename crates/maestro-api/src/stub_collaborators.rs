//! No-op implementations of the external collaborator ports. These let a worker loop run
//! end-to-end against a real deployment record for local development and
//! are not meant to back a production deployment.

use std::collections::BTreeMap;

use async_trait::async_trait;
use maestro_core::collaborators::{
    CloudFacade, ConfigurationService, InstanceDescriptor, InstanceHealth, InstanceHealthCheck, LoadBalancerDescriptor,
    MetadataService, PolicyCheckResult, PolicyConfigurationService, ProviderRedirect, RemoteTaskObservation,
    SecurityGroupDescriptor, SubnetDescriptor,
};
use maestro_core::deployment::{ImageDetails, Onix, VirtualizationType};
use maestro_core::task::RemoteTaskRef;
use maestro_core::Result;

pub struct StubCollaborators;

#[async_trait]
impl CloudFacade for StubCollaborators {
    async fn list_security_groups(&self, _region: &str) -> Result<Vec<SecurityGroupDescriptor>> {
        Ok(vec![])
    }
    async fn list_subnets(&self, _region: &str, _purpose: &str) -> Result<Vec<SubnetDescriptor>> {
        Ok(vec![])
    }
    async fn list_load_balancers(&self, _region: &str, names: &[String]) -> Result<Vec<LoadBalancerDescriptor>> {
        Ok(names.iter().map(|n| LoadBalancerDescriptor { name: n.clone(), health_check_type: "EC2".to_string() }).collect())
    }
    async fn get_image(&self, _region: &str, image_id: &str) -> Result<ImageDetails> {
        Ok(ImageDetails {
            id: image_id.to_string(),
            name: format!("{image_id}.hvm"),
            application: String::new(),
            version: "0.0.0".to_string(),
            virtualization_type: VirtualizationType::Hvm,
        })
    }
    async fn find_latest_asg(&self, _application: &str, _environment: &str, _region: &str) -> Result<Option<String>> {
        Ok(None)
    }
    async fn list_instances(&self, _region: &str, _asg_name: &str) -> Result<Vec<InstanceDescriptor>> {
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
        Ok(ProviderRedirect { location: "https://provider.invalid/asgs/stub".to_string(), remote_task: None })
    }
    async fn enable_asg(&self, _region: &str, _asg_name: &str) -> Result<ProviderRedirect> {
        Ok(ProviderRedirect { location: "https://provider.invalid/asgs/stub".to_string(), remote_task: None })
    }
    async fn disable_asg(&self, _region: &str, _asg_name: &str) -> Result<ProviderRedirect> {
        Ok(ProviderRedirect { location: "https://provider.invalid/asgs/stub".to_string(), remote_task: None })
    }
    async fn delete_asg(&self, _region: &str, _asg_name: &str) -> Result<ProviderRedirect> {
        Ok(ProviderRedirect { location: "https://provider.invalid/asgs/stub".to_string(), remote_task: None })
    }
    async fn poll_task(&self, _remote: &RemoteTaskRef) -> Result<RemoteTaskObservation> {
        Err(maestro_core::Error::UpstreamNotFound("stub collaborator never issues remote tasks".to_string()))
    }
}

#[async_trait]
impl MetadataService for StubCollaborators {
    async fn get_owner(&self, _application: &str) -> Result<Onix> {
        Ok(Onix::default())
    }
}

#[async_trait]
impl ConfigurationService for StubCollaborators {
    async fn latest_hash(&self, _environment: &str, _application: &str) -> Result<String> {
        Ok("stub".to_string())
    }
    async fn hash_exists(&self, _environment: &str, _application: &str, _hash: &str) -> Result<bool> {
        Ok(true)
    }
    async fn application_properties(&self, _application: &str, _hash: &str) -> Result<serde_json::Value> {
        Ok(serde_json::json!({}))
    }
    async fn deployment_params(&self, _application: &str, _hash: &str) -> Result<serde_json::Value> {
        Ok(serde_json::json!({}))
    }
    async fn launch_data(&self, _application: &str, _hash: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

#[async_trait]
impl PolicyConfigurationService for StubCollaborators {
    async fn check(&self, _application: &str, _environment: &str) -> Result<PolicyCheckResult> {
        Ok(PolicyCheckResult::Allowed)
    }
}

#[async_trait]
impl InstanceHealthCheck for StubCollaborators {
    async fn check(&self, _ip: &str, _port: u16, _path: &str) -> Result<bool> {
        Ok(true)
    }
}
