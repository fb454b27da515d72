//! Ports for the external collaborators: the cloud-provider façade and the
//! metadata/configuration/policy services. Only the interfaces the core
//! consumes are specified here — concrete transport (HTTP retry/
//! classification, wire formats) is an implementation detail of whatever
//! adapter is wired in at the edges.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::deployment::ImageDetails;
use crate::task::RemoteTaskRef;
use crate::Result;

/// A security group as enumerated by the cloud façade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupDescriptor {
    pub id: String,
    pub name: String,
}

/// A subnet as enumerated by the cloud façade, grouped by purpose and zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetDescriptor {
    pub id: String,
    pub zone: String,
    pub purpose: String,
}

/// A load balancer as enumerated by the cloud façade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerDescriptor {
    pub name: String,
    pub health_check_type: String,
}

/// An instance belonging to an ASG, as enumerated by the cloud façade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDescriptor {
    pub instance_id: String,
    pub private_ip: String,
}

/// Health of one instance as reported by a load balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceHealth {
    Healthy,
    Unhealthy,
    Unknown,
}

/// Status of a remote, long-running task polled by the external-task
/// tracker (C2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteTaskStatus {
    Running,
    Completed,
    Failed,
    Terminated,
}

impl RemoteTaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RemoteTaskStatus::Completed | RemoteTaskStatus::Failed | RemoteTaskStatus::Terminated)
    }
}

/// A single raw observation of a remote task's JSON document.
#[derive(Debug, Clone)]
pub struct RemoteTaskObservation {
    pub status: RemoteTaskStatus,
    /// Raw log lines in the remote format, `"YYYY-MM-DD_HH:MM:SS message"`.
    pub log: Vec<String>,
    /// Raw `updateTime`, `"YYYY-MM-DD HH:MM:SS UTC"`.
    pub update_time: String,
    pub operation: String,
    pub duration_string: String,
}

/// What a state-changing provider call returns on success: an HTTP 302 with
/// a `Location` header, from which either an ASG name or a
/// remote task handle is recovered.
#[derive(Debug, Clone)]
pub struct ProviderRedirect {
    pub location: String,
    /// Present when the redirect points at a task show page rather than
    /// directly at the new ASG's show page.
    pub remote_task: Option<RemoteTaskRef>,
}

/// The cloud-provider façade: enumeration and state-changing operations
/// against the remote autoscaling/deployment system.
#[async_trait]
pub trait CloudFacade: Send + Sync {
    async fn list_security_groups(&self, region: &str) -> Result<Vec<SecurityGroupDescriptor>>;
    async fn list_subnets(&self, region: &str, purpose: &str) -> Result<Vec<SubnetDescriptor>>;
    async fn list_load_balancers(&self, region: &str, names: &[String]) -> Result<Vec<LoadBalancerDescriptor>>;
    async fn get_image(&self, region: &str, image_id: &str) -> Result<ImageDetails>;

    /// `None` when no ASG by that name exists for the application/environment/region.
    async fn find_latest_asg(&self, application: &str, environment: &str, region: &str) -> Result<Option<String>>;

    async fn list_instances(&self, region: &str, asg_name: &str) -> Result<Vec<InstanceDescriptor>>;
    async fn instance_health_from_load_balancer(
        &self,
        region: &str,
        load_balancer: &str,
        asg_name: &str,
    ) -> Result<BTreeMap<String, InstanceHealth>>;

    /// POST create-ASG (fresh or successor). Form parameters are whatever
    /// the caller assembled from the resolved deployment record.
    async fn create_asg(&self, region: &str, params: BTreeMap<String, Vec<String>>) -> Result<ProviderRedirect>;
    async fn enable_asg(&self, region: &str, asg_name: &str) -> Result<ProviderRedirect>;
    async fn disable_asg(&self, region: &str, asg_name: &str) -> Result<ProviderRedirect>;
    async fn delete_asg(&self, region: &str, asg_name: &str) -> Result<ProviderRedirect>;

    /// Poll a remote task's JSON representation.
    async fn poll_task(&self, remote: &RemoteTaskRef) -> Result<RemoteTaskObservation>;
}

/// Owner/contact/email metadata for an application.
#[async_trait]
pub trait MetadataService: Send + Sync {
    async fn get_owner(&self, application: &str) -> Result<crate::deployment::Onix>;
}

/// Per-hash deployment parameters, launch data, and application properties
/// (Tyranitar, in the original system).
#[async_trait]
pub trait ConfigurationService: Send + Sync {
    async fn latest_hash(&self, environment: &str, application: &str) -> Result<String>;
    async fn hash_exists(&self, environment: &str, application: &str, hash: &str) -> Result<bool>;
    async fn application_properties(&self, application: &str, hash: &str) -> Result<serde_json::Value>;
    async fn deployment_params(&self, application: &str, hash: &str) -> Result<serde_json::Value>;
    async fn launch_data(&self, application: &str, hash: &str) -> Result<Option<String>>;
}

/// Governance check required in certain environments before deployment.
#[async_trait]
pub trait PolicyConfigurationService: Send + Sync {
    async fn check(&self, application: &str, environment: &str) -> Result<PolicyCheckResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCheckResult {
    Allowed,
    DefinitelyAbsent,
}

/// Per-instance application health check, used by the instance-health
/// waiter (C5).
#[async_trait]
pub trait InstanceHealthCheck: Send + Sync {
    async fn check(&self, ip: &str, port: u16, path: &str) -> Result<bool>;
}

/// Wall-clock source, injected so the pipeline/executor/tracker are
/// deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
