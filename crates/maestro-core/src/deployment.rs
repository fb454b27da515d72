//! Deployment entity and the configuration it carries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ResourceId;
use crate::task::Task;

/// Lifecycle phase of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Preparation,
    Deployment,
    Completed,
    Failed,
}

/// Outer status of a deployment, independent of `Phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Running,
    Completed,
    Failed,
    Terminated,
    Paused,
}

/// An AMI's parsed display name: `<application>-<version>.<virt-type>` style
/// identifiers used by the cloud-provider façade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDetails {
    pub id: String,
    pub name: String,
    pub application: String,
    pub version: String,
    pub virtualization_type: VirtualizationType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VirtualizationType {
    Hvm,
    Paravirtual,
}

/// Owner/contact metadata resolved from the application metadata service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Onix {
    pub contact: Option<String>,
    pub owner: Option<String>,
    pub email: Option<String>,
}

/// A resolved block-device mapping entry for the launch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDeviceMapping {
    pub device_name: String,
    pub virtual_name: Option<String>,
    pub volume_size_gb: Option<u32>,
    pub delete_on_termination: bool,
}

/// A single `{Key, Value, ...}` tag synthesized for the new ASG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScalingGroupTag {
    pub key: String,
    pub value: String,
    pub propagate_at_launch: bool,
    pub resource_type: String,
    pub resource_id: String,
}

/// The union of Tyranitar (configuration-service) documents a deployment
/// resolves by hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tyranitar {
    pub application_properties: serde_json::Value,
    pub deployment_params: serde_json::Value,
    pub launch_data: Option<String>,
}

/// The configuration under construction (for a new ASG) or captured from a
/// predecessor (for disable/delete and undo). Both `new_state` and
/// `previous_state` share this shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AsgState {
    pub hash: Option<String>,
    /// The raw image id supplied on the deploy request, resolved into
    /// `image_details` by the `get-image-details` pipeline step.
    pub requested_image_id: Option<String>,
    pub image_details: Option<ImageDetails>,
    pub onix: Option<Onix>,
    pub launch_configuration_name: Option<String>,
    pub auto_scaling_group_name: Option<String>,
    pub selected_security_group_ids: Vec<String>,
    pub selected_subnets: Vec<String>,
    pub availability_zones: Vec<String>,
    pub vpc_zone_identifier: Option<String>,
    pub block_device_mappings: Vec<BlockDeviceMapping>,
    pub auto_scaling_group_tags: Vec<AutoScalingGroupTag>,
    pub user_data: Option<String>,
    pub tyranitar: Tyranitar,
    pub termination_policies: Vec<String>,
    pub selected_load_balancers: Vec<String>,
    pub deployment_params: HashMap<String, serde_json::Value>,
}

/// A deployment. Identified by an opaque [`ResourceId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: ResourceId,
    pub application: String,
    pub environment: String,
    pub region: String,
    pub user: String,
    pub message: String,

    pub created: DateTime<Utc>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,

    pub phase: Phase,
    pub status: Status,

    pub new_state: AsgState,
    pub previous_state: Option<AsgState>,

    pub tasks: Vec<Task>,

    pub rollback: bool,
    pub silent: bool,

    /// Set once the deployment reaches `Phase::Failed`.
    pub failure_cause: Option<String>,
}

impl Deployment {
    /// Triple that the control plane enforces "at most one in flight" over.
    pub fn key(&self) -> DeploymentKey {
        DeploymentKey {
            application: self.application.clone(),
            environment: self.environment.clone(),
            region: self.region.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Completed | Phase::Failed)
    }
}

/// The `(application, environment, region)` identity the control plane's
/// in-progress registry, lock, and pause flags key on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentKey {
    pub application: String,
    pub environment: String,
    pub region: String,
}

impl std::fmt::Display for DeploymentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.application, self.environment, self.region)
    }
}
