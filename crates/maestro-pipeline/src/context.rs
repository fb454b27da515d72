//! The in-flight deployment record plus handles to the collaborator ports
//! each step needs.

use std::sync::Arc;

use maestro_core::collaborators::{Clock, CloudFacade, ConfigurationService, MetadataService, PolicyConfigurationService};
use maestro_core::deployment::Deployment;
use maestro_core::store::DeploymentStore;

/// Everything a [`crate::steps::PipelineStep`] is handed.
pub struct DeploymentContext {
    pub deployment: Deployment,
    pub cloud: Arc<dyn CloudFacade>,
    pub metadata: Arc<dyn MetadataService>,
    pub configuration: Arc<dyn ConfigurationService>,
    pub policy: Arc<dyn PolicyConfigurationService>,
    pub store: Arc<dyn DeploymentStore>,
    pub clock: Arc<dyn Clock>,
}
