//! The 25 pipeline steps, in the fixed order `PipelineRunner`
//! drives them in.

use async_trait::async_trait;
use maestro_core::collaborators::Clock;
use maestro_core::deployment::{AutoScalingGroupTag, BlockDeviceMapping, Phase, VirtualizationType};
use maestro_core::Error;
use serde_json::{Map, Value};

use crate::context::DeploymentContext;
use crate::outcome::StepOutcome;

#[async_trait]
pub trait PipelineStep: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome;
}

/// The working, resolved deployment-parameter map (distinct from
/// `tyranitar.deployment_params`, which holds the raw document as fetched
/// from the configuration service).
fn params_map(ctx: &DeploymentContext) -> Map<String, Value> {
    ctx.deployment.new_state.deployment_params.clone().into_iter().collect()
}

fn set_params_map(ctx: &mut DeploymentContext, map: Map<String, Value>) {
    ctx.deployment.new_state.deployment_params = map.into_iter().collect();
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}

/// Step 1: `start-deployment-preparation`.
pub struct StartDeploymentPreparation;

#[async_trait]
impl PipelineStep for StartDeploymentPreparation {
    fn name(&self) -> &'static str {
        "start-deployment-preparation"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        ctx.deployment.phase = Phase::Preparation;
        StepOutcome::Success
    }
}

macro_rules! validate_field_step {
    ($step:ident, $name:literal, $field:ident) => {
        pub struct $step;

        #[async_trait]
        impl PipelineStep for $step {
            fn name(&self) -> &'static str {
                $name
            }

            async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
                if ctx.deployment.$field.trim().is_empty() {
                    return StepOutcome::Error(Error::MissingField(stringify!($field).to_string()));
                }
                StepOutcome::Success
            }
        }
    };
}

validate_field_step!(ValidateRegion, "validate-region", region);
validate_field_step!(ValidateEnvironment, "validate-environment", environment);
validate_field_step!(ValidateApplication, "validate-application", application);
validate_field_step!(ValidateUser, "validate-user", user);
validate_field_step!(ValidateMessage, "validate-message", message);

/// Step 2f: `validate-image`. The image is carried as `requested_image_id`
/// rather than a plain struct field, so it doesn't fit the macro above.
pub struct ValidateImage;

#[async_trait]
impl PipelineStep for ValidateImage {
    fn name(&self) -> &'static str {
        "validate-image"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        match &ctx.deployment.new_state.requested_image_id {
            Some(id) if !id.trim().is_empty() => StepOutcome::Success,
            _ => StepOutcome::Error(Error::MissingField("image".to_string())),
        }
    }
}

/// Step 3: `get-metadata`.
pub struct GetMetadata;

#[async_trait]
impl PipelineStep for GetMetadata {
    fn name(&self) -> &'static str {
        "get-metadata"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        match ctx.metadata.get_owner(&ctx.deployment.application).await {
            Ok(onix) => {
                ctx.deployment.new_state.onix = Some(onix);
                StepOutcome::Success
            }
            Err(e) => StepOutcome::Error(e),
        }
    }
}

/// Step 4: `ensure-hash`.
pub struct EnsureHash;

#[async_trait]
impl PipelineStep for EnsureHash {
    fn name(&self) -> &'static str {
        "ensure-hash"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        if ctx.deployment.new_state.hash.is_some() {
            return StepOutcome::Success;
        }
        match ctx
            .configuration
            .latest_hash(&ctx.deployment.environment, &ctx.deployment.application)
            .await
        {
            Ok(hash) => {
                ctx.deployment.new_state.hash = Some(hash);
                StepOutcome::Success
            }
            Err(e) => StepOutcome::Error(e),
        }
    }
}

/// Step 5: `verify-hash`.
pub struct VerifyHash;

#[async_trait]
impl PipelineStep for VerifyHash {
    fn name(&self) -> &'static str {
        "verify-hash"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let hash = ctx.deployment.new_state.hash.clone().unwrap_or_default();
        match ctx
            .configuration
            .hash_exists(&ctx.deployment.environment, &ctx.deployment.application, &hash)
            .await
        {
            Ok(true) => StepOutcome::Success,
            Ok(false) => StepOutcome::Error(Error::ConfigurationMissing(format!("hash {hash}"))),
            Err(e) => StepOutcome::Error(e),
        }
    }
}

/// Step 6a: `get-application-properties`.
pub struct GetApplicationProperties;

#[async_trait]
impl PipelineStep for GetApplicationProperties {
    fn name(&self) -> &'static str {
        "get-application-properties"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let hash = ctx.deployment.new_state.hash.clone().unwrap_or_default();
        match ctx.configuration.application_properties(&ctx.deployment.application, &hash).await {
            Ok(props) => {
                ctx.deployment.new_state.tyranitar.application_properties = props;
                StepOutcome::Success
            }
            Err(e) => StepOutcome::Error(e),
        }
    }
}

/// Step 6b: `get-deployment-params`.
pub struct GetDeploymentParams;

#[async_trait]
impl PipelineStep for GetDeploymentParams {
    fn name(&self) -> &'static str {
        "get-deployment-params"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let hash = ctx.deployment.new_state.hash.clone().unwrap_or_default();
        match ctx.configuration.deployment_params(&ctx.deployment.application, &hash).await {
            Ok(params) => {
                if let Value::Object(map) = &params {
                    ctx.deployment.new_state.deployment_params = map.clone().into_iter().collect();
                }
                ctx.deployment.new_state.tyranitar.deployment_params = params;
                StepOutcome::Success
            }
            Err(e) => StepOutcome::Error(e),
        }
    }
}

/// Step 6c: `get-launch-data`.
pub struct GetLaunchData;

#[async_trait]
impl PipelineStep for GetLaunchData {
    fn name(&self) -> &'static str {
        "get-launch-data"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let hash = ctx.deployment.new_state.hash.clone().unwrap_or_default();
        match ctx.configuration.launch_data(&ctx.deployment.application, &hash).await {
            Ok(data) => {
                ctx.deployment.new_state.tyranitar.launch_data = data;
                StepOutcome::Success
            }
            Err(e) => StepOutcome::Error(e),
        }
    }
}

/// Step 7: `populate-defaults`.
pub struct PopulateDefaults;

#[async_trait]
impl PipelineStep for PopulateDefaults {
    fn name(&self) -> &'static str {
        "populate-defaults"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let params = params_map(ctx);
        let applied = maestro_config::defaults::DeploymentParamDefaults::apply(params);
        set_params_map(ctx, applied);
        StepOutcome::Success
    }
}

/// Step 8: `populate-previous-state`. The cloud façade, not local history,
/// decides whether a predecessor ASG exists — local deployment rows can
/// lag or outlive the ASG they describe. Once the façade names a live ASG,
/// the matching completed deployment record supplies the captured
/// configuration for it.
pub struct PopulatePreviousState;

#[async_trait]
impl PipelineStep for PopulatePreviousState {
    fn name(&self) -> &'static str {
        "populate-previous-state"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let asg_name = match ctx
            .cloud
            .find_latest_asg(&ctx.deployment.application, &ctx.deployment.environment, &ctx.deployment.region)
            .await
        {
            Ok(found) => found,
            Err(e) => return StepOutcome::Error(e),
        };

        let Some(asg_name) = asg_name else {
            ctx.deployment.previous_state = None;
            return StepOutcome::Success;
        };

        let predecessor = match ctx
            .store
            .deployment_for_asg_name(
                &ctx.deployment.application,
                &ctx.deployment.environment,
                &ctx.deployment.region,
                &asg_name,
                ctx.deployment.id,
            )
            .await
        {
            Ok(found) => found,
            Err(e) => return StepOutcome::Error(e),
        };

        let Some(predecessor) = predecessor else {
            ctx.deployment.previous_state = None;
            return StepOutcome::Success;
        };

        let mut previous = predecessor.new_state;
        if let Some(user_data) = &previous.user_data {
            previous.hash = maestro_config::userdata::extract_hash_from_base64(user_data).or(previous.hash);
        }
        ctx.deployment.previous_state = Some(previous);
        StepOutcome::Success
    }
}

/// Step 9a: `populate-previous-application-properties`. Skips silently when
/// there is no previous state.
pub struct PopulatePreviousApplicationProperties;

#[async_trait]
impl PipelineStep for PopulatePreviousApplicationProperties {
    fn name(&self) -> &'static str {
        "populate-previous-application-properties"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let Some(previous) = ctx.deployment.previous_state.clone() else {
            return StepOutcome::Success;
        };
        let Some(hash) = previous.hash else {
            return StepOutcome::Success;
        };
        match ctx.configuration.application_properties(&ctx.deployment.application, &hash).await {
            Ok(props) => {
                if let Some(state) = ctx.deployment.previous_state.as_mut() {
                    state.tyranitar.application_properties = props;
                }
                StepOutcome::Success
            }
            // Best-effort: the predecessor's configuration may have been
            // retired, that's not grounds to fail this deployment.
            Err(_) => StepOutcome::Success,
        }
    }
}

/// Step 9b: `get-previous-image-details`. Skips silently when there is no
/// previous state.
pub struct GetPreviousImageDetails;

#[async_trait]
impl PipelineStep for GetPreviousImageDetails {
    fn name(&self) -> &'static str {
        "get-previous-image-details"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let previous_image_id = ctx
            .deployment
            .previous_state
            .as_ref()
            .and_then(|p| p.image_details.as_ref())
            .map(|i| i.id.clone());

        let Some(image_id) = previous_image_id else {
            return StepOutcome::Success;
        };

        match ctx.cloud.get_image(&ctx.deployment.region, &image_id).await {
            Ok(details) => {
                if let Some(state) = ctx.deployment.previous_state.as_mut() {
                    state.image_details = Some(details);
                }
                StepOutcome::Success
            }
            Err(_) => StepOutcome::Success,
        }
    }
}

/// Step 10: `create-names`.
pub struct CreateNames;

#[async_trait]
impl PipelineStep for CreateNames {
    fn name(&self) -> &'static str {
        "create-names"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let previous_asg_name = ctx.deployment.previous_state.as_ref().and_then(|p| p.auto_scaling_group_name.as_deref());
        let asg_name = maestro_core::naming::next_asg_name(&ctx.deployment.application, &ctx.deployment.environment, previous_asg_name);
        let launch_configuration_name = maestro_core::naming::launch_configuration_name(&asg_name, ctx.clock.now());

        ctx.deployment.new_state.auto_scaling_group_name = Some(asg_name);
        ctx.deployment.new_state.launch_configuration_name = Some(launch_configuration_name);
        StepOutcome::Success
    }
}

/// Step 11: `get-image-details` / `verify-image`.
pub struct GetImageDetailsVerifyImage;

#[async_trait]
impl PipelineStep for GetImageDetailsVerifyImage {
    fn name(&self) -> &'static str {
        "get-image-details"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let Some(image_id) = ctx.deployment.new_state.requested_image_id.clone() else {
            return StepOutcome::Error(Error::MissingField("image".to_string()));
        };

        let details = match ctx.cloud.get_image(&ctx.deployment.region, &image_id).await {
            Ok(details) => details,
            Err(e) => return StepOutcome::Error(e),
        };

        if details.application != ctx.deployment.application {
            return StepOutcome::Error(Error::MismatchedImage {
                expected: ctx.deployment.application.clone(),
                found: details.application,
            });
        }

        ctx.deployment.new_state.image_details = Some(details);
        StepOutcome::Success
    }
}

/// Legacy EC2 instance families that only support paravirtual AMIs; anything
/// else is treated as HVM-only. Step 12's policy table.
const PARAVIRTUAL_ONLY_INSTANCE_TYPES: &[&str] = &[
    "t1.micro", "m1.small", "m1.medium", "m1.large", "m1.xlarge", "c1.medium", "c1.xlarge", "m2.xlarge",
    "m2.2xlarge", "m2.4xlarge",
];

/// Step 12: `check-instance-type-compatibility`.
pub struct CheckInstanceTypeCompatibility;

#[async_trait]
impl PipelineStep for CheckInstanceTypeCompatibility {
    fn name(&self) -> &'static str {
        "check-instance-type-compatibility"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let Some(image) = &ctx.deployment.new_state.image_details else {
            return StepOutcome::Error(Error::Internal("check-instance-type-compatibility ran before get-image-details".to_string()));
        };

        let params = params_map(ctx);
        let instance_type = params.get("instance-type").and_then(Value::as_str).unwrap_or("t1.micro").to_string();
        let is_legacy = PARAVIRTUAL_ONLY_INSTANCE_TYPES.contains(&instance_type.as_str());

        let incompatible = match image.virtualization_type {
            VirtualizationType::Hvm => is_legacy,
            VirtualizationType::Paravirtual => !is_legacy,
        };

        if incompatible {
            return StepOutcome::Error(Error::IncompatibleInstanceType(instance_type));
        }
        StepOutcome::Success
    }
}

/// Step 13: `check-contact-property`.
pub struct CheckContactProperty;

#[async_trait]
impl PipelineStep for CheckContactProperty {
    fn name(&self) -> &'static str {
        "check-contact-property"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let has_contact = ctx.deployment.new_state.onix.as_ref().and_then(|o| o.contact.as_ref()).is_some();
        if !has_contact {
            return StepOutcome::Error(Error::MissingField("contact".to_string()));
        }
        StepOutcome::Success
    }
}

/// Step 14: `check-configuration`. The only step allowed to return `Retry`.
pub struct CheckConfiguration;

#[async_trait]
impl PipelineStep for CheckConfiguration {
    fn name(&self) -> &'static str {
        "check-configuration"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        if !matches!(ctx.deployment.environment.as_str(), "poke" | "prod") {
            return StepOutcome::Success;
        }

        match ctx.policy.check(&ctx.deployment.application, &ctx.deployment.environment).await {
            Ok(maestro_core::collaborators::PolicyCheckResult::Allowed) => StepOutcome::Success,
            Ok(maestro_core::collaborators::PolicyCheckResult::DefinitelyAbsent) => {
                StepOutcome::Error(Error::ConfigurationMissing(ctx.deployment.application.clone()))
            }
            Err(e) if e.is_retryable() => StepOutcome::Retry(e.to_string()),
            Err(e) => StepOutcome::Error(e),
        }
    }
}

/// Step 15: `add-required-security-groups`.
pub struct AddRequiredSecurityGroups;

#[async_trait]
impl PipelineStep for AddRequiredSecurityGroups {
    fn name(&self) -> &'static str {
        "add-required-security-groups"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let mut params = params_map(ctx);
        let mut names = params.get("selected-security-groups").map(string_list).unwrap_or_default();
        for required in maestro_config::system::REQUIRED_SECURITY_GROUPS {
            if !names.iter().any(|n| n == required) {
                names.push(required.to_string());
            }
        }
        params.insert("selected-security-groups".to_string(), Value::Array(names.into_iter().map(Value::String).collect()));
        set_params_map(ctx, params);
        StepOutcome::Success
    }
}

/// Step 16: `map-security-group-ids`.
pub struct MapSecurityGroupIds;

#[async_trait]
impl PipelineStep for MapSecurityGroupIds {
    fn name(&self) -> &'static str {
        "map-security-group-ids"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let params = params_map(ctx);
        let names = params.get("selected-security-groups").map(string_list).unwrap_or_default();

        let descriptors = match ctx.cloud.list_security_groups(&ctx.deployment.region).await {
            Ok(descriptors) => descriptors,
            Err(e) => return StepOutcome::Error(e),
        };

        let mut ids = Vec::new();
        let mut unresolved = Vec::new();
        for name in names {
            if name.starts_with("sg-") {
                ids.push(name);
                continue;
            }
            match descriptors.iter().find(|d| d.name == name) {
                Some(d) => ids.push(d.id.clone()),
                None => unresolved.push(name),
            }
        }

        if !unresolved.is_empty() {
            return StepOutcome::Error(Error::UnknownSecurityGroups(unresolved));
        }

        ctx.deployment.new_state.selected_security_group_ids = ids;
        StepOutcome::Success
    }
}

/// Step 17: `verify-load-balancers` (+ `check-for-deleted-load-balancers`).
pub struct VerifyLoadBalancers;

#[async_trait]
impl PipelineStep for VerifyLoadBalancers {
    fn name(&self) -> &'static str {
        "verify-load-balancers"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let params = params_map(ctx);
        let requested = params.get("selected-load-balancers").map(string_list).unwrap_or_default();

        if !requested.is_empty() {
            let found = match ctx.cloud.list_load_balancers(&ctx.deployment.region, &requested).await {
                Ok(found) => found,
                Err(e) => return StepOutcome::Error(e),
            };
            let missing: Vec<String> = requested
                .iter()
                .filter(|name| !found.iter().any(|f| &f.name == *name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return StepOutcome::Error(Error::MissingLoadBalancers(missing));
            }
        }
        ctx.deployment.new_state.selected_load_balancers = requested;

        if let Some(previous) = ctx.deployment.previous_state.as_mut() {
            if !previous.selected_load_balancers.is_empty() {
                match ctx.cloud.list_load_balancers(&ctx.deployment.region, &previous.selected_load_balancers).await {
                    Ok(found) => {
                        previous.selected_load_balancers.retain(|name| found.iter().any(|f| &f.name == name));
                    }
                    Err(_) => previous.selected_load_balancers.clear(),
                }
            }
        }

        StepOutcome::Success
    }
}

/// Step 18: `populate-subnets`.
pub struct PopulateSubnets;

#[async_trait]
impl PipelineStep for PopulateSubnets {
    fn name(&self) -> &'static str {
        "populate-subnets"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let params = params_map(ctx);
        let purpose = params.get("subnet-purpose").and_then(Value::as_str).unwrap_or("internal").to_string();
        let zones = params.get("selected-zones").map(string_list).unwrap_or_default();

        let subnets = match ctx.cloud.list_subnets(&ctx.deployment.region, &purpose).await {
            Ok(subnets) => subnets,
            Err(e) => return StepOutcome::Error(e),
        };

        let restricted: Vec<_> = if zones.is_empty() {
            subnets.iter().collect()
        } else {
            subnets.iter().filter(|s| zones.iter().any(|z| s.zone.ends_with(z.as_str()))).collect()
        };

        let missing_zones: Vec<String> = zones
            .iter()
            .filter(|z| !restricted.iter().any(|s| s.zone.ends_with(z.as_str())))
            .cloned()
            .collect();
        if !zones.is_empty() && !missing_zones.is_empty() {
            return StepOutcome::Error(Error::NoSubnets(missing_zones));
        }

        ctx.deployment.new_state.selected_subnets = restricted.into_iter().map(|s| s.id.clone()).collect();
        StepOutcome::Success
    }
}

/// Step 19: `populate-vpc-zone-identifier`.
pub struct PopulateVpcZoneIdentifier;

#[async_trait]
impl PipelineStep for PopulateVpcZoneIdentifier {
    fn name(&self) -> &'static str {
        "populate-vpc-zone-identifier"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        if ctx.deployment.new_state.selected_subnets.is_empty() {
            return StepOutcome::Success;
        }
        ctx.deployment.new_state.vpc_zone_identifier = Some(ctx.deployment.new_state.selected_subnets.join(","));
        StepOutcome::Success
    }
}

/// Step 20: `populate-availability-zones`.
pub struct PopulateAvailabilityZones;

#[async_trait]
impl PipelineStep for PopulateAvailabilityZones {
    fn name(&self) -> &'static str {
        "populate-availability-zones"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let params = params_map(ctx);
        let zones = params.get("selected-zones").map(string_list).unwrap_or_default();
        ctx.deployment.new_state.availability_zones =
            zones.into_iter().map(|z| format!("{}{}", ctx.deployment.region, z)).collect();
        StepOutcome::Success
    }
}

/// Step 21: `populate-termination-policies`.
pub struct PopulateTerminationPolicies;

#[async_trait]
impl PipelineStep for PopulateTerminationPolicies {
    fn name(&self) -> &'static str {
        "populate-termination-policies"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let params = params_map(ctx);
        let policies = params.get("termination-policy").map(string_list).unwrap_or_else(|| vec!["Default".to_string()]);
        ctx.deployment.new_state.termination_policies = policies;
        StepOutcome::Success
    }
}

/// Step 22: `create-block-device-mappings`.
pub struct CreateBlockDeviceMappings;

#[async_trait]
impl PipelineStep for CreateBlockDeviceMappings {
    fn name(&self) -> &'static str {
        "create-block-device-mappings"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let params = params_map(ctx);
        let mut mappings = vec![BlockDeviceMapping {
            device_name: "/dev/sda1".to_string(),
            virtual_name: None,
            volume_size_gb: params.get("root-volume").and_then(Value::as_u64).map(|v| v as u32),
            delete_on_termination: true,
        }];

        if let Some(Value::Array(stores)) = params.get("instance-stores") {
            for (idx, _) in stores.iter().enumerate() {
                mappings.push(BlockDeviceMapping {
                    device_name: format!("/dev/sd{}", (b'b' + idx as u8) as char),
                    virtual_name: Some(format!("ephemeral{idx}")),
                    volume_size_gb: None,
                    delete_on_termination: true,
                });
            }
        }

        ctx.deployment.new_state.block_device_mappings = mappings;
        StepOutcome::Success
    }
}

/// Step 23: `create-auto-scaling-group-tags`.
pub struct CreateAutoScalingGroupTags;

#[async_trait]
impl PipelineStep for CreateAutoScalingGroupTags {
    fn name(&self) -> &'static str {
        "create-auto-scaling-group-tags"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let Some(asg_name) = ctx.deployment.new_state.auto_scaling_group_name.clone() else {
            return StepOutcome::Error(Error::Internal("create-auto-scaling-group-tags ran before create-names".to_string()));
        };
        let Some(image) = &ctx.deployment.new_state.image_details else {
            return StepOutcome::Error(Error::Internal("create-auto-scaling-group-tags ran before get-image-details".to_string()));
        };
        let contact = ctx.deployment.new_state.onix.as_ref().and_then(|o| o.contact.clone()).unwrap_or_default();
        let name = format!("{}-{}", image.application, image.version);
        let deployed_on = ctx.clock.now().to_rfc3339();

        let entries = [
            ("Application", ctx.deployment.application.clone()),
            ("Contact", contact),
            ("DeployedBy", ctx.deployment.user.clone()),
            ("DeployedOn", deployed_on),
            ("Environment", ctx.deployment.environment.clone()),
            ("Name", name),
            ("Version", image.version.clone()),
        ];

        ctx.deployment.new_state.auto_scaling_group_tags = entries
            .into_iter()
            .map(|(key, value)| AutoScalingGroupTag {
                key: key.to_string(),
                value,
                propagate_at_launch: true,
                resource_type: "auto-scaling-group".to_string(),
                resource_id: asg_name.clone(),
            })
            .collect();

        StepOutcome::Success
    }
}

/// Step 24: `generate-user-data`.
pub struct GenerateUserData;

#[async_trait]
impl PipelineStep for GenerateUserData {
    fn name(&self) -> &'static str {
        "generate-user-data"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        let Some(image) = &ctx.deployment.new_state.image_details else {
            return StepOutcome::Error(Error::Internal("generate-user-data ran before get-image-details".to_string()));
        };
        let hash = ctx.deployment.new_state.hash.clone().unwrap_or_default();

        let user_data_ctx = maestro_config::userdata::UserDataContext {
            application: ctx.deployment.application.clone(),
            environment: ctx.deployment.environment.clone(),
            region: ctx.deployment.region.clone(),
            hash,
            image_id: image.id.clone(),
            extra_vars: Default::default(),
        };

        ctx.deployment.new_state.user_data = Some(maestro_config::userdata::render_base64(&user_data_ctx));
        StepOutcome::Success
    }
}

/// Step 25: `complete-deployment-preparation`.
pub struct CompleteDeploymentPreparation;

#[async_trait]
impl PipelineStep for CompleteDeploymentPreparation {
    fn name(&self) -> &'static str {
        "complete-deployment-preparation"
    }

    async fn run(&self, ctx: &mut DeploymentContext) -> StepOutcome {
        ctx.deployment.phase = Phase::Deployment;
        ctx.deployment.start = Some(ctx.clock.now());
        StepOutcome::Success
    }
}

/// The full, fixed step sequence.
pub fn full_pipeline() -> Vec<Box<dyn PipelineStep>> {
    vec![
        Box::new(StartDeploymentPreparation),
        Box::new(ValidateRegion),
        Box::new(ValidateEnvironment),
        Box::new(ValidateApplication),
        Box::new(ValidateUser),
        Box::new(ValidateImage),
        Box::new(ValidateMessage),
        Box::new(GetMetadata),
        Box::new(EnsureHash),
        Box::new(VerifyHash),
        Box::new(GetApplicationProperties),
        Box::new(GetDeploymentParams),
        Box::new(GetLaunchData),
        Box::new(PopulateDefaults),
        Box::new(PopulatePreviousState),
        Box::new(PopulatePreviousApplicationProperties),
        Box::new(GetPreviousImageDetails),
        Box::new(CreateNames),
        Box::new(GetImageDetailsVerifyImage),
        Box::new(CheckInstanceTypeCompatibility),
        Box::new(CheckContactProperty),
        Box::new(CheckConfiguration),
        Box::new(AddRequiredSecurityGroups),
        Box::new(MapSecurityGroupIds),
        Box::new(VerifyLoadBalancers),
        Box::new(PopulateSubnets),
        Box::new(PopulateVpcZoneIdentifier),
        Box::new(PopulateAvailabilityZones),
        Box::new(PopulateTerminationPolicies),
        Box::new(CreateBlockDeviceMappings),
        Box::new(CreateAutoScalingGroupTags),
        Box::new(GenerateUserData),
        Box::new(CompleteDeploymentPreparation),
    ]
}
