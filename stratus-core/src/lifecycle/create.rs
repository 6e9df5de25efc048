use super::{
    finish, log_transition, parse_size, ClusterOrchestrator, ClusterState, CreateOutcome,
    CreateRequest, StackTransition,
};
use crate::clients::{LaunchMode, SETTING_CONTAINER_INSTANCE_LONG_ARN};
use crate::error::{Result, StratusError};
use crate::instance::{self, DEFAULT_INSTANCE_TYPE};
use crate::params::{keys, StackParams, REQUIRED_PARAMETERS};
use crate::tags::{parse_tags, Tag};
use crate::template;
use crate::validate::{self, CLUSTER_CONSTRAINTS};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// A command-line flag backed by a stack parameter.
struct ParameterFlag {
    flag: &'static str,
    key: &'static str,
}

const PARAMETER_FLAGS: &[ParameterFlag] = &[
    ParameterFlag { flag: "keypair", key: keys::KEY_PAIR_NAME },
    ParameterFlag { flag: "instance-type", key: keys::INSTANCE_TYPE },
    ParameterFlag { flag: "image-id", key: keys::AMI_ID },
    ParameterFlag { flag: "instance-role", key: keys::INSTANCE_ROLE },
    ParameterFlag { flag: "size", key: keys::ASG_MAX_SIZE },
    ParameterFlag { flag: "vpc", key: keys::VPC_ID },
    ParameterFlag { flag: "subnets", key: keys::SUBNET_IDS },
    ParameterFlag { flag: "azs", key: keys::VPC_AZS },
    ParameterFlag { flag: "security-group", key: keys::SECURITY_GROUP },
    ParameterFlag { flag: "cidr", key: keys::SOURCE_CIDR },
    ParameterFlag { flag: "port", key: keys::ECS_PORT },
    ParameterFlag { flag: "spot-price", key: keys::SPOT_PRICE },
];

impl CreateRequest {
    fn flag_value(&self, key: &str) -> Option<&str> {
        let value = match key {
            keys::KEY_PAIR_NAME => &self.key_pair,
            keys::INSTANCE_TYPE => &self.instance_type,
            keys::AMI_ID => &self.image_id,
            keys::INSTANCE_ROLE => &self.instance_role,
            keys::ASG_MAX_SIZE => &self.size,
            keys::VPC_ID => &self.vpc_id,
            keys::SUBNET_IDS => &self.subnet_ids,
            keys::VPC_AZS => &self.vpc_azs,
            keys::SECURITY_GROUP => &self.security_groups,
            keys::SOURCE_CIDR => &self.source_cidr,
            keys::ECS_PORT => &self.port,
            keys::SPOT_PRICE => &self.spot_price,
            _ => return None,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// Flags that were given a non-empty value, in declaration order.
    fn given_flags(&self) -> impl Iterator<Item = (&'static ParameterFlag, &str)> {
        PARAMETER_FLAGS.iter().filter_map(move |f| self.flag_value(f.key).map(|v| (f, v)))
    }

    fn tags(&self) -> Result<Vec<Tag>> {
        match self.resource_tags.as_deref() {
            Some(input) if !input.trim().is_empty() => parse_tags(input),
            _ => Ok(Vec::new()),
        }
    }
}

/// Exactly one of `--capability-iam` and `--instance-role` in EC2 mode.
fn validate_instance_role(request: &CreateRequest) -> Result<()> {
    let custom_role = request.flag_value(keys::INSTANCE_ROLE).is_some();
    match (request.capability_iam, custom_role) {
        (true, true) => Err(StratusError::validation(
            "Cannot specify custom role when '--capability-iam' flag is set",
        )),
        (false, false) => Err(StratusError::validation(
            "You must either specify a custom role with the '--instance-role' flag or set the '--capability-iam' flag",
        )),
        _ => Ok(()),
    }
}

impl ClusterOrchestrator {
    /// Register a cluster and deploy its stack.
    ///
    /// With `request.empty` set only the registry entry is created. With
    /// `request.force` an existing stack is deleted after the registry entry
    /// is written and before the new stack is created.
    #[instrument(skip(self, request), fields(cluster = %request.cluster, launch_mode = %request.launch_mode))]
    pub async fn create(&self, request: &CreateRequest) -> Result<CreateOutcome> {
        let started = Instant::now();
        let result = if request.empty {
            self.create_empty_cluster(request).await
        } else {
            self.create_cluster(request).await
        };
        finish(if request.empty { "create_empty" } else { "create" }, started, result)
    }

    async fn create_cluster(&self, request: &CreateRequest) -> Result<CreateOutcome> {
        if request.cluster.is_empty() {
            return Err(StratusError::ClusterNotSet);
        }

        let ec2 = request.launch_mode == LaunchMode::Ec2;
        if ec2 {
            validate_instance_role(request)?;
            if request.flag_value(keys::KEY_PAIR_NAME).is_none() {
                warn!("You will not be able to SSH into your EC2 instances without a key pair");
            }
        }
        parse_size(request.size.as_deref())?;
        let tags = request.tags()?;
        let region = if ec2 { Some(self.require_region()?.to_string()) } else { None };

        let instance_tags_enabled = ec2 && !tags.is_empty() && self.container_instance_tagging().await?;
        let mut params = self.cluster_parameters(request, instance_tags_enabled.then_some(tags.as_slice()))?;
        validate::check(&params, CLUSTER_CONSTRAINTS)?;

        let stack_name = self.stack_name(&request.cluster);
        let replace_stack = self.stack_exists(&stack_name).await?;
        if replace_stack && !request.force {
            return Err(StratusError::validation(format!(
                "A CloudFormation stack already exists for the cluster '{}'. Please specify '--force' to clean up your existing resources",
                request.cluster
            )));
        }

        if let Some(region) = region.as_deref() {
            let instance_type = instance::resolve_instance_type(&mut params);
            let supported = self.catalog.supported_instance_types(region).await?;
            if let Err(e) = instance::validate_instance_type(&instance_type, &supported, region) {
                if instance_type == DEFAULT_INSTANCE_TYPE {
                    warn!(
                        "Default instance type {} not supported in region {}. Override the default instance type with the '--instance-type' flag and provide a supported value",
                        instance_type, region
                    );
                }
                return Err(e);
            }
            instance::resolve_image(&mut params, self.catalog.as_ref()).await?;
        }
        params.validate()?;

        let registry_id = self.registry.create_cluster(&request.cluster, &tags).await?;
        info!("Created cluster {}", request.cluster);
        log_transition(&request.cluster, ClusterState::NonExistent, ClusterState::ActiveNoStack);

        if replace_stack {
            self.stacks.delete_stack(&stack_name).await?;
            info!("Waiting for your CloudFormation stack resources to be deleted...");
            self.wait_for(StackTransition::Delete, &stack_name).await?;
        }

        let body = template::render(&tags, &stack_name)?;
        let stack_id = self.stacks.create_stack(&body, &stack_name, true, &params, &tags).await?;
        info!("Waiting for your cluster resources to be created...");
        self.wait_for(StackTransition::Create, &stack_name).await?;
        log_transition(&request.cluster, ClusterState::ActiveNoStack, ClusterState::ActiveWithStack);

        Ok(CreateOutcome {
            cluster: request.cluster.clone(),
            registry_id,
            stack: Some((stack_name, stack_id)),
            replaced_stack: replace_stack,
        })
    }

    async fn create_empty_cluster(&self, request: &CreateRequest) -> Result<CreateOutcome> {
        if request.cluster.is_empty() {
            return Err(StratusError::ClusterNotSet);
        }

        for (flag, _) in request.given_flags() {
            warn!("Value for flag '--{}' will be ignored when creating an empty cluster", flag.flag);
        }
        if !request.user_data_files.is_empty() {
            warn!("Value for flag '--extra-user-data' will be ignored when creating an empty cluster");
        }
        if request.capability_iam {
            warn!("IAM capability will not be used when creating an empty cluster");
        }
        if request.force {
            warn!("Force flag will not be used when creating an empty cluster");
        }
        let tags = request.tags()?;

        let stack_name = self.stack_name(&request.cluster);
        if self.stack_exists(&stack_name).await? {
            return Err(StratusError::validation(format!(
                "A CloudFormation stack already exists for the cluster '{}'",
                request.cluster
            )));
        }

        let registry_id = self.registry.create_cluster(&request.cluster, &tags).await?;
        info!("Created cluster {}", request.cluster);
        log_transition(&request.cluster, ClusterState::NonExistent, ClusterState::ActiveNoStack);

        Ok(CreateOutcome {
            cluster: request.cluster.clone(),
            registry_id,
            stack: None,
            replaced_stack: false,
        })
    }

    /// Whether launched instances should carry the cluster's tags.
    async fn container_instance_tagging(&self) -> Result<bool> {
        let settings = self.registry.list_account_settings(SETTING_CONTAINER_INSTANCE_LONG_ARN).await?;
        let setting = settings.first().ok_or_else(|| {
            StratusError::remote(
                "registry",
                format!(
                    "received unexpected response from list account settings: no value for {}",
                    SETTING_CONTAINER_INSTANCE_LONG_ARN
                ),
            )
        })?;

        if setting.is_enabled() {
            warn!(
                "Enabling container instance tagging because {} is enabled for {}. If this is not your account default setting, your instances will fail to join your cluster",
                SETTING_CONTAINER_INSTANCE_LONG_ARN, setting.principal_arn
            );
            Ok(true)
        } else {
            warn!(
                "Disabling container instance tagging because {} is not enabled for {}. If this is not your account default setting, your instances will fail to join your cluster",
                SETTING_CONTAINER_INSTANCE_LONG_ARN, setting.principal_arn
            );
            Ok(false)
        }
    }

    /// Stack parameters for a new cluster. `instance_tags` is passed to the
    /// user-data builder when container-instance tagging is enabled.
    fn cluster_parameters(
        &self,
        request: &CreateRequest,
        instance_tags: Option<&[Tag]>,
    ) -> Result<StackParams> {
        let mut params = StackParams::new(REQUIRED_PARAMETERS);
        for (flag, value) in request.given_flags() {
            params.add(flag.key, value);
        }

        if request.launch_mode == LaunchMode::Ec2 || !request.user_data_files.is_empty() {
            let mut builder = (self.user_data)(request.cluster.as_str(), instance_tags);
            for file in &request.user_data_files {
                builder.add_file(file)?;
            }
            params.add(keys::USER_DATA, builder.build()?);
        }

        params.add(keys::CLUSTER, request.cluster.as_str());
        if request.no_public_ip {
            params.add(keys::ASSOCIATE_PUBLIC_IP_ADDRESS, "false");
        }
        if request.imds_v2 {
            params.add(keys::IS_IMDS_V2, "true");
        }
        if request.launch_mode == LaunchMode::Fargate {
            params.add(keys::IS_FARGATE, "true");
        }
        Ok(params)
    }
}
