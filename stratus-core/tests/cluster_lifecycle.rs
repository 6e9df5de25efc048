//! Integration tests for cluster lifecycle operations.
//!
//! These tests drive the orchestrator against a recording mock that
//! implements all three service contracts and assert:
//! - the exact order of remote calls
//! - the parameters and tags each call receives
//! - that local validation failures make no remote call at all

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use stratus_core::{
    clients::{AccountSetting, ImageCatalog, ImageMetadata, StackResource, StackService, WorkloadRegistry},
    error::{Result, StratusError},
    lifecycle::{AutoConfirm, ClusterOrchestrator, ClusterState, CreateRequest, DeleteRequest, ScaleRequest},
    params::{keys, StackParameter, StackParams},
    tags::Tag,
    userdata::{UserDataBuilder, UserDataFactory},
    Config, LaunchMode,
};

const REGION: &str = "us-west-1";
const STACK: &str = "stratus-setup-prod";

/// Mock services (no cloud account needed).
#[derive(Default)]
struct MockServices {
    calls: Mutex<Vec<String>>,
    stack_exists: bool,
    cluster_active: bool,
    existing_parameters: Vec<StackParameter>,
    supported_types: Vec<String>,
    account_settings: Vec<AccountSetting>,
    fail_create_wait: bool,
    submitted_params: Mutex<Option<StackParams>>,
    registry_tags: Mutex<Option<Vec<Tag>>>,
    stack_tags: Mutex<Option<Vec<Tag>>>,
    template: Mutex<Option<String>>,
}

impl MockServices {
    fn new() -> Self {
        Self { supported_types: vec!["t2.micro".into(), "m5.large".into()], ..Self::default() }
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn submitted(&self) -> StackParams {
        self.submitted_params.lock().unwrap().clone().expect("no parameters submitted")
    }
}

#[async_trait]
impl WorkloadRegistry for MockServices {
    async fn create_cluster(&self, name: &str, tags: &[Tag]) -> Result<String> {
        self.record("create_cluster");
        *self.registry_tags.lock().unwrap() = Some(tags.to_vec());
        Ok(format!("arn:mock:cluster/{}", name))
    }

    async fn delete_cluster(&self, name: &str) -> Result<String> {
        self.record("delete_cluster");
        Ok(format!("arn:mock:cluster/{}", name))
    }

    async fn is_active_cluster(&self, _name: &str) -> Result<bool> {
        self.record("is_active_cluster");
        Ok(self.cluster_active)
    }

    async fn list_account_settings(&self, _setting: &str) -> Result<Vec<AccountSetting>> {
        self.record("list_account_settings");
        Ok(self.account_settings.clone())
    }
}

#[async_trait]
impl StackService for MockServices {
    async fn validate_stack_exists(&self, stack: &str) -> Result<()> {
        self.record("validate_stack_exists");
        if self.stack_exists {
            Ok(())
        } else {
            Err(StratusError::StackNotFound { stack: stack.to_string() })
        }
    }

    async fn create_stack(
        &self,
        template: &str,
        stack: &str,
        capability_iam: bool,
        params: &StackParams,
        tags: &[Tag],
    ) -> Result<String> {
        self.record("create_stack");
        assert_eq!(stack, STACK);
        assert!(capability_iam, "stack creation must acknowledge IAM capability");
        *self.submitted_params.lock().unwrap() = Some(params.clone());
        *self.stack_tags.lock().unwrap() = Some(tags.to_vec());
        *self.template.lock().unwrap() = Some(template.to_string());
        Ok(format!("arn:mock:stack/{}", stack))
    }

    async fn update_stack(&self, stack: &str, params: &StackParams) -> Result<String> {
        self.record("update_stack");
        *self.submitted_params.lock().unwrap() = Some(params.clone());
        Ok(format!("arn:mock:stack/{}", stack))
    }

    async fn delete_stack(&self, _stack: &str) -> Result<()> {
        self.record("delete_stack");
        Ok(())
    }

    async fn stack_parameters(&self, stack: &str) -> Result<Vec<StackParameter>> {
        self.record("stack_parameters");
        if self.existing_parameters.is_empty() {
            return Err(StratusError::StackNotFound { stack: stack.to_string() });
        }
        Ok(self.existing_parameters.clone())
    }

    async fn wait_until_create_complete(&self, _stack: &str) -> Result<()> {
        self.record("wait_until_create_complete");
        if self.fail_create_wait {
            return Err(StratusError::remote("stack", "ResourceNotReady: failed waiting for successful resource state"));
        }
        Ok(())
    }

    async fn wait_until_update_complete(&self, _stack: &str) -> Result<()> {
        self.record("wait_until_update_complete");
        Ok(())
    }

    async fn wait_until_delete_complete(&self, _stack: &str) -> Result<()> {
        self.record("wait_until_delete_complete");
        Ok(())
    }

    async fn describe_network_resources(&self, _stack: &str) -> Result<Vec<StackResource>> {
        self.record("describe_network_resources");
        Ok(Vec::new())
    }
}

#[async_trait]
impl ImageCatalog for MockServices {
    async fn supported_instance_types(&self, region: &str) -> Result<Vec<String>> {
        self.record("supported_instance_types");
        assert_eq!(region, REGION);
        Ok(self.supported_types.clone())
    }

    async fn recommended_image(&self, _instance_type: &str) -> Result<ImageMetadata> {
        self.record("recommended_image");
        Ok(ImageMetadata {
            image_id: "ami-recommended".into(),
            os_name: "Amazon Linux 2".into(),
            agent_version: "1.80.0".into(),
            runtime_version: "Docker version 20.10".into(),
        })
    }
}

/// What the user-data builders were asked to do.
#[derive(Default)]
struct UserDataLog {
    tags: Vec<Option<Vec<Tag>>>,
    files: Vec<PathBuf>,
}

struct RecordingUserData {
    log: Arc<Mutex<UserDataLog>>,
}

impl UserDataBuilder for RecordingUserData {
    fn add_file(&mut self, path: &Path) -> Result<()> {
        self.log.lock().unwrap().files.push(path.to_path_buf());
        Ok(())
    }

    fn build(&self) -> Result<String> {
        Ok("mock-user-data".to_string())
    }
}

fn recording_factory(log: Arc<Mutex<UserDataLog>>) -> UserDataFactory {
    Arc::new(move |_cluster: &str, tags: Option<&[Tag]>| -> Box<dyn UserDataBuilder> {
        log.lock().unwrap().tags.push(tags.map(<[Tag]>::to_vec));
        Box::new(RecordingUserData { log: log.clone() })
    })
}

struct Harness {
    services: Arc<MockServices>,
    user_data: Arc<Mutex<UserDataLog>>,
    orchestrator: ClusterOrchestrator,
}

fn harness_with(services: MockServices, confirm: bool) -> Harness {
    let services = Arc::new(services);
    let user_data = Arc::new(Mutex::new(UserDataLog::default()));
    let orchestrator = ClusterOrchestrator::new(services.clone(), services.clone(), services.clone())
        .with_region(REGION)
        .with_user_data_factory(recording_factory(user_data.clone()))
        .with_confirm(Arc::new(AutoConfirm(confirm)));
    Harness { services, user_data, orchestrator }
}

fn harness(services: MockServices) -> Harness {
    harness_with(services, true)
}

fn ec2_request() -> CreateRequest {
    CreateRequest { capability_iam: true, key_pair: Some("kp".into()), ..CreateRequest::new("prod") }
}

fn fargate_request() -> CreateRequest {
    CreateRequest { launch_mode: LaunchMode::Fargate, ..CreateRequest::new("prod") }
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_create_ec2_cluster() {
    let h = harness(MockServices::new());

    let outcome = h.orchestrator.create(&ec2_request()).await.unwrap();

    assert_eq!(
        h.services.calls(),
        vec![
            "validate_stack_exists",
            "supported_instance_types",
            "recommended_image",
            "create_cluster",
            "create_stack",
            "wait_until_create_complete",
        ]
    );
    assert_eq!(outcome.registry_id, "arn:mock:cluster/prod");
    assert_eq!(outcome.stack, Some((STACK.to_string(), format!("arn:mock:stack/{}", STACK))));
    assert!(!outcome.replaced_stack);

    let params = h.services.submitted();
    assert_eq!(params.get(keys::CLUSTER).unwrap(), "prod");
    assert_eq!(params.get(keys::KEY_PAIR_NAME).unwrap(), "kp");
    assert_eq!(params.get(keys::INSTANCE_TYPE).unwrap(), "t2.micro");
    assert_eq!(params.get(keys::AMI_ID).unwrap(), "ami-recommended");
    assert_eq!(params.get(keys::USER_DATA).unwrap(), "mock-user-data");
    assert!(params.get(keys::IS_FARGATE).is_err());
    assert!(params.get(keys::IS_IMDS_V2).is_err());

    let template = h.services.template.lock().unwrap().clone().unwrap();
    assert!(template.contains("\"EcsInstanceAsg\""));
}

#[tokio::test]
async fn test_create_passes_flag_values_and_switches() {
    let h = harness(MockServices::new());
    let request = CreateRequest {
        instance_type: Some("m5.large".into()),
        image_id: Some("ami-custom".into()),
        size: Some("4".into()),
        vpc_id: Some("vpc-12345678".into()),
        subnet_ids: Some("subnet-1,subnet-2".into()),
        source_cidr: Some(String::new()),
        no_public_ip: true,
        imds_v2: true,
        ..ec2_request()
    };

    h.orchestrator.create(&request).await.unwrap();

    // A supplied image skips the recommendation lookup.
    assert!(!h.services.calls().contains(&"recommended_image".to_string()));
    let params = h.services.submitted();
    assert_eq!(params.get(keys::INSTANCE_TYPE).unwrap(), "m5.large");
    assert_eq!(params.get(keys::AMI_ID).unwrap(), "ami-custom");
    assert_eq!(params.get(keys::ASG_MAX_SIZE).unwrap(), "4");
    assert_eq!(params.get(keys::VPC_ID).unwrap(), "vpc-12345678");
    assert_eq!(params.get(keys::ASSOCIATE_PUBLIC_IP_ADDRESS).unwrap(), "false");
    assert_eq!(params.get(keys::IS_IMDS_V2).unwrap(), "true");
    assert!(params.get(keys::SOURCE_CIDR).is_err(), "empty flag values are not submitted");
}

#[tokio::test]
async fn test_create_fargate_cluster_has_no_user_data() {
    let h = harness(MockServices::new());

    h.orchestrator.create(&fargate_request()).await.unwrap();

    assert_eq!(
        h.services.calls(),
        vec!["validate_stack_exists", "create_cluster", "create_stack", "wait_until_create_complete"]
    );
    let params = h.services.submitted();
    assert_eq!(params.get(keys::IS_FARGATE).unwrap(), "true");
    assert!(params.get(keys::USER_DATA).is_err());
    assert!(h.user_data.lock().unwrap().tags.is_empty());
}

#[tokio::test]
async fn test_create_fargate_with_user_data_fails_before_remote_calls() {
    let h = harness(MockServices::new());
    let request = CreateRequest { user_data_files: vec![PathBuf::from("extra.sh")], ..fargate_request() };

    let err = h.orchestrator.create(&request).await.unwrap_err();

    assert!(matches!(err, StratusError::Validation { .. }));
    assert!(err.to_string().contains("EC2 launch type"));
    assert!(h.services.calls().is_empty());
}

#[tokio::test]
async fn test_create_vpc_and_azs_are_exclusive() {
    let h = harness(MockServices::new());
    let request = CreateRequest {
        vpc_id: Some("vpc-12345678".into()),
        subnet_ids: Some("subnet-1,subnet-2".into()),
        vpc_azs: Some("us-west-1a,us-west-1b".into()),
        ..ec2_request()
    };

    let err = h.orchestrator.create(&request).await.unwrap_err();

    assert!(err.to_string().contains("'--vpc' or '--azs'"));
    assert!(h.services.calls().is_empty());
}

#[tokio::test]
async fn test_create_requires_subnets_with_vpc() {
    let h = harness(MockServices::new());
    let request = CreateRequest { vpc_id: Some("vpc-12345678".into()), ..ec2_request() };

    let err = h.orchestrator.create(&request).await.unwrap_err();

    assert!(matches!(err, StratusError::Validation { .. }));
    assert!(h.services.calls().is_empty());
}

#[tokio::test]
async fn test_create_requires_exactly_one_role_source() {
    let h = harness(MockServices::new());

    let neither = CreateRequest { capability_iam: false, ..ec2_request() };
    let err = h.orchestrator.create(&neither).await.unwrap_err();
    assert!(err.to_string().contains("--instance-role"));

    let both = CreateRequest { instance_role: Some("myRole".into()), ..ec2_request() };
    let err = h.orchestrator.create(&both).await.unwrap_err();
    assert!(err.to_string().contains("Cannot specify custom role"));

    assert!(h.services.calls().is_empty());
}

#[tokio::test]
async fn test_create_without_cluster_name() {
    let h = harness(MockServices::new());
    let request = CreateRequest { cluster: String::new(), ..ec2_request() };

    assert!(matches!(h.orchestrator.create(&request).await, Err(StratusError::ClusterNotSet)));
    assert!(h.services.calls().is_empty());
}

#[tokio::test]
async fn test_create_with_existing_stack_requires_force() {
    let h = harness(MockServices { stack_exists: true, ..MockServices::new() });

    let err = h.orchestrator.create(&ec2_request()).await.unwrap_err();

    assert!(err.to_string().contains("--force"));
    assert_eq!(h.services.calls(), vec!["validate_stack_exists"]);
}

#[tokio::test]
async fn test_create_force_replaces_stack_after_registry_entry() {
    let h = harness(MockServices { stack_exists: true, ..MockServices::new() });
    let request = CreateRequest { force: true, ..ec2_request() };

    let outcome = h.orchestrator.create(&request).await.unwrap();

    assert!(outcome.replaced_stack);
    assert_eq!(
        h.services.calls(),
        vec![
            "validate_stack_exists",
            "supported_instance_types",
            "recommended_image",
            "create_cluster",
            "delete_stack",
            "wait_until_delete_complete",
            "create_stack",
            "wait_until_create_complete",
        ]
    );
}

#[tokio::test]
async fn test_create_unsupported_instance_type() {
    let h = harness(MockServices::new());
    let request = CreateRequest { instance_type: Some("a1.medium".into()), ..ec2_request() };

    let err = h.orchestrator.create(&request).await.unwrap_err();

    assert!(matches!(err, StratusError::UnsupportedInstanceType { .. }));
    assert!(err.to_string().contains("a1.medium"));
    assert!(err.to_string().contains(REGION));
    assert_eq!(h.services.calls(), vec!["validate_stack_exists", "supported_instance_types"]);
}

#[tokio::test]
async fn test_create_default_instance_type_unsupported() {
    let h = harness(MockServices { supported_types: vec!["m5.large".into()], ..MockServices::new() });

    let err = h.orchestrator.create(&ec2_request()).await.unwrap_err();

    assert!(err.to_string().contains("t2.micro"));
    assert!(!h.services.calls().contains(&"create_cluster".to_string()));
}

#[tokio::test]
async fn test_create_with_tags_and_instance_tagging_enabled() {
    let services = MockServices {
        account_settings: vec![AccountSetting {
            name: "containerInstanceLongArnFormat".into(),
            value: "enabled".into(),
            principal_arn: "arn:mock:iam::user/me".into(),
        }],
        ..MockServices::new()
    };
    let h = harness(services);
    let request = CreateRequest { resource_tags: Some("doctor=11,companion=amy".into()), ..ec2_request() };

    h.orchestrator.create(&request).await.unwrap();

    let expected = vec![Tag::new("doctor", "11"), Tag::new("companion", "amy")];
    assert_eq!(h.services.calls()[0], "list_account_settings");
    assert_eq!(h.services.registry_tags.lock().unwrap().clone(), Some(expected.clone()));
    assert_eq!(h.services.stack_tags.lock().unwrap().clone(), Some(expected.clone()));
    assert_eq!(h.user_data.lock().unwrap().tags, vec![Some(expected)]);

    let template = h.services.template.lock().unwrap().clone().unwrap();
    assert!(template.contains("\"doctor\""));
}

#[tokio::test]
async fn test_create_with_tags_and_instance_tagging_disabled() {
    let services = MockServices {
        account_settings: vec![AccountSetting {
            name: "containerInstanceLongArnFormat".into(),
            value: "disabled".into(),
            principal_arn: "arn:mock:iam::user/me".into(),
        }],
        ..MockServices::new()
    };
    let h = harness(services);
    let request = CreateRequest { resource_tags: Some("team=infra".into()), ..ec2_request() };

    h.orchestrator.create(&request).await.unwrap();

    assert_eq!(h.user_data.lock().unwrap().tags, vec![None]);
    assert_eq!(h.services.registry_tags.lock().unwrap().clone(), Some(vec![Tag::new("team", "infra")]));
}

#[tokio::test]
async fn test_create_with_empty_account_settings_response() {
    let h = harness(MockServices::new());
    let request = CreateRequest { resource_tags: Some("team=infra".into()), ..ec2_request() };

    let err = h.orchestrator.create(&request).await.unwrap_err();

    assert!(matches!(err, StratusError::Remote { .. }));
    assert_eq!(h.services.calls(), vec!["list_account_settings"]);
}

#[tokio::test]
async fn test_create_with_malformed_tags() {
    let h = harness(MockServices::new());
    let request = CreateRequest { resource_tags: Some("novalue".into()), ..ec2_request() };

    assert!(matches!(h.orchestrator.create(&request).await, Err(StratusError::Validation { .. })));
    assert!(h.services.calls().is_empty());
}

#[tokio::test]
async fn test_create_user_data_files_go_to_builder() {
    let h = harness(MockServices::new());
    let files = vec![PathBuf::from("a.sh"), PathBuf::from("b.yml")];
    let request = CreateRequest { user_data_files: files.clone(), ..ec2_request() };

    h.orchestrator.create(&request).await.unwrap();

    assert_eq!(h.user_data.lock().unwrap().files, files);
}

#[tokio::test]
async fn test_create_wait_failure_leaves_registry_entry() {
    let h = harness(MockServices { fail_create_wait: true, ..MockServices::new() });

    let err = h.orchestrator.create(&ec2_request()).await.unwrap_err();

    assert!(err.to_string().contains("ResourceNotReady"));
    let calls = h.services.calls();
    assert!(calls.contains(&"create_cluster".to_string()));
    assert!(!calls.contains(&"delete_cluster".to_string()));
}

#[tokio::test]
async fn test_create_requires_region_for_ec2() {
    let services = Arc::new(MockServices::new());
    let orchestrator = ClusterOrchestrator::new(services.clone(), services.clone(), services.clone());

    let err = orchestrator.create(&ec2_request()).await.unwrap_err();

    assert!(matches!(err, StratusError::InvalidConfig { .. }));
    assert!(services.calls().is_empty());
}

// =============================================================================
// Create empty
// =============================================================================

#[tokio::test]
async fn test_create_empty_cluster() {
    let h = harness(MockServices::new());
    let request = CreateRequest {
        empty: true,
        instance_type: Some("m5.large".into()),
        resource_tags: Some("team=infra".into()),
        ..ec2_request()
    };

    let outcome = h.orchestrator.create(&request).await.unwrap();

    assert_eq!(h.services.calls(), vec!["validate_stack_exists", "create_cluster"]);
    assert_eq!(outcome.stack, None);
    assert_eq!(h.services.registry_tags.lock().unwrap().clone(), Some(vec![Tag::new("team", "infra")]));
}

#[tokio::test]
async fn test_create_empty_with_existing_stack() {
    let h = harness(MockServices { stack_exists: true, ..MockServices::new() });
    let request = CreateRequest { empty: true, ..CreateRequest::new("prod") };

    let err = h.orchestrator.create(&request).await.unwrap_err();

    assert!(matches!(err, StratusError::Validation { .. }));
    assert_eq!(h.services.calls(), vec!["validate_stack_exists"]);
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_cluster_with_stack() {
    let h = harness(MockServices { cluster_active: true, stack_exists: true, ..MockServices::new() });
    let request = DeleteRequest { cluster: "prod".into(), force: true };

    let outcome = h.orchestrator.delete(&request).await.unwrap();

    assert!(outcome.stack_deleted);
    assert_eq!(
        h.services.calls(),
        vec![
            "is_active_cluster",
            "validate_stack_exists",
            "delete_stack",
            "wait_until_delete_complete",
            "delete_cluster",
        ]
    );
}

#[tokio::test]
async fn test_delete_cluster_without_stack() {
    let h = harness(MockServices { cluster_active: true, ..MockServices::new() });
    let request = DeleteRequest { cluster: "prod".into(), force: true };

    let outcome = h.orchestrator.delete(&request).await.unwrap();

    assert!(!outcome.stack_deleted);
    assert_eq!(h.services.calls(), vec!["is_active_cluster", "validate_stack_exists", "delete_cluster"]);
}

#[tokio::test]
async fn test_delete_confirmed_at_prompt() {
    let h = harness_with(MockServices { cluster_active: true, ..MockServices::new() }, true);
    let request = DeleteRequest { cluster: "prod".into(), force: false };

    h.orchestrator.delete(&request).await.unwrap();
    assert!(h.services.calls().contains(&"delete_cluster".to_string()));
}

#[tokio::test]
async fn test_delete_declined_at_prompt() {
    let h = harness_with(MockServices { cluster_active: true, ..MockServices::new() }, false);
    let request = DeleteRequest { cluster: "prod".into(), force: false };

    let err = h.orchestrator.delete(&request).await.unwrap_err();

    assert!(matches!(err, StratusError::Aborted { .. }));
    assert!(err.to_string().contains("--force"));
    assert!(h.services.calls().is_empty());
}

#[tokio::test]
async fn test_delete_inactive_cluster() {
    let h = harness(MockServices::new());
    let request = DeleteRequest { cluster: "prod".into(), force: true };

    let err = h.orchestrator.delete(&request).await.unwrap_err();

    assert!(matches!(err, StratusError::ClusterInactive { .. }));
    assert_eq!(h.services.calls(), vec!["is_active_cluster"]);
}

// =============================================================================
// Scale
// =============================================================================

fn deployed_parameters() -> Vec<StackParameter> {
    vec![StackParameter::new("SomeParam", "x")]
}

#[tokio::test]
async fn test_scale_cluster() {
    let h = harness(MockServices {
        cluster_active: true,
        existing_parameters: deployed_parameters(),
        ..MockServices::new()
    });
    let request = ScaleRequest { cluster: "prod".into(), size: Some("3".into()), capability_iam: true };

    let outcome = h.orchestrator.scale(&request).await.unwrap();

    assert_eq!(outcome.size, 3);
    assert_eq!(
        h.services.calls(),
        vec!["is_active_cluster", "stack_parameters", "update_stack", "wait_until_update_complete"]
    );

    let params = h.services.submitted();
    assert_eq!(params.get("SomeParam").unwrap(), "x");
    assert!(params.parameter("SomeParam").unwrap().use_previous_value);
    assert_eq!(params.get(keys::ASG_MAX_SIZE).unwrap(), "3");
    assert!(!params.parameter(keys::ASG_MAX_SIZE).unwrap().use_previous_value);
}

#[tokio::test]
async fn test_scale_keeps_cluster_parameter_the_stack_did_not_report() {
    let h = harness(MockServices {
        cluster_active: true,
        existing_parameters: deployed_parameters(),
        ..MockServices::new()
    });
    let request = ScaleRequest { cluster: "prod".into(), size: Some("3".into()), capability_iam: true };

    h.orchestrator.scale(&request).await.unwrap();

    let params = h.services.submitted();
    let cluster = params.parameter(keys::CLUSTER).unwrap();
    assert_eq!(cluster.value, None);
    assert!(cluster.use_previous_value);
    assert!(params.validate().is_ok());
    assert_eq!(params.len(), 3);
}

#[tokio::test]
async fn test_scale_with_deployed_cluster_parameter() {
    let h = harness(MockServices {
        cluster_active: true,
        existing_parameters: vec![StackParameter::new(keys::CLUSTER, "prod"), StackParameter::new("SomeParam", "x")],
        ..MockServices::new()
    });
    let request = ScaleRequest { cluster: "prod".into(), size: Some("5".into()), capability_iam: true };

    h.orchestrator.scale(&request).await.unwrap();

    let params = h.services.submitted();
    assert_eq!(params.get(keys::CLUSTER).unwrap(), "prod");
    assert!(params.parameter(keys::CLUSTER).unwrap().use_previous_value);
    assert_eq!(params.get(keys::ASG_MAX_SIZE).unwrap(), "5");
}

#[tokio::test]
async fn test_scale_requires_capability_iam() {
    let h = harness(MockServices { cluster_active: true, ..MockServices::new() });
    let request = ScaleRequest { cluster: "prod".into(), size: Some("3".into()), capability_iam: false };

    let err = h.orchestrator.scale(&request).await.unwrap_err();

    assert!(err.to_string().contains("--capability-iam"));
    assert!(h.services.calls().is_empty());
}

#[tokio::test]
async fn test_scale_requires_size() {
    let h = harness(MockServices { cluster_active: true, ..MockServices::new() });

    let missing = ScaleRequest { cluster: "prod".into(), size: None, capability_iam: true };
    let err = h.orchestrator.scale(&missing).await.unwrap_err();
    assert!(err.to_string().contains("--size"));

    let invalid = ScaleRequest { cluster: "prod".into(), size: Some("lots".into()), capability_iam: true };
    assert!(matches!(h.orchestrator.scale(&invalid).await, Err(StratusError::Validation { .. })));

    assert!(h.services.calls().is_empty());
}

#[tokio::test]
async fn test_scale_inactive_cluster() {
    let h = harness(MockServices::new());
    let request = ScaleRequest { cluster: "prod".into(), size: Some("3".into()), capability_iam: true };

    let err = h.orchestrator.scale(&request).await.unwrap_err();

    assert!(matches!(err, StratusError::ClusterInactive { .. }));
    assert_eq!(h.services.calls(), vec!["is_active_cluster"]);
}

#[tokio::test]
async fn test_scale_without_stack() {
    let h = harness(MockServices { cluster_active: true, ..MockServices::new() });
    let request = ScaleRequest { cluster: "prod".into(), size: Some("3".into()), capability_iam: true };

    let err = h.orchestrator.scale(&request).await.unwrap_err();

    assert!(matches!(err, StratusError::StackNotFound { .. }));
    assert_eq!(h.services.calls(), vec!["is_active_cluster", "stack_parameters"]);
}

// =============================================================================
// Status
// =============================================================================

#[tokio::test]
async fn test_status() {
    let h = harness(MockServices::new());
    assert_eq!(h.orchestrator.status("prod").await.unwrap(), ClusterState::NonExistent);

    let h = harness(MockServices { cluster_active: true, ..MockServices::new() });
    assert_eq!(h.orchestrator.status("prod").await.unwrap(), ClusterState::ActiveNoStack);

    let h = harness(MockServices { cluster_active: true, stack_exists: true, ..MockServices::new() });
    assert_eq!(h.orchestrator.status("prod").await.unwrap(), ClusterState::ActiveWithStack);

    assert!(matches!(h.orchestrator.status("").await, Err(StratusError::ClusterNotSet)));
}

#[tokio::test]
async fn test_stack_name_and_region_follow_config() {
    let config = Config {
        region: Some("eu-west-1".into()),
        stack_name_prefix: "custom-".into(),
        ..Config::default()
    };
    let services = Arc::new(MockServices::new());
    let user_data = Arc::new(Mutex::new(UserDataLog::default()));
    let orchestrator = ClusterOrchestrator::new(services.clone(), services.clone(), services.clone())
        .with_config(&config)
        .with_user_data_factory(recording_factory(user_data));

    assert_eq!(orchestrator.stack_name("prod"), config.stack_name("prod"));
    assert_eq!(orchestrator.stack_name("prod"), "custom-prod");

    let outcome = orchestrator.create(&ec2_request()).await.unwrap();
    let (stack, _) = outcome.stack.unwrap();
    assert_eq!(stack, "custom-prod");
}
