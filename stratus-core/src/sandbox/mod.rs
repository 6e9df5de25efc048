//! Local provider.
//!
//! [`LocalProvider`] implements all three remote contracts against an
//! in-process state, optionally persisted as JSON. It lets the CLI and the
//! integration tests run full lifecycles without cloud credentials.
//!
//! Stacks move through the usual `*_IN_PROGRESS` to `*_COMPLETE` states; a
//! stack settles on the first poll made by one of the `wait_until_*`
//! methods. Network resources are derived by evaluating the stored
//! template's conditions against the stack's parameters.

mod conditions;

use crate::clients::{
    AccountSetting, ImageCatalog, ImageMetadata, StackResource, StackService, StackStatus,
    WorkloadRegistry, SETTING_CONTAINER_INSTANCE_LONG_ARN,
};
use crate::error::{Result, StratusError};
use crate::params::{StackParameter, StackParams};
use crate::tags::Tag;
use crate::template::{ClusterTemplate, NETWORK_LOGICAL_IDS};
use async_trait::async_trait;
use conditions::Scope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

const ACCOUNT_ID: &str = "000000000000";
const DEFAULT_REGION: &str = "local-1";

/// Instance types offered in every local region.
pub const LOCAL_INSTANCE_TYPES: &[&str] =
    &["t2.micro", "t2.small", "t3.micro", "t3.medium", "m5.large", "c5.large", "a1.large", "m6g.large"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum ClusterStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalCluster {
    arn: String,
    status: ClusterStatus,
    tags: Vec<Tag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalStack {
    id: String,
    status: StackStatus,
    template: String,
    parameters: Vec<StackParameter>,
    tags: Vec<Tag>,
    resources: Vec<StackResource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LocalState {
    clusters: BTreeMap<String, LocalCluster>,
    stacks: BTreeMap<String, LocalStack>,
    account_settings: BTreeMap<String, String>,
    next_id: u64,
}

impl LocalState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process stand-in for the registry, stack service and image catalog.
pub struct LocalProvider {
    state: Mutex<LocalState>,
    path: Option<PathBuf>,
    region: String,
    poll_interval: Duration,
}

impl LocalProvider {
    /// Provider whose state lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(LocalState::default()),
            path: None,
            region: DEFAULT_REGION.to_string(),
            poll_interval: Duration::from_millis(10),
        }
    }

    /// Provider backed by a JSON state file. A missing file starts empty.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| StratusError::InvalidConfig {
                reason: format!("Corrupt local state {}: {}", path.display(), e),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LocalState::default(),
            Err(e) => return Err(StratusError::Io { path, source: e }),
        };
        Ok(Self { state: Mutex::new(state), path: Some(path), ..Self::in_memory() })
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override an account setting value (`enabled` or `disabled`).
    pub async fn set_account_setting(&self, name: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.account_settings.insert(name.to_string(), value.to_string());
        self.persist(&state).await
    }

    /// Current status of a stack, if it exists.
    pub async fn stack_status(&self, stack: &str) -> Option<StackStatus> {
        self.state.lock().await.stacks.get(stack).map(|s| s.status)
    }

    /// Tags recorded on an active cluster.
    pub async fn cluster_tags(&self, name: &str) -> Option<Vec<Tag>> {
        let state = self.state.lock().await;
        state.clusters.get(name).filter(|c| c.status == ClusterStatus::Active).map(|c| c.tags.clone())
    }

    async fn persist(&self, state: &LocalState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StratusError::Io { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(state).map_err(StratusError::internal)?;
        tokio::fs::write(path, content).await.map_err(|e| StratusError::Io { path: path.clone(), source: e })
    }

    fn cluster_arn(&self, name: &str) -> String {
        format!("arn:local:ecs:{}:{}:cluster/{}", self.region, ACCOUNT_ID, name)
    }

    fn stack_id(&self, name: &str, id: u64) -> String {
        format!("arn:local:cloudformation:{}:{}:stack/{}/{:012x}", self.region, ACCOUNT_ID, name, id)
    }

    /// Resolve which network resources the stack's parameters create.
    fn network_resources(&self, state: &mut LocalState, stack_name: &str) -> Result<Vec<StackResource>> {
        let Some(stack) = state.stacks.get(stack_name) else {
            return Ok(Vec::new());
        };
        let template = ClusterTemplate::parse(&stack.template)?;
        let given = stack
            .parameters
            .iter()
            .filter_map(|p| p.value.as_deref().map(|v| (p.key.as_str(), v)));
        let scope = Scope::new(&template, given, &self.region, stack_name);

        let mut wanted = Vec::new();
        for logical_id in NETWORK_LOGICAL_IDS {
            let created = match template.resource_condition(logical_id) {
                Some(condition) => scope.condition(condition)?,
                None => template.resource(logical_id).is_some(),
            };
            if created {
                let resource_type = template.resource_type(logical_id).unwrap_or_default().to_string();
                wanted.push((logical_id.to_string(), resource_type));
            }
        }

        Ok(wanted
            .into_iter()
            .map(|(logical_id, resource_type)| StackResource {
                physical_id: format!("{}-{:017x}", physical_prefix(&resource_type), state.next_id()),
                logical_id,
                resource_type,
            })
            .collect())
    }

    /// Poll until `stack` leaves its in-progress state, settling it on the
    /// first poll. Fails if the terminal state is not `expected`.
    async fn wait_for(&self, stack: &str, expected: StackStatus) -> Result<()> {
        loop {
            {
                let mut state = self.state.lock().await;
                let status = match state.stacks.get(stack) {
                    Some(s) => s.status,
                    None if expected == StackStatus::DeleteComplete => return Ok(()),
                    None => return Err(StratusError::StackNotFound { stack: stack.to_string() }),
                };

                if status.is_terminal() {
                    if status != expected {
                        return Err(StratusError::remote(
                            "stack",
                            format!("Stack {} reached {} while waiting for {}", stack, status, expected),
                        ));
                    }
                    if status == StackStatus::DeleteComplete {
                        state.stacks.remove(stack);
                        self.persist(&state).await?;
                    }
                    return Ok(());
                }

                let settled = settle(status);
                if settled != StackStatus::DeleteComplete {
                    let resources = self.network_resources(&mut state, stack)?;
                    if let Some(s) = state.stacks.get_mut(stack) {
                        s.resources = resources;
                    }
                }
                if let Some(s) = state.stacks.get_mut(stack) {
                    debug!(stack, from = %s.status, to = %settled, "Local stack settled");
                    s.status = settled;
                }
                self.persist(&state).await?;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn settle(status: StackStatus) -> StackStatus {
    match status {
        StackStatus::CreateInProgress => StackStatus::CreateComplete,
        StackStatus::UpdateInProgress => StackStatus::UpdateComplete,
        StackStatus::DeleteInProgress => StackStatus::DeleteComplete,
        other => other,
    }
}

fn physical_prefix(resource_type: &str) -> &'static str {
    match resource_type {
        "AWS::EC2::VPC" => "vpc",
        "AWS::EC2::Subnet" => "subnet",
        "AWS::EC2::SecurityGroup" => "sg",
        _ => "res",
    }
}

/// Reject parameters the template does not declare.
fn check_declared(template: &ClusterTemplate, params: &StackParams) -> Result<()> {
    let declared = template.parameter_names();
    let unknown: Vec<&str> = params.iter().map(|p| p.key.as_str()).filter(|k| !declared.contains(k)).collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(StratusError::remote("stack", format!("Parameters: {:?} do not exist in the template", unknown)))
    }
}

#[async_trait]
impl WorkloadRegistry for LocalProvider {
    #[instrument(skip(self, tags))]
    async fn create_cluster(&self, name: &str, tags: &[Tag]) -> Result<String> {
        let mut state = self.state.lock().await;
        let arn = self.cluster_arn(name);
        state.clusters.insert(
            name.to_string(),
            LocalCluster { arn: arn.clone(), status: ClusterStatus::Active, tags: tags.to_vec() },
        );
        self.persist(&state).await?;
        Ok(arn)
    }

    #[instrument(skip(self))]
    async fn delete_cluster(&self, name: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        let cluster = state
            .clusters
            .get_mut(name)
            .filter(|c| c.status == ClusterStatus::Active)
            .ok_or_else(|| StratusError::remote("registry", "ClusterNotFoundException: Cluster not found."))?;
        cluster.status = ClusterStatus::Inactive;
        let arn = cluster.arn.clone();
        self.persist(&state).await?;
        Ok(arn)
    }

    async fn is_active_cluster(&self, name: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.clusters.get(name).is_some_and(|c| c.status == ClusterStatus::Active))
    }

    async fn list_account_settings(&self, setting: &str) -> Result<Vec<AccountSetting>> {
        let state = self.state.lock().await;
        let value = state.account_settings.get(setting).map(String::as_str).or(
            (setting == SETTING_CONTAINER_INSTANCE_LONG_ARN).then_some("enabled"),
        );
        Ok(value
            .map(|value| AccountSetting {
                name: setting.to_string(),
                value: value.to_string(),
                principal_arn: format!("arn:local:iam::{}:root", ACCOUNT_ID),
            })
            .into_iter()
            .collect())
    }
}

#[async_trait]
impl StackService for LocalProvider {
    async fn validate_stack_exists(&self, stack: &str) -> Result<()> {
        let state = self.state.lock().await;
        match state.stacks.get(stack) {
            Some(s) if s.status != StackStatus::DeleteComplete => Ok(()),
            _ => Err(StratusError::StackNotFound { stack: stack.to_string() }),
        }
    }

    #[instrument(skip(self, template, params, tags))]
    async fn create_stack(
        &self,
        template: &str,
        stack: &str,
        capability_iam: bool,
        params: &StackParams,
        tags: &[Tag],
    ) -> Result<String> {
        let parsed = ClusterTemplate::parse(template)
            .map_err(|e| StratusError::remote("stack", format!("Template format error: {}", e)))?;
        if !capability_iam {
            return Err(StratusError::remote("stack", "Requires capabilities : [CAPABILITY_IAM]"));
        }
        check_declared(&parsed, params)?;

        let mut state = self.state.lock().await;
        if state.stacks.get(stack).is_some_and(|s| s.status != StackStatus::DeleteComplete) {
            return Err(StratusError::remote(
                "stack",
                format!("AlreadyExistsException: Stack [{}] already exists", stack),
            ));
        }

        let id = state.next_id();
        let stack_id = self.stack_id(stack, id);
        state.stacks.insert(
            stack.to_string(),
            LocalStack {
                id: stack_id.clone(),
                status: StackStatus::CreateInProgress,
                template: template.to_string(),
                parameters: params.to_vec(),
                tags: tags.to_vec(),
                resources: Vec::new(),
            },
        );
        self.persist(&state).await?;
        Ok(stack_id)
    }

    #[instrument(skip(self, params))]
    async fn update_stack(&self, stack: &str, params: &StackParams) -> Result<String> {
        let mut state = self.state.lock().await;
        let existing = state
            .stacks
            .get_mut(stack)
            .filter(|s| s.status != StackStatus::DeleteComplete)
            .ok_or_else(|| StratusError::StackNotFound { stack: stack.to_string() })?;
        if !existing.status.is_terminal() {
            return Err(StratusError::remote(
                "stack",
                format!("Stack {} is in {} state and can not be updated", stack, existing.status),
            ));
        }
        check_declared(&ClusterTemplate::parse(&existing.template)?, params)?;

        let mut merged = Vec::with_capacity(params.len());
        for param in params.iter() {
            let value = if param.use_previous_value {
                existing.parameters.iter().find(|p| p.key == param.key).and_then(|p| p.value.clone())
            } else {
                param.value.clone()
            };
            merged.push(StackParameter { key: param.key.clone(), value, use_previous_value: false });
        }
        existing.parameters = merged;
        existing.status = StackStatus::UpdateInProgress;
        let stack_id = existing.id.clone();
        self.persist(&state).await?;
        Ok(stack_id)
    }

    #[instrument(skip(self))]
    async fn delete_stack(&self, stack: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.stacks.get_mut(stack) {
            existing.status = StackStatus::DeleteInProgress;
            self.persist(&state).await?;
        }
        Ok(())
    }

    async fn stack_parameters(&self, stack: &str) -> Result<Vec<StackParameter>> {
        let state = self.state.lock().await;
        state
            .stacks
            .get(stack)
            .map(|s| s.parameters.clone())
            .ok_or_else(|| StratusError::StackNotFound { stack: stack.to_string() })
    }

    async fn wait_until_create_complete(&self, stack: &str) -> Result<()> {
        self.wait_for(stack, StackStatus::CreateComplete).await
    }

    async fn wait_until_update_complete(&self, stack: &str) -> Result<()> {
        self.wait_for(stack, StackStatus::UpdateComplete).await
    }

    async fn wait_until_delete_complete(&self, stack: &str) -> Result<()> {
        self.wait_for(stack, StackStatus::DeleteComplete).await
    }

    async fn describe_network_resources(&self, stack: &str) -> Result<Vec<StackResource>> {
        let state = self.state.lock().await;
        state
            .stacks
            .get(stack)
            .map(|s| s.resources.clone())
            .ok_or_else(|| StratusError::StackNotFound { stack: stack.to_string() })
    }
}

#[async_trait]
impl ImageCatalog for LocalProvider {
    async fn supported_instance_types(&self, _region: &str) -> Result<Vec<String>> {
        Ok(LOCAL_INSTANCE_TYPES.iter().map(|t| t.to_string()).collect())
    }

    async fn recommended_image(&self, instance_type: &str) -> Result<ImageMetadata> {
        // Graviton families carry a "g" after the generation digit, plus a1.
        let family = instance_type.split('.').next().unwrap_or_default();
        let arm = family == "a1" || (family.len() > 2 && family.ends_with('g'));
        Ok(ImageMetadata {
            image_id: if arm { "ami-0local0arm64" } else { "ami-0local0x86" }.to_string(),
            os_name: "Amazon Linux 2".to_string(),
            agent_version: "1.80.0".to_string(),
            runtime_version: "Docker version 20.10.25".to_string(),
        })
    }
}
