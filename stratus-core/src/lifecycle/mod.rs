//! Cluster lifecycle orchestration.
//!
//! [`ClusterOrchestrator`] sequences the workload registry and the stack
//! service for the `create`, `delete` and `scale` operations. Each operation
//! runs to completion (or failure) before returning; waits on the stack
//! service block until it reports a terminal state.
//!
//! Nothing is rolled back automatically. A create that fails after the
//! registry entry was written leaves an active cluster without a stack,
//! which a later forced create or a delete cleans up.

mod create;
mod scale;
mod teardown;

use crate::clients::{ImageCatalog, LaunchMode, StackResource, StackService, WorkloadRegistry};
use crate::config::Config;
use crate::error::{Result, StratusError};
use crate::observability::metrics;
use crate::userdata::{self, UserDataFactory};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Observed or in-flight state of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterState {
    /// No active registry entry.
    NonExistent,
    /// Registered, but no stack is deployed.
    ActiveNoStack,
    /// Registered with a deployed stack.
    ActiveWithStack,
    /// Delete in progress.
    Deleting,
    /// Scale update in progress.
    ScaledUpdate,
}

impl ClusterState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonExistent => "non-existent",
            Self::ActiveNoStack => "active (no stack)",
            Self::ActiveWithStack => "active",
            Self::Deleting => "deleting",
            Self::ScaledUpdate => "updating",
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::ActiveNoStack | Self::ActiveWithStack)
    }
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Asks the operator a yes/no question.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Reads the answer from standard input.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        let stdin = std::io::stdin();
        let mut reader = stdin.lock();
        let mut stdout = std::io::stdout();
        prompt_confirmation(&mut reader, &mut stdout, prompt)
    }
}

/// Fixed answer, for non-interactive callers and tests.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(self.0)
    }
}

/// Write `prompt`, read one line and accept `y` or `yes` in any case.
pub fn prompt_confirmation<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    prompt: &str,
) -> Result<bool> {
    let io_err = |e: std::io::Error| StratusError::Aborted { reason: format!("Error reading input: {}", e) };

    writeln!(writer, "{}", prompt).map_err(io_err)?;
    writer.flush().map_err(io_err)?;

    let mut input = String::new();
    reader.read_line(&mut input).map_err(io_err)?;
    let answer = input.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Inputs for `create`. Optional strings map one-to-one onto stack
/// parameters; `None` and `Some("")` both mean "not given".
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub cluster: String,
    pub launch_mode: LaunchMode,
    /// Register the cluster only; no stack.
    pub empty: bool,
    /// Replace an existing stack.
    pub force: bool,
    pub capability_iam: bool,
    pub key_pair: Option<String>,
    pub instance_type: Option<String>,
    pub image_id: Option<String>,
    pub instance_role: Option<String>,
    pub size: Option<String>,
    pub vpc_id: Option<String>,
    pub subnet_ids: Option<String>,
    pub vpc_azs: Option<String>,
    pub security_groups: Option<String>,
    pub source_cidr: Option<String>,
    pub port: Option<String>,
    pub spot_price: Option<String>,
    pub no_public_ip: bool,
    pub imds_v2: bool,
    pub user_data_files: Vec<PathBuf>,
    /// `key=value,...`
    pub resource_tags: Option<String>,
}

impl CreateRequest {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self { cluster: cluster.into(), ..Self::default() }
    }
}

/// Result of a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub cluster: String,
    pub registry_id: String,
    /// Stack name and id; `None` for an empty cluster.
    pub stack: Option<(String, String)>,
    pub replaced_stack: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteRequest {
    pub cluster: String,
    /// Skip the confirmation prompt.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub registry_id: String,
    pub stack_deleted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScaleRequest {
    pub cluster: String,
    pub size: Option<String>,
    pub capability_iam: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleOutcome {
    pub stack_name: String,
    pub stack_id: String,
    pub size: u32,
}

/// Stack transitions the orchestrator waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StackTransition {
    Create,
    Update,
    Delete,
}

impl StackTransition {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Drives cluster create, delete and scale against the remote services.
pub struct ClusterOrchestrator {
    registry: Arc<dyn WorkloadRegistry>,
    stacks: Arc<dyn StackService>,
    catalog: Arc<dyn ImageCatalog>,
    user_data: UserDataFactory,
    confirm: Arc<dyn Confirm>,
    config: Config,
}

impl ClusterOrchestrator {
    /// Create a new orchestrator.
    ///
    /// # Arguments
    /// * `registry` - Workload registry client
    /// * `stacks` - Infrastructure stack client
    /// * `catalog` - Instance-type offerings and image lookup
    pub fn new(
        registry: Arc<dyn WorkloadRegistry>,
        stacks: Arc<dyn StackService>,
        catalog: Arc<dyn ImageCatalog>,
    ) -> Self {
        Self {
            registry,
            stacks,
            catalog,
            user_data: userdata::default_factory(),
            confirm: Arc::new(StdinConfirm),
            config: Config::default(),
        }
    }

    /// Take region and stack naming from `config`.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.config = config.clone();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    pub fn with_user_data_factory(mut self, factory: UserDataFactory) -> Self {
        self.user_data = factory;
        self
    }

    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    /// Stack name derived from the cluster name.
    pub fn stack_name(&self, cluster: &str) -> String {
        self.config.stack_name(cluster)
    }

    fn require_region(&self) -> Result<&str> {
        self.config.region.as_deref().filter(|r| !r.is_empty()).ok_or_else(|| StratusError::InvalidConfig {
            reason: "Set a region with '--region', STRATUS_REGION or the config file".to_string(),
        })
    }

    /// Observe the current state of `cluster`.
    pub async fn status(&self, cluster: &str) -> Result<ClusterState> {
        if cluster.is_empty() {
            return Err(StratusError::ClusterNotSet);
        }
        if !self.registry.is_active_cluster(cluster).await? {
            return Ok(ClusterState::NonExistent);
        }
        if self.stack_exists(&self.stack_name(cluster)).await? {
            Ok(ClusterState::ActiveWithStack)
        } else {
            Ok(ClusterState::ActiveNoStack)
        }
    }

    /// Network resources created by the cluster's stack.
    pub async fn network_resources(&self, cluster: &str) -> Result<Vec<StackResource>> {
        self.stacks.describe_network_resources(&self.stack_name(cluster)).await
    }

    /// `StackNotFound` becomes `false`; other errors propagate.
    async fn stack_exists(&self, stack: &str) -> Result<bool> {
        match self.stacks.validate_stack_exists(stack).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fail unless the registry reports `cluster` as active.
    async fn validate_active(&self, cluster: &str) -> Result<()> {
        if cluster.is_empty() {
            return Err(StratusError::ClusterNotSet);
        }
        if !self.registry.is_active_cluster(cluster).await? {
            return Err(StratusError::ClusterInactive { cluster: cluster.to_string() });
        }
        Ok(())
    }

    async fn wait_for(&self, transition: StackTransition, stack: &str) -> Result<()> {
        let result = match transition {
            StackTransition::Create => self.stacks.wait_until_create_complete(stack).await,
            StackTransition::Update => self.stacks.wait_until_update_complete(stack).await,
            StackTransition::Delete => self.stacks.wait_until_delete_complete(stack).await,
        };
        metrics::record_stack_wait(transition.as_str(), result.is_ok());
        result
    }
}

fn log_transition(cluster: &str, from: ClusterState, to: ClusterState) {
    info!(cluster = %cluster, from = %from, to = %to, "Cluster state transition");
}

fn finish<T>(operation: &str, started: Instant, result: Result<T>) -> Result<T> {
    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    };
    metrics::record_operation(operation, outcome, started.elapsed());
    result
}

/// Parse a cluster size flag value.
fn parse_size(size: Option<&str>) -> Result<Option<u32>> {
    match size.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s.parse::<u32>().map(Some).map_err(|e| {
            StratusError::validation(format!("Invalid value '{}' for '--size': {}", s, e))
        }),
    }
}
