//! Remote service contracts.
//!
//! The orchestrator talks to three services through these traits:
//! - [`WorkloadRegistry`]: records that a named cluster exists
//! - [`StackService`]: deploys and tracks rendered templates
//! - [`ImageCatalog`]: instance-type offerings and recommended images
//!
//! Implementations own transport, credentials and retries. Errors come back
//! as [`StratusError::Remote`](crate::error::StratusError::Remote) with the
//! service's own text, except "stack does not exist", which is reported as
//! [`StratusError::StackNotFound`](crate::error::StratusError::StackNotFound).

use crate::error::Result;
use crate::params::{StackParameter, StackParams};
use crate::tags::Tag;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod types;

pub use types::{AccountSetting, ImageMetadata, StackResource, StackStatus};

/// Account setting that governs extended container-instance tagging.
pub const SETTING_CONTAINER_INSTANCE_LONG_ARN: &str = "containerInstanceLongArnFormat";

/// Workload registry client.
#[async_trait]
pub trait WorkloadRegistry: Send + Sync {
    /// Register a cluster. Returns the registry's identifier for it.
    async fn create_cluster(&self, name: &str, tags: &[Tag]) -> Result<String>;

    /// Remove a cluster entry. Returns the removed entry's identifier.
    async fn delete_cluster(&self, name: &str) -> Result<String>;

    /// Whether a cluster entry exists and is active.
    async fn is_active_cluster(&self, name: &str) -> Result<bool>;

    /// Effective values of an account setting for the calling identity.
    async fn list_account_settings(&self, setting: &str) -> Result<Vec<AccountSetting>>;
}

/// Infrastructure stack client.
///
/// The `wait_until_*` methods return once the stack reaches a terminal state
/// and fail if that state is not the expected one.
#[async_trait]
pub trait StackService: Send + Sync {
    /// `Ok(())` if the stack exists, `StackNotFound` otherwise.
    async fn validate_stack_exists(&self, stack: &str) -> Result<()>;

    async fn create_stack(
        &self,
        template: &str,
        stack: &str,
        capability_iam: bool,
        params: &StackParams,
        tags: &[Tag],
    ) -> Result<String>;

    async fn update_stack(&self, stack: &str, params: &StackParams) -> Result<String>;

    async fn delete_stack(&self, stack: &str) -> Result<()>;

    /// Parameters the deployed stack currently has.
    async fn stack_parameters(&self, stack: &str) -> Result<Vec<StackParameter>>;

    async fn wait_until_create_complete(&self, stack: &str) -> Result<()>;

    async fn wait_until_update_complete(&self, stack: &str) -> Result<()>;

    async fn wait_until_delete_complete(&self, stack: &str) -> Result<()>;

    /// Network resources the stack created, for post-creation summaries.
    async fn describe_network_resources(&self, stack: &str) -> Result<Vec<StackResource>>;
}

/// Instance-type offerings and machine image lookup.
#[async_trait]
pub trait ImageCatalog: Send + Sync {
    async fn supported_instance_types(&self, region: &str) -> Result<Vec<String>>;

    async fn recommended_image(&self, instance_type: &str) -> Result<ImageMetadata>;
}

/// Launch mode of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LaunchMode {
    /// Capacity is provided by virtual machines the stack launches.
    #[default]
    Ec2,
    /// Capacity is provided by the serverless backend; no instances.
    Fargate,
}

impl LaunchMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ec2 => "EC2",
            Self::Fargate => "FARGATE",
        }
    }

    /// Parse a launch mode, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "EC2" => Some(Self::Ec2),
            "FARGATE" => Some(Self::Fargate),
            _ => None,
        }
    }
}

impl std::fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
