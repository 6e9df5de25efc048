//! Error types for stratus.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stratus operations.
pub type Result<T> = std::result::Result<T, StratusError>;

/// Main error type for stratus.
#[derive(Error, Debug)]
pub enum StratusError {
    // Input errors
    #[error("{message}")]
    Validation { message: String },

    #[error("Missing required parameter: {key}")]
    MissingParameter { key: String },

    #[error(
        "Please configure a cluster using the configure command or the '--cluster' flag"
    )]
    ClusterNotSet,

    #[error("Cluster '{cluster}' is not active. Ensure that it exists")]
    ClusterInactive { cluster: String },

    #[error("{reason}")]
    Aborted { reason: String },

    // Lookup errors
    #[error("Parameter not found: {key}")]
    ParameterNotFound { key: String },

    #[error("Stack not found: {stack}")]
    StackNotFound { stack: String },

    // Remote service errors
    #[error("{service} error: {message}")]
    Remote { service: String, message: String },

    #[error(
        "instance type {instance_type} not supported in region {region}: instance type {instance_type} not found in list of supported instance types {supported:?}"
    )]
    UnsupportedInstanceType { instance_type: String, region: String, supported: Vec<String> },

    // Template errors
    #[error("Invalid template: {reason}")]
    Template { reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StratusError {
    /// Create a validation error from a user-facing message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Create a remote service error, keeping the original text.
    pub fn remote(service: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Remote { service: service.into(), message: err.to_string() }
    }

    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }

    /// True for the "entity does not exist" family, which several call
    /// sites consume as a control-flow signal rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ParameterNotFound { .. } | Self::StackNotFound { .. })
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } | Self::ClusterNotSet | Self::Aborted { .. } => "validation",
            Self::MissingParameter { .. } => "missing_parameter",
            Self::ClusterInactive { .. } => "cluster_inactive",
            Self::ParameterNotFound { .. } | Self::StackNotFound { .. } => "not_found",
            Self::Remote { .. } => "remote",
            Self::UnsupportedInstanceType { .. } => "unsupported",
            Self::Template { .. } => "template",
            Self::InvalidConfig { .. } | Self::Io { .. } => "config",
            Self::Internal(_) | Self::Other(_) => "internal",
        }
    }
}
