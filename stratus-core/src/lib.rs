//! stratus core library.
//!
//! Provisions container clusters as infrastructure-as-code stacks: a cluster
//! is a registry entry plus a stack rendered from a conditional template.
//! [`lifecycle::ClusterOrchestrator`] sequences create, delete and scale
//! against the service contracts in [`clients`].

// The template document is one large `json!` tree.
#![recursion_limit = "256"]

pub mod clients;
pub mod config;
pub mod error;
pub mod instance;
pub mod lifecycle;
pub mod observability;
pub mod params;
pub mod paths;
pub mod sandbox;
pub mod tags;
pub mod template;
pub mod userdata;
pub mod validate;

pub use clients::{ImageCatalog, LaunchMode, StackService, WorkloadRegistry};
pub use config::Config;
pub use error::{Result, StratusError};
pub use lifecycle::{
    ClusterOrchestrator, ClusterState, CreateOutcome, CreateRequest, DeleteOutcome, DeleteRequest,
    ScaleOutcome, ScaleRequest,
};
pub use params::{StackParameter, StackParams};
pub use sandbox::LocalProvider;
pub use tags::Tag;
