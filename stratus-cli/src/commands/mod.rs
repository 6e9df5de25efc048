//! CLI command implementations

pub mod down;
pub mod scale;
pub mod status;
pub mod template;
pub mod up;

use anyhow::{Context as _, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stratus_core::{observability, ClusterOrchestrator, Config, LocalProvider, StratusError};

/// Settings shared by every command.
pub struct Context {
    pub config: Config,
    cluster: Option<String>,
}

impl Context {
    /// Load the config file and apply command-line overrides.
    pub fn load(cluster: Option<String>, region: Option<String>, state_file: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::load().context("Failed to load configuration")?;
        if let Some(region) = region {
            config.region = Some(region);
        }
        if let Some(state_file) = state_file {
            config.state_file = Some(state_file);
        }

        observability::init(&config.log_level)
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

        let cluster = cluster.or_else(|| config.default_cluster.clone()).filter(|c| !c.is_empty());
        Ok(Self { config, cluster })
    }

    /// Cluster the command applies to.
    pub fn cluster(&self) -> Result<&str> {
        self.cluster.as_deref().ok_or_else(|| StratusError::ClusterNotSet.into())
    }

    /// Local backend plus an orchestrator wired to it.
    pub async fn connect(&self) -> Result<(ClusterOrchestrator, Arc<LocalProvider>)> {
        let path = self.config.state_file();
        let mut provider = LocalProvider::open(&path)
            .await
            .with_context(|| format!("Failed to open local state at {}", path.display()))?
            .with_poll_interval(self.config.poll_interval());
        if let Some(region) = self.config.region.as_deref() {
            provider = provider.with_region(region);
        }
        let provider = Arc::new(provider);
        let orchestrator = ClusterOrchestrator::new(provider.clone(), provider.clone(), provider.clone())
            .with_config(&self.config);
        Ok((orchestrator, provider))
    }
}

/// Spinner shown while waiting on stack transitions.
pub fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}
