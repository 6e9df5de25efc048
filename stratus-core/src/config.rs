//! Configuration management.

use crate::clients::LaunchMode;
use crate::error::{Result, StratusError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix prepended to a cluster name to form its stack name.
pub const DEFAULT_STACK_NAME_PREFIX: &str = "stratus-setup-";

/// Persistent configuration for stratus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Region used for offerings lookups; environment overrides apply.
    pub region: Option<String>,
    /// Cluster used when `--cluster` is not given.
    pub default_cluster: Option<String>,
    pub default_launch_mode: LaunchMode,
    pub stack_name_prefix: String,
    /// Interval between stack status polls while waiting.
    pub poll_interval_secs: u64,
    pub log_level: String,
    /// Local backend state file; defaults under the data directory.
    pub state_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: None,
            default_cluster: None,
            default_launch_mode: LaunchMode::Ec2,
            stack_name_prefix: DEFAULT_STACK_NAME_PREFIX.to_string(),
            poll_interval_secs: 5,
            log_level: "info".to_string(),
            state_file: None,
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_file()
    }

    /// Load configuration from disk, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific file. Missing file means defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| StratusError::InvalidConfig {
            reason: format!("Failed to read config: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| StratusError::InvalidConfig {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    fn apply_env(&mut self) {
        if let Some(region) = ["STRATUS_REGION", "AWS_REGION"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        {
            self.region = Some(region);
        }
    }

    /// Stack name for `cluster`. Every command derives stack names here.
    pub fn stack_name(&self, cluster: &str) -> String {
        format!("{}{}", self.stack_name_prefix, cluster)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Local backend state file.
    pub fn state_file(&self) -> PathBuf {
        self.state_file.clone().unwrap_or_else(paths::local_state_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.stack_name_prefix, DEFAULT_STACK_NAME_PREFIX);
        assert_eq!(config.default_launch_mode, LaunchMode::Ec2);
        assert!(config.region.is_none());
    }

    #[test]
    fn test_load_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            region: Some("eu-west-1".into()),
            default_launch_mode: LaunchMode::Fargate,
            poll_interval_secs: 2,
            ..Config::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.region.as_deref(), Some("eu-west-1"));
        assert_eq!(loaded.default_launch_mode, LaunchMode::Fargate);
        assert_eq!(loaded.poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"region": "us-east-2"}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.region.as_deref(), Some("us-east-2"));
        assert_eq!(loaded.log_level, "info");
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(StratusError::InvalidConfig { .. })));
    }

    #[test]
    fn test_stack_name_derivation() {
        let config = Config::default();
        assert_eq!(config.stack_name("prod"), "stratus-setup-prod");
    }

    #[test]
    fn test_poll_interval_floor() {
        let config = Config { poll_interval_secs: 0, ..Config::default() };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }
}
