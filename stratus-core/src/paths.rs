//! Centralized path configuration for stratus.
//!
//! All local paths go through this module so the CLI and tests agree on
//! where configuration and local state live.

use std::path::PathBuf;

/// Get the stratus configuration directory.
///
/// Resolution order:
/// 1. `STRATUS_CONFIG_DIR` environment variable
/// 2. `<platform config dir>/stratus`
/// 3. `~/.stratus`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("STRATUS_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    dirs::config_dir()
        .map(|d| d.join("stratus"))
        .or_else(|| dirs::home_dir().map(|h| h.join(".stratus")))
        .unwrap_or_else(|| PathBuf::from(".stratus"))
}

/// Get the stratus data directory.
///
/// Resolution order:
/// 1. `STRATUS_DATA_DIR` environment variable
/// 2. `<platform data dir>/stratus`
/// 3. `~/.stratus`
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("STRATUS_DATA_DIR") {
        return PathBuf::from(dir);
    }

    dirs::data_local_dir()
        .map(|d| d.join("stratus"))
        .or_else(|| dirs::home_dir().map(|h| h.join(".stratus")))
        .unwrap_or_else(|| PathBuf::from(".stratus"))
}

/// Get the configuration file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.json")
}

/// Get the local backend state file.
pub fn local_state_file() -> PathBuf {
    data_dir().join("local-state.json")
}
