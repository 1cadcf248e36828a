// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawWorkflowConfig, WorkflowConfig};
use crate::errors::Result;

/// Read and deserialize a configuration file without validating it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawWorkflowConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    Ok(toml::from_str(&contents)?)
}

/// Read, deserialize and validate a configuration file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<WorkflowConfig> {
    let raw = load_from_path(path)?;
    WorkflowConfig::try_from(raw)
}

/// Same as [`load_and_validate`] for TOML already in memory.
pub fn load_from_str(contents: &str) -> Result<WorkflowConfig> {
    let raw: RawWorkflowConfig = toml::from_str(contents)?;
    WorkflowConfig::try_from(raw)
}

/// `Plandag.toml` in the current directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Plandag.toml")
}

/// The explicit path when given, else `default` if that file exists.
pub fn resolve_config_path(explicit: Option<PathBuf>, default: &Path) -> Option<PathBuf> {
    explicit.or_else(|| default.is_file().then(|| default.to_path_buf()))
}
