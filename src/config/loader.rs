//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use serde_yaml::Value;

use crate::config::resolver::ResolvedConfig;
use crate::config::ConfigError;

/// Load a nested configuration document from a YAML file.
pub fn load_document(path: &Path) -> Result<Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    let document = serde_yaml::from_str(&content)?;
    Ok(document)
}

/// Load and resolve a configuration file in one step.
pub fn load_config(path: &Path) -> Result<ResolvedConfig, ConfigError> {
    let document = load_document(path)?;
    ResolvedConfig::resolve(&document)
}
