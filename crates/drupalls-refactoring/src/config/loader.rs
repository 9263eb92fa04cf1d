//! Configuration loader for injection options

use std::path::Path;

use tracing::debug;

use crate::{
    config::types::InjectionConfig,
    error::{InjectionError, Result},
};

/// Loads injection configuration from files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub fn load_from_yaml(path: &Path) -> Result<InjectionConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            InjectionError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        serde_yaml::from_str(&content)
            .map_err(|e| InjectionError::ConfigError(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from a JSON file
    pub fn load_from_json(path: &Path) -> Result<InjectionConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            InjectionError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| InjectionError::ConfigError(format!("Failed to parse JSON: {}", e)))
    }

    /// Load and validate configuration from a file (auto-detect format)
    pub fn load(path: &Path) -> Result<InjectionConfig> {
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::load_from_yaml(path)?,
            Some("json") => Self::load_from_json(path)?,
            _ => {
                return Err(InjectionError::ConfigError(
                    "Unsupported configuration file format".to_string(),
                ))
            }
        };

        config.validate()?;
        debug!("Loaded injection configuration from {}", path.display());
        Ok(config)
    }
}
