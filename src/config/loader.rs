// src/config/loader.rs

use crate::config::{AppConfig, ConfigValidator, EnvironmentConfig};
use crate::error::{AppError, Result};
use std::path::Path;
use tracing::{debug, info};

/// Load configuration from file and environment variables.
///
/// Layering order: YAML file (if present), environment, then `overrides`
/// (command-line flags). The merged result is validated before it is returned.
pub fn load_config(config_path: &Path, overrides: impl FnOnce(&mut AppConfig)) -> Result<AppConfig> {
    let mut config = if config_path.exists() {
        info!("Loading configuration from file: {}", config_path.display());
        load_from_file(config_path)?
    } else {
        info!("Configuration file not found, using defaults");
        AppConfig::default()
    };

    EnvironmentConfig::from_env().apply(&mut config);
    overrides(&mut config);

    ConfigValidator::validate(&config)?;

    debug!("Configuration loaded and validated successfully");
    Ok(config)
}

fn load_from_file(config_path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(config_path)?;
    serde_yaml::from_str(&content).map_err(|e| {
        AppError::config_validation(
            format!(
                "Failed to parse config file {} (line {:?}): {e}",
                config_path.display(),
                e.location().map(|loc| loc.line())
            ),
            None,
        )
    })
}
