//! Configuration management for NewsBalancer.
//!
//! Supports three-layer configuration loading:
//! 1. Built-in defaults
//! 2. TOML config file (`~/.newsbalancer/config.toml`)
//! 3. Environment variable overrides (`NEWSBALANCER_` prefix)
//!
//! CLI flag overrides are applied by the binary crate after loading.

mod defaults;
mod env_overrides;
mod validation;

pub mod types;

#[cfg(test)]
mod tests;

pub use types::{
    CollectorConfig, CompositeScoreConfig, InvalidHandling, LlmConfig, LoggingConfig,
    PerspectiveConfig, ProgressConfig, ServerConfig, StorageConfig,
};

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default config file location relative to the user's home directory.
const DEFAULT_CONFIG_PATH: &str = "~/.newsbalancer/config.toml";

/// Top-level configuration for the NewsBalancer service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server bind settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Data storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// LLM provider endpoint, credentials, and per-call deadline.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Composite score perspectives, policies, and job deadlines.
    #[serde(default)]
    pub composite: CompositeScoreConfig,

    /// RSS collector limits and schedule.
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Progress retention settings.
    #[serde(default)]
    pub progress: ProgressConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve the config file path.
    ///
    /// Returns `(path, explicit)` where `explicit` indicates the caller
    /// supplied the path (a missing explicit file is an error; a missing
    /// default file falls back to defaults).
    fn resolve_config_path(config_path: Option<&str>) -> (PathBuf, bool) {
        match config_path {
            Some(p) => (PathBuf::from(expand_tilde(p)), true),
            None => (PathBuf::from(expand_tilde(DEFAULT_CONFIG_PATH)), false),
        }
    }

    /// Load configuration from the three layers: defaults, TOML file,
    /// environment overrides.
    pub fn load(config_path: Option<&str>) -> Result<Config, ConfigError> {
        let (path, explicit) = Self::resolve_config_path(config_path);

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::ParseError { source: e })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    });
                }
                Config::default()
            }
            Err(_) => {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
        };

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Load configuration and validate it, returning all validation errors at once.
    pub fn load_and_validate(config_path: Option<&str>) -> Result<Config, Vec<ConfigError>> {
        let config = Config::load(config_path).map_err(|e| vec![e])?;
        config.validate()?;
        Ok(config)
    }
}

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.to_string_lossy().to_string();
        }
    }
    path.to_string()
}
