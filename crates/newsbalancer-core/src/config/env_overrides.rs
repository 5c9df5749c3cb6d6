//! Environment variable overrides for configuration.

use super::types::InvalidHandling;
use super::Config;
use crate::error::ConfigError;
use std::env;

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables use the `NEWSBALANCER_` prefix with double
    /// underscores separating nested keys (e.g., `NEWSBALANCER_LLM__PRIMARY_API_KEY`).
    /// Perspective chains are structured and only configurable via TOML.
    pub(super) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(val) = env::var("NEWSBALANCER_SERVER__HOST") {
            self.server.host = val;
        }
        if let Ok(val) = env::var("NEWSBALANCER_SERVER__PORT") {
            self.server.port = parse_env_u16("NEWSBALANCER_SERVER__PORT", &val)?;
        }

        // Storage
        if let Ok(val) = env::var("NEWSBALANCER_STORAGE__DB_PATH") {
            self.storage.db_path = val;
        }

        // LLM
        if let Ok(val) = env::var("NEWSBALANCER_LLM__BASE_URL") {
            self.llm.base_url = val;
        }
        if let Ok(val) = env::var("NEWSBALANCER_LLM__PRIMARY_API_KEY") {
            self.llm.primary_api_key = val;
        }
        if let Ok(val) = env::var("NEWSBALANCER_LLM__SECONDARY_API_KEY") {
            self.llm.secondary_api_key = Some(val);
        }
        if let Ok(val) = env::var("NEWSBALANCER_LLM__PROMPT_VARIANT") {
            self.llm.prompt_variant = val;
        }
        if let Ok(val) = env::var("NEWSBALANCER_LLM__PER_CALL_TIMEOUT_MS") {
            self.llm.per_call_timeout_ms =
                parse_env_u64("NEWSBALANCER_LLM__PER_CALL_TIMEOUT_MS", &val)?;
        }

        // Composite
        if let Ok(val) = env::var("NEWSBALANCER_COMPOSITE__INVALID_HANDLING") {
            self.composite.invalid_handling = match val.to_lowercase().as_str() {
                "ignore" => InvalidHandling::Ignore,
                "default" => InvalidHandling::Default,
                "fail" => InvalidHandling::Fail,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "composite.invalid_handling".to_string(),
                        message: format!(
                            "invalid policy '{other}', expected 'ignore', 'default', or 'fail'"
                        ),
                    });
                }
            };
        }
        if let Ok(val) = env::var("NEWSBALANCER_COMPOSITE__MIN_MODELS") {
            self.composite.min_models =
                parse_env_u64("NEWSBALANCER_COMPOSITE__MIN_MODELS", &val)? as usize;
        }
        if let Ok(val) = env::var("NEWSBALANCER_COMPOSITE__PER_JOB_TIMEOUT_MS") {
            self.composite.per_job_timeout_ms =
                parse_env_u64("NEWSBALANCER_COMPOSITE__PER_JOB_TIMEOUT_MS", &val)?;
        }
        if let Ok(val) = env::var("NEWSBALANCER_COMPOSITE__RATE_LIMIT_BUDGET_MS") {
            self.composite.rate_limit_budget_ms =
                parse_env_u64("NEWSBALANCER_COMPOSITE__RATE_LIMIT_BUDGET_MS", &val)?;
        }

        // Collector
        if let Ok(val) = env::var("NEWSBALANCER_COLLECTOR__FEED_TIMEOUT_MS") {
            self.collector.feed_timeout_ms =
                parse_env_u64("NEWSBALANCER_COLLECTOR__FEED_TIMEOUT_MS", &val)?;
        }
        if let Ok(val) = env::var("NEWSBALANCER_COLLECTOR__FEED_MAX_BYTES") {
            self.collector.feed_max_bytes =
                parse_env_u64("NEWSBALANCER_COLLECTOR__FEED_MAX_BYTES", &val)?;
        }
        if let Ok(val) = env::var("NEWSBALANCER_COLLECTOR__REFRESH_INTERVAL_SECONDS") {
            self.collector.refresh_interval_seconds =
                parse_env_u64("NEWSBALANCER_COLLECTOR__REFRESH_INTERVAL_SECONDS", &val)?;
        }

        // Progress
        if let Ok(val) = env::var("NEWSBALANCER_PROGRESS__RETENTION_MS") {
            self.progress.retention_ms =
                parse_env_u64("NEWSBALANCER_PROGRESS__RETENTION_MS", &val)?;
        }

        // Logging
        if let Ok(val) = env::var("NEWSBALANCER_LOGGING__LEVEL") {
            self.logging.level = val;
        }

        Ok(())
    }
}

fn parse_env_u16(var: &str, val: &str) -> Result<u16, ConfigError> {
    val.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
        field: var.to_string(),
        message: format!("'{val}' is not a valid port number"),
    })
}

fn parse_env_u64(var: &str, val: &str) -> Result<u64, ConfigError> {
    val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        field: var.to_string(),
        message: format!("'{val}' is not a valid integer"),
    })
}
