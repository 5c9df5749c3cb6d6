//! Configuration validation logic.

use super::Config;
use crate::error::ConfigError;

impl Config {
    /// Validate the configuration, returning all errors found (not just the first).
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.composite.perspectives.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "composite.perspectives".to_string(),
            });
        }

        for p in &self.composite.perspectives {
            if p.name.trim().is_empty() {
                errors.push(ConfigError::MissingField {
                    field: "composite.perspectives[].name".to_string(),
                });
            }
            if p.models.is_empty() {
                errors.push(ConfigError::MissingField {
                    field: format!("composite.perspectives[{}].models", p.name),
                });
            }
            if p.weight <= 0.0 || !p.weight.is_finite() {
                errors.push(ConfigError::InvalidValue {
                    field: format!("composite.perspectives[{}].weight", p.name),
                    message: "must be a positive finite number".to_string(),
                });
            }
        }

        let mut names: Vec<&str> = self
            .composite
            .perspectives
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.composite.perspectives.len() {
            errors.push(ConfigError::InvalidValue {
                field: "composite.perspectives".to_string(),
                message: "perspective names must be unique".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.composite.lean_threshold) {
            errors.push(ConfigError::InvalidValue {
                field: "composite.lean_threshold".to_string(),
                message: "must be between 0 and 1".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.composite.confidence_threshold_label) {
            errors.push(ConfigError::InvalidValue {
                field: "composite.confidence_threshold_label".to_string(),
                message: "must be between 0 and 1".to_string(),
            });
        }

        if self.composite.max_parallel_perspectives == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "composite.max_parallel_perspectives".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.llm.per_call_timeout_ms == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "llm.per_call_timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.composite.per_job_timeout_ms == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "composite.per_job_timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.collector.feed_max_bytes == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "collector.feed_max_bytes".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.collector.max_parallel_fetches == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "collector.max_parallel_fetches".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
