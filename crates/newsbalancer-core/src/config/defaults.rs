//! Default values for all configuration sections.
//!
//! Defaults give a runnable service out of the box; users only need to
//! supply API credentials and feed sources.

use super::types::{
    CollectorConfig, CompositeScoreConfig, InvalidHandling, LlmConfig, LoggingConfig,
    PerspectiveConfig, ProgressConfig, ServerConfig, StorageConfig,
};

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "~/.newsbalancer/newsbalancer.db".to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            primary_api_key: String::new(),
            secondary_api_key: None,
            prompt_variant: "default".to_string(),
            per_call_timeout_ms: 30_000,
        }
    }
}

impl Default for CompositeScoreConfig {
    fn default() -> Self {
        Self {
            perspectives: default_perspectives(),
            invalid_handling: InvalidHandling::Ignore,
            min_models: 3,
            lean_threshold: 0.1,
            confidence_threshold_label: 0.3,
            per_job_timeout_ms: 120_000,
            rate_limit_budget_ms: 60_000,
            max_parallel_perspectives: 4,
        }
    }
}

/// The stock Left/Center/Right ensemble with two-model fall-back chains.
pub(super) fn default_perspectives() -> Vec<PerspectiveConfig> {
    vec![
        PerspectiveConfig {
            name: "left".to_string(),
            weight: 1.0,
            models: vec![
                "meta-llama/llama-3.1-70b-instruct".to_string(),
                "mistralai/mixtral-8x7b-instruct".to_string(),
            ],
        },
        PerspectiveConfig {
            name: "center".to_string(),
            weight: 1.0,
            models: vec![
                "openai/gpt-4o-mini".to_string(),
                "google/gemini-flash-1.5".to_string(),
            ],
        },
        PerspectiveConfig {
            name: "right".to_string(),
            weight: 1.0,
            models: vec![
                "anthropic/claude-3-haiku".to_string(),
                "qwen/qwen-2.5-72b-instruct".to_string(),
            ],
        },
    ]
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            feed_timeout_ms: 20_000,
            feed_max_bytes: 4 * 1024 * 1024,
            refresh_interval_seconds: 1800,
            max_parallel_fetches: 4,
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            retention_ms: 15 * 60 * 1000,
            reap_interval_seconds: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
