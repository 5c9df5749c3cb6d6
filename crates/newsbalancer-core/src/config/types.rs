//! Configuration section structs and their serde default functions.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP server bind settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Data storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "~/.newsbalancer/newsbalancer.db".to_string()
}

// ---------------------------------------------------------------------------
// LLM
// ---------------------------------------------------------------------------

/// LLM provider endpoint, credentials, and per-call deadline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible chat completions endpoint.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Primary API key.
    #[serde(default)]
    pub primary_api_key: String,

    /// Secondary API key tried once on rate-limit or auth failures.
    #[serde(default)]
    pub secondary_api_key: Option<String>,

    /// Prompt variant selecting the scoring system prompt.
    #[serde(default = "default_prompt_variant")]
    pub prompt_variant: String,

    /// Per-call deadline in milliseconds.
    #[serde(default = "default_per_call_timeout_ms")]
    pub per_call_timeout_ms: u64,
}

fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_prompt_variant() -> String {
    "default".to_string()
}
fn default_per_call_timeout_ms() -> u64 {
    30_000
}

// ---------------------------------------------------------------------------
// Composite score
// ---------------------------------------------------------------------------

/// Policy for model scores marked invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidHandling {
    /// Drop invalid scores before aggregation.
    Ignore,
    /// Substitute 0 with confidence 0.
    Default,
    /// Abort the computation.
    Fail,
}

/// One ideological perspective and its model fall-back chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PerspectiveConfig {
    /// Perspective name (e.g. "left", "center", "right").
    pub name: String,

    /// Weight of this perspective in the composite.
    #[serde(default = "default_perspective_weight")]
    pub weight: f64,

    /// Models tried in order until one succeeds.
    pub models: Vec<String>,
}

fn default_perspective_weight() -> f64 {
    1.0
}

/// Composite score perspectives, policies, and job deadlines.
///
/// Jobs snapshot this section at start; a reload swaps the shared copy
/// without affecting in-flight analyses.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompositeScoreConfig {
    /// Ordered list of perspectives.
    #[serde(default = "default_perspectives")]
    pub perspectives: Vec<PerspectiveConfig>,

    /// Policy for invalid model scores.
    #[serde(default = "default_invalid_handling")]
    pub invalid_handling: InvalidHandling,

    /// Minimum valid perspectives for full confidence.
    #[serde(default = "default_min_models")]
    pub min_models: usize,

    /// Composite magnitude above which an article leans Left/Right.
    #[serde(default = "default_lean_threshold")]
    pub lean_threshold: f64,

    /// Stricter cutoff used in user-facing summaries.
    #[serde(default = "default_confidence_threshold_label")]
    pub confidence_threshold_label: f64,

    /// Overall analysis deadline in milliseconds.
    #[serde(default = "default_per_job_timeout_ms")]
    pub per_job_timeout_ms: u64,

    /// Per-job patience budget for rate-limit retries, in milliseconds.
    #[serde(default = "default_rate_limit_budget_ms")]
    pub rate_limit_budget_ms: u64,

    /// Upper bound on perspectives scored in parallel.
    #[serde(default = "default_max_parallel_perspectives")]
    pub max_parallel_perspectives: usize,
}

fn default_perspectives() -> Vec<PerspectiveConfig> {
    super::defaults::default_perspectives()
}
fn default_invalid_handling() -> InvalidHandling {
    InvalidHandling::Ignore
}
fn default_min_models() -> usize {
    3
}
fn default_lean_threshold() -> f64 {
    0.1
}
fn default_confidence_threshold_label() -> f64 {
    0.3
}
fn default_per_job_timeout_ms() -> u64 {
    120_000
}
fn default_rate_limit_budget_ms() -> u64 {
    60_000
}
fn default_max_parallel_perspectives() -> usize {
    4
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// RSS collector limits and schedule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectorConfig {
    /// Per-feed fetch deadline in milliseconds.
    #[serde(default = "default_feed_timeout_ms")]
    pub feed_timeout_ms: u64,

    /// Maximum feed response size in bytes.
    #[serde(default = "default_feed_max_bytes")]
    pub feed_max_bytes: u64,

    /// Seconds between scheduled refreshes of all sources.
    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: u64,

    /// Upper bound on sources fetched in parallel.
    #[serde(default = "default_max_parallel_fetches")]
    pub max_parallel_fetches: usize,
}

fn default_feed_timeout_ms() -> u64 {
    20_000
}
fn default_feed_max_bytes() -> u64 {
    4 * 1024 * 1024
}
fn default_refresh_interval_seconds() -> u64 {
    1800
}
fn default_max_parallel_fetches() -> usize {
    4
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress retention settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressConfig {
    /// How long terminal progress states linger, in milliseconds.
    #[serde(default = "default_retention_ms")]
    pub retention_ms: u64,

    /// Seconds between reaper sweeps.
    #[serde(default = "default_reap_interval_seconds")]
    pub reap_interval_seconds: u64,
}

fn default_retention_ms() -> u64 {
    15 * 60 * 1000
}
fn default_reap_interval_seconds() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging and observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter applied when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
