//! Shared application state for the NewsBalancer server.

use std::sync::Arc;

use newsbalancer_core::collector::Collector;
use newsbalancer_core::ensemble::Orchestrator;
use newsbalancer_core::llm::LlmMetrics;
use newsbalancer_core::progress::ProgressManager;
use newsbalancer_core::storage::DbPool;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    /// SQLite connection pool.
    pub db: DbPool,
    /// Ensemble orchestrator driving article analyses.
    pub orchestrator: Orchestrator,
    /// Progress registry backing the SSE endpoint.
    pub progress: Arc<ProgressManager>,
    /// RSS collector for admin-triggered refreshes.
    pub collector: Collector,
    /// LLM error counters exposed on the health endpoint.
    pub llm_metrics: Arc<LlmMetrics>,
}
