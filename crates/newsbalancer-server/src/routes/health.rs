//! Liveness/readiness endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /healthz` — liveness plus LLM error counters.
pub async fn healthz(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    newsbalancer_core::storage::ping(&state.db).await?;

    Ok(super::envelope(json!({
        "status": "ok",
        "version": newsbalancer_core::version(),
        "llm": state.llm_metrics.snapshot(),
        "tracked_progress": state.progress.len(),
    })))
}
