//! NewsBalancer HTTP API server.
//!
//! Exposes `newsbalancer-core`'s components as a JSON REST API with a
//! server-sent-event stream for analysis progress. All responses use the
//! uniform envelope `{success, data?, error?}`.

pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the complete axum router with all API routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(routes::health::healthz))
        // Articles
        .route("/articles", get(routes::articles::list))
        .route("/articles/{id}", get(routes::articles::detail))
        .route("/articles/{id}/bias", get(routes::articles::bias))
        .route("/articles/{id}/ensemble", get(routes::articles::ensemble))
        // Analysis
        .route("/llm/reanalyze/{id}", post(routes::analysis::reanalyze))
        .route(
            "/llm/score-progress/{id}",
            get(routes::analysis::score_progress),
        )
        .route(
            "/llm/score-progress/{id}/snapshot",
            get(routes::analysis::progress_snapshot),
        )
        // Feedback
        .route("/feedback", post(routes::feedback::submit))
        // Admin
        .route("/manual-score/{id}", post(routes::admin::manual_score))
        .route("/refresh", post(routes::admin::refresh))
        .route(
            "/sources",
            get(routes::admin::list_sources).post(routes::admin::add_source),
        )
        .route("/sources/{id}", patch(routes::admin::update_source))
        .route(
            "/sources/{id}/refresh",
            post(routes::admin::refresh_source),
        )
        .route(
            "/sources/{id}/reset-errors",
            post(routes::admin::reset_source_errors),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
