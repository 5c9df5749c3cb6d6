//! Admin endpoints: manual score overrides, feed refresh, source registry.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use newsbalancer_core::storage::sources::{self, NewSource, Source};
use newsbalancer_core::storage::articles;

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// POST /manual-score/{id}
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ManualScoreRequest {
    pub score: f64,
}

/// Override an article's composite score. Prior confidence is preserved;
/// the next analysis overwrites the manual value.
pub async fn manual_score(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<ManualScoreRequest>,
) -> Result<Json<Value>, ApiError> {
    if !body.score.is_finite() || !(-1.0..=1.0).contains(&body.score) {
        return Err(ApiError::BadRequest(
            "score must be a number in [-1, 1]".to_string(),
        ));
    }

    let found = articles::set_manual_score(&state.db, id, body.score).await?;
    if !found {
        return Err(ApiError::NotFound(format!("article {id} not found")));
    }

    tracing::info!(article_id = id, score = body.score, "manual score override");

    Ok(super::envelope(json!({
        "article_id": id,
        "composite_score": body.score,
    })))
}

// ---------------------------------------------------------------------------
// POST /refresh
// ---------------------------------------------------------------------------

/// Trigger a refresh of all enabled sources in the background.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let collector = state.collector.clone();
    tokio::spawn(async move {
        if let Err(err) = collector.refresh_all().await {
            tracing::error!(error = %err, "admin-triggered refresh failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        super::envelope(json!({ "status": "refreshing" })),
    ))
}

// ---------------------------------------------------------------------------
// Source registry
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct SourceView {
    pub id: i64,
    pub name: String,
    pub channel_type: String,
    pub feed_url: String,
    pub category: String,
    pub enabled: bool,
    pub error_streak: i64,
    pub healthy: bool,
    pub last_success: Option<String>,
}

impl From<Source> for SourceView {
    fn from(source: Source) -> Self {
        let healthy = source.is_healthy();
        Self {
            id: source.id,
            name: source.name,
            channel_type: source.channel_type,
            feed_url: source.feed_url,
            category: source.category,
            enabled: source.enabled != 0,
            error_streak: source.error_streak,
            healthy,
            last_success: source.last_success,
        }
    }
}

/// `GET /sources` — all registered sources with derived health.
pub async fn list_sources(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let rows = sources::list_sources(&state.db, false).await?;
    let views: Vec<SourceView> = rows.into_iter().map(SourceView::from).collect();
    Ok(super::envelope(json!({ "sources": views })))
}

/// `POST /sources` — register a feed.
pub async fn add_source(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewSource>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if body.name.trim().is_empty() || body.feed_url.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "name and feed_url are required".to_string(),
        ));
    }

    let id = sources::insert_source(&state.db, &body)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict(format!("feed_url '{}' already registered", body.feed_url))
        })?;

    Ok((
        StatusCode::CREATED,
        super::envelope(json!({ "id": id })),
    ))
}

#[derive(Deserialize)]
pub struct UpdateSourceRequest {
    pub enabled: Option<bool>,
    pub category: Option<String>,
}

/// `PATCH /sources/{id}` — enable/disable or re-categorize a source.
pub async fn update_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateSourceRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut found = sources::get_source(&state.db, id).await?.is_some();
    if !found {
        return Err(ApiError::NotFound(format!("source {id} not found")));
    }

    if let Some(enabled) = body.enabled {
        found &= sources::set_enabled(&state.db, id, enabled).await?;
    }
    if let Some(category) = &body.category {
        found &= sources::set_category(&state.db, id, category).await?;
    }
    if !found {
        return Err(ApiError::NotFound(format!("source {id} not found")));
    }

    let source = sources::get_source(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("source {id} not found")))?;

    Ok(super::envelope(json!({ "source": SourceView::from(source) })))
}

/// `POST /sources/{id}/refresh` — fetch one source now, in the background.
pub async fn refresh_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let source = sources::get_source(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("source {id} not found")))?;

    let collector = state.collector.clone();
    tokio::spawn(async move {
        if let Err(err) = collector.refresh_source(&source).await {
            tracing::warn!(source_id = id, error = %err, "ad-hoc source refresh failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        super::envelope(json!({ "id": id, "status": "refreshing" })),
    ))
}

/// `POST /sources/{id}/reset-errors` — clear a source's error streak.
pub async fn reset_source_errors(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let found = sources::reset_errors(&state.db, id).await?;
    if !found {
        return Err(ApiError::NotFound(format!("source {id} not found")));
    }

    Ok(super::envelope(json!({ "id": id, "error_streak": 0 })))
}
