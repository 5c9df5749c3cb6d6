//! User feedback endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use newsbalancer_core::storage::feedback::FeedbackCategory;
use newsbalancer_core::storage::{articles, feedback};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub article_id: i64,
    pub user_id: Option<String>,
    pub feedback_text: String,
    pub category: String,
}

/// `POST /feedback` — record feedback and nudge the article's confidence
/// by ±0.1 (clamped to [0, 1]). "other" leaves confidence untouched.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FeedbackRequest>,
) -> Result<Json<Value>, ApiError> {
    let category = parse_category(&body.category)?;

    articles::get_article(&state.db, body.article_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("article {} not found", body.article_id)))?;

    let feedback_id = feedback::insert_feedback(
        &state.db,
        body.article_id,
        body.user_id.as_deref(),
        &body.feedback_text,
        category,
    )
    .await?;

    let delta = category.confidence_delta();
    let confidence = if delta == 0.0 {
        articles::get_article(&state.db, body.article_id)
            .await?
            .and_then(|a| a.confidence)
    } else {
        articles::adjust_confidence(&state.db, body.article_id, delta).await?
    };

    tracing::info!(
        article_id = body.article_id,
        category = category.as_str(),
        "feedback recorded"
    );

    Ok(super::envelope(json!({
        "feedback_id": feedback_id,
        "article_id": body.article_id,
        "confidence": confidence,
    })))
}

fn parse_category(raw: &str) -> Result<FeedbackCategory, ApiError> {
    match raw.to_lowercase().as_str() {
        "agree" => Ok(FeedbackCategory::Agree),
        "disagree" => Ok(FeedbackCategory::Disagree),
        "other" => Ok(FeedbackCategory::Other),
        _ => Err(ApiError::BadRequest(format!(
            "invalid category '{raw}', expected agree, disagree, or other"
        ))),
    }
}
