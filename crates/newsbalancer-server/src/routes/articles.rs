//! Article listing and analysis read endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use newsbalancer_core::scoring::{self, RatedScore};
use newsbalancer_core::storage::articles::{Article, ArticleFilter};
use newsbalancer_core::storage::{articles, scores};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /articles
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListQuery {
    pub source: Option<String>,
    pub leaning: Option<String>,
    /// Accepted alias for `leaning`.
    pub bias: Option<String>,
    pub query: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page() -> u32 {
    1
}

#[derive(Serialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub source: String,
    pub url: String,
    pub title: String,
    pub pub_date: String,
    pub created_at: String,
    pub composite_score: Option<f64>,
    pub confidence: Option<f64>,
    pub summary: Option<String>,
    pub leaning: Option<String>,
}

fn summarize(article: Article, lean_threshold: f64) -> ArticleSummary {
    let leaning = article
        .composite_score
        .map(|s| scoring::lean_label(s, lean_threshold).to_string());
    ArticleSummary {
        id: article.id,
        source: article.source,
        url: article.url,
        title: article.title,
        pub_date: article.pub_date,
        created_at: article.created_at,
        composite_score: article.composite_score,
        confidence: article.confidence,
        summary: article.summary,
        leaning,
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let leaning = match q.leaning.as_deref().or(q.bias.as_deref()) {
        Some(raw) => Some(
            newsbalancer_core::scoring::Leaning::parse(raw).ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "invalid leaning '{raw}', expected Left, Center, or Right"
                ))
            })?,
        ),
        None => None,
    };

    let filter = ArticleFilter {
        source: q.source,
        leaning,
        query: q.query,
        page: q.page,
    };

    let threshold = state.orchestrator.current_config().lean_threshold;
    let (rows, has_more) = articles::list_articles(&state.db, &filter, threshold).await?;

    let list: Vec<ArticleSummary> = rows
        .into_iter()
        .map(|a| summarize(a, threshold))
        .collect();

    Ok(super::envelope(json!({
        "articles": list,
        "page": filter.page.max(1),
        "has_more": has_more,
    })))
}

// ---------------------------------------------------------------------------
// GET /articles/{id}
// ---------------------------------------------------------------------------

pub async fn detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let article = load_article(&state, id).await?;
    let config = state.orchestrator.current_config();
    let leaning = article
        .composite_score
        .map(|s| scoring::lean_label(s, config.lean_threshold).to_string());
    // The stricter label used in user-facing summaries.
    let strict_leaning = article
        .composite_score
        .map(|s| scoring::lean_label(s, config.confidence_threshold_label).to_string());

    Ok(super::envelope(json!({
        "article": article,
        "leaning": leaning,
        "strict_leaning": strict_leaning,
    })))
}

// ---------------------------------------------------------------------------
// GET /articles/{id}/bias
// ---------------------------------------------------------------------------

pub async fn bias(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let article = load_article(&state, id).await?;
    let rows = scores::list_scores(&state.db, id).await?;
    let threshold = state.orchestrator.current_config().lean_threshold;

    Ok(super::envelope(json!({
        "article_id": id,
        "composite_score": article.composite_score,
        "confidence": article.confidence,
        "leaning": article
            .composite_score
            .map(|s| scoring::lean_label(s, threshold).to_string()),
        "scores": rows,
    })))
}

// ---------------------------------------------------------------------------
// GET /articles/{id}/ensemble
// ---------------------------------------------------------------------------

pub async fn ensemble(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let article = load_article(&state, id).await?;
    let rows = scores::list_scores(&state.db, id).await?;

    let rated: Vec<RatedScore> = rows
        .into_iter()
        .map(|row| RatedScore {
            model: row.model,
            score: row.score,
            confidence: row.confidence,
        })
        .collect();

    let config = state.orchestrator.current_config();
    let perspectives = scoring::breakdown(&rated, &config)
        .map_err(|e| ApiError::Analysis(e.into()))?;

    Ok(super::envelope(json!({
        "article_id": id,
        "composite_score": article.composite_score,
        "confidence": article.confidence,
        "perspectives": perspectives,
    })))
}

async fn load_article(state: &AppState, id: i64) -> Result<Article, ApiError> {
    articles::get_article(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("article {id} not found")))
}
