//! Analysis trigger and progress streaming endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use newsbalancer_core::ensemble::AnalyzeOptions;
use newsbalancer_core::progress::{AnalysisStatus, ProgressErrorInfo, ProgressEvent, ProgressState};
use newsbalancer_core::storage::articles;

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// POST /llm/reanalyze/{id}
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
pub struct ReanalyzeRequest {
    /// Clear prior model scores before scoring.
    #[serde(default)]
    pub force: bool,
}

/// Enqueue an analysis. Returns 202 immediately; the job's outcome is
/// observable on the progress stream, even when it eventually fails.
/// The body is optional; an empty one means a plain (non-forced) run.
pub async fn reanalyze(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request: ReanalyzeRequest = if body.is_empty() {
        ReanalyzeRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?
    };
    let options = AnalyzeOptions {
        force: request.force,
    };

    let handle = state.orchestrator.analyze(id, options).await?;

    Ok((
        StatusCode::ACCEPTED,
        super::envelope(json!({
            "article_id": handle.article_id,
            "status": "queued",
        })),
    ))
}

// ---------------------------------------------------------------------------
// GET /llm/score-progress/{id}
// ---------------------------------------------------------------------------

/// The wire shape of one SSE progress event.
#[derive(Serialize)]
struct SseFrame<'a> {
    step: &'a str,
    percent: u8,
    status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ProgressErrorInfo>,
}

impl<'a> From<&'a ProgressState> for SseFrame<'a> {
    fn from(state: &'a ProgressState) -> Self {
        Self {
            step: &state.step,
            percent: state.percent,
            status: state.status,
            final_score: state.final_score,
            error: state.error.as_ref(),
        }
    }
}

/// Stream progress events for one article as server-sent events.
///
/// The current state (if any) is delivered first, then updates in publish
/// order. The connection closes after exactly one terminal event.
pub async fn score_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    // Unknown articles 404 instead of producing an empty stream.
    articles::get_article(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("article {id} not found")))?;

    let (snapshot, mut updates) = state.progress.subscribe(id);

    let stream = async_stream::stream! {
        if let Some(current) = snapshot {
            let terminal = current.status.is_terminal();
            yield Event::default().json_data(SseFrame::from(&current));
            if terminal {
                return;
            }
        }

        while let Some(event) = updates.next().await {
            match event {
                ProgressEvent::Update(update) => {
                    let terminal = update.status.is_terminal();
                    yield Event::default().json_data(SseFrame::from(&update));
                    if terminal {
                        return;
                    }
                }
                ProgressEvent::Dropped { missed } => {
                    yield Event::default().json_data(json!({ "dropped_events": missed }));
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ---------------------------------------------------------------------------
// GET /llm/score-progress/{id}/snapshot
// ---------------------------------------------------------------------------

/// Point-in-time progress for clients that poll instead of streaming.
pub async fn progress_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let snapshot = state
        .progress
        .snapshot(id)
        .ok_or_else(|| ApiError::NotFound(format!("no progress tracked for article {id}")))?;

    Ok(super::envelope(snapshot))
}
