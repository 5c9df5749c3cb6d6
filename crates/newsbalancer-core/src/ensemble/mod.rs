//! Ensemble orchestrator: per-article analysis jobs.
//!
//! One job fans an article out across the configured perspectives, runs
//! each perspective's model fall-back chain, aggregates the resulting
//! scores into a composite, and persists it. Jobs are single-flight per
//! article: a second request while one is running returns the in-flight
//! handle. Progress is published through the
//! [`ProgressManager`](crate::progress::ProgressManager); callers observe
//! it over SSE or by polling.

pub mod retry;


use crate::config::{CompositeScoreConfig, Config, PerspectiveConfig};
use crate::error::{AnalysisError, ErrorKind, StorageError};
use crate::llm::{LlmScorer, ScoreRequest};
use crate::progress::{ProgressManager, ProgressState};
use crate::scoring::{self, Composite, RatedScore};
use crate::storage::articles::Article;
use crate::storage::{articles, scores, DbPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Options for one analysis request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {
    /// Clear prior model scores before scoring.
    pub force: bool,
}

/// Handle to a running (or finished) analysis job.
#[derive(Clone, Debug)]
pub struct JobHandle {
    /// The article under analysis.
    pub article_id: i64,
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

impl JobHandle {
    /// Abort the job. In-flight model calls are dropped; completed
    /// perspectives keep their persisted scores.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the job has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        *self.done.borrow()
    }

    /// Wait until the job reaches a terminal state.
    pub async fn wait(&self) {
        let mut done = self.done.clone();
        while !*done.borrow() {
            if done.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Orchestrates ensemble analyses across articles.
pub struct Orchestrator {
    db: DbPool,
    scorer: Arc<dyn LlmScorer>,
    progress: Arc<ProgressManager>,
    composite: std::sync::RwLock<Arc<CompositeScoreConfig>>,
    per_call_timeout: Duration,
    prompt_variant: String,
    jobs: Arc<Mutex<HashMap<i64, JobHandle>>>,
}

impl Orchestrator {
    /// Create an orchestrator over the given store, scorer, and progress
    /// registry.
    pub fn new(
        db: DbPool,
        scorer: Arc<dyn LlmScorer>,
        progress: Arc<ProgressManager>,
        config: &Config,
    ) -> Self {
        Self {
            db,
            scorer,
            progress,
            composite: std::sync::RwLock::new(Arc::new(config.composite.clone())),
            per_call_timeout: Duration::from_millis(config.llm.per_call_timeout_ms),
            prompt_variant: config.llm.prompt_variant.clone(),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The composite config new jobs will snapshot. In-flight jobs keep
    /// the config they started with.
    pub fn current_config(&self) -> Arc<CompositeScoreConfig> {
        Arc::clone(
            &self
                .composite
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }

    /// Swap in a reloaded composite config for future jobs.
    pub fn swap_config(&self, config: CompositeScoreConfig) {
        *self
            .composite
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Arc::new(config);
    }

    /// Start analyzing an article in the background.
    ///
    /// Returns immediately with a job handle. At most one analysis runs
    /// per article id; a request for an already-running article returns
    /// the existing handle. Missing articles and empty content fail
    /// synchronously so the HTTP layer can answer 4xx; everything later is
    /// observable only through progress.
    pub async fn analyze(
        &self,
        article_id: i64,
        options: AnalyzeOptions,
    ) -> Result<JobHandle, AnalysisError> {
        let article = articles::get_article(&self.db, article_id)
            .await?
            .ok_or(AnalysisError::NotFound { id: article_id })?;

        if article.content.trim().is_empty() {
            return Err(AnalysisError::EmptyContent { id: article_id });
        }

        let mut jobs = self.jobs.lock().await;
        if let Some(handle) = jobs.get(&article_id) {
            if !handle.is_finished() {
                tracing::debug!(article_id, "analysis already in flight, reusing handle");
                return Ok(handle.clone());
            }
        }

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        let handle = JobHandle {
            article_id,
            cancel: cancel.clone(),
            done: done_rx,
        };
        jobs.insert(article_id, handle.clone());
        drop(jobs);

        let ctx = JobCtx {
            db: self.db.clone(),
            scorer: Arc::clone(&self.scorer),
            progress: Arc::clone(&self.progress),
            config: self.current_config(),
            per_call_timeout: self.per_call_timeout,
            prompt_variant: self.prompt_variant.clone(),
            article,
            force: options.force,
            cancel,
        };
        let jobs_map = Arc::clone(&self.jobs);

        tokio::spawn(async move {
            run_job(ctx).await;
            jobs_map.lock().await.remove(&article_id);
            let _ = done_tx.send(true);
        });

        Ok(handle)
    }

    /// Cancel an in-flight analysis. Returns whether a job was running.
    pub async fn cancel(&self, article_id: i64) -> bool {
        let jobs = self.jobs.lock().await;
        match jobs.get(&article_id) {
            Some(handle) if !handle.is_finished() => {
                handle.cancel();
                true
            }
            _ => false,
        }
    }
}

struct JobCtx {
    db: DbPool,
    scorer: Arc<dyn LlmScorer>,
    progress: Arc<ProgressManager>,
    config: Arc<CompositeScoreConfig>,
    per_call_timeout: Duration,
    prompt_variant: String,
    article: Article,
    force: bool,
    cancel: CancellationToken,
}

/// Drive one analysis to a terminal progress state.
async fn run_job(ctx: JobCtx) {
    let article_id = ctx.article.id;

    ctx.progress.publish(ProgressState::queued(article_id));
    ctx.progress
        .publish(ProgressState::in_progress(article_id, "ensemble: starting", 0));

    let deadline = Duration::from_millis(ctx.config.per_job_timeout_ms);
    let outcome = tokio::select! {
        () = ctx.cancel.cancelled() => Err(AnalysisError::Canceled),
        result = tokio::time::timeout(deadline, execute(&ctx)) => match result {
            Ok(inner) => inner,
            Err(_) => Err(AnalysisError::Timeout {
                seconds: deadline.as_secs(),
            }),
        }
    };

    match outcome {
        Ok(composite) => {
            tracing::info!(
                article_id,
                score = composite.score,
                confidence = composite.confidence,
                valid = composite.valid_perspectives,
                total = composite.total_perspectives,
                "analysis complete"
            );
            ctx.progress
                .publish(ProgressState::complete(article_id, composite.score));
        }
        Err(err) => {
            tracing::warn!(article_id, error = %err, code = %err.kind(), "analysis failed");
            ctx.progress.publish(
                ProgressState::error(article_id, err.kind(), err.to_string())
                    .with_retry_after(err.retry_after_secs()),
            );
        }
    }
}

/// Fan out perspectives, then compute and persist the composite.
async fn execute(ctx: &JobCtx) -> Result<Composite, AnalysisError> {
    let article_id = ctx.article.id;

    if ctx.force {
        scores::delete_scores(&ctx.db, article_id).await?;
    }

    let total = ctx.config.perspectives.len();
    let parallelism = ctx.config.max_parallel_perspectives.min(total.max(1));
    let semaphore = Arc::new(Semaphore::new(parallelism));
    // Rate-limit patience is shared across the whole job.
    let budget = Arc::new(Mutex::new(ctx.config.rate_limit_budget_ms));

    let mut set: JoinSet<PerspectiveOutcome> = JoinSet::new();
    for (index, perspective) in ctx.config.perspectives.iter().enumerate() {
        let task = PerspectiveTask {
            db: ctx.db.clone(),
            scorer: Arc::clone(&ctx.scorer),
            perspective: perspective.clone(),
            index,
            article_id,
            request: ScoreRequest {
                title: ctx.article.title.clone(),
                content: ctx.article.content.clone(),
                variant: ctx.prompt_variant.clone(),
            },
            per_call_timeout: ctx.per_call_timeout,
            budget: Arc::clone(&budget),
            cancel: ctx.cancel.clone(),
        };
        let semaphore = Arc::clone(&semaphore);

        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            run_perspective(task).await
        });
    }

    let mut completed = 0usize;
    let mut failures: Vec<(usize, ErrorKind, Option<u64>)> = Vec::new();

    while let Some(joined) = set.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(join_err) => {
                tracing::error!(article_id, error = %join_err, "perspective task failed to join");
                continue;
            }
        };

        completed += 1;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = ((100.0 * completed as f64) / total as f64).round() as u8;
        ctx.progress.publish(ProgressState::in_progress(
            article_id,
            format!("ensemble: {} {completed}/{total}", outcome.name),
            percent,
        ));

        if let Some(kind) = outcome.error {
            failures.push((outcome.index, kind, outcome.retry_after));
        }
    }

    // Compute and persist atomically against the score set just written.
    let mut tx = ctx
        .db
        .begin()
        .await
        .map_err(|e| AnalysisError::Persistence {
            source: StorageError::Query { source: e },
        })?;

    let rows = scores::list_scores(&mut *tx, article_id).await?;
    let rated: Vec<RatedScore> = rows
        .into_iter()
        .map(|row| RatedScore {
            model: row.model,
            score: row.score,
            confidence: row.confidence,
        })
        .collect();

    let mut composite = scoring::compute(&rated, &ctx.config)?;

    if composite.valid_perspectives == 0 {
        let (kind, retry_after_secs) = failures
            .iter()
            .min_by_key(|(index, _, _)| *index)
            .map_or((ErrorKind::Unknown, None), |(_, kind, hint)| (*kind, *hint));
        return Err(AnalysisError::AllPerspectivesFailed {
            kind,
            retry_after_secs,
        });
    }

    composite.score = scoring::round4(composite.score);
    composite.confidence = scoring::round4(composite.confidence);

    articles::set_composite(&mut *tx, article_id, composite.score, composite.confidence)
        .await
        .map_err(|e| AnalysisError::Persistence { source: e })?;

    tx.commit().await.map_err(|e| AnalysisError::Persistence {
        source: StorageError::Query { source: e },
    })?;

    Ok(composite)
}

struct PerspectiveTask {
    db: DbPool,
    scorer: Arc<dyn LlmScorer>,
    perspective: PerspectiveConfig,
    index: usize,
    article_id: i64,
    request: ScoreRequest,
    per_call_timeout: Duration,
    budget: Arc<Mutex<u64>>,
    cancel: CancellationToken,
}

struct PerspectiveOutcome {
    index: usize,
    name: String,
    /// `None` when a usable score was persisted.
    error: Option<ErrorKind>,
    /// Provider retry hint from the last rate-limit failure, if any.
    retry_after: Option<u64>,
}

/// Run one perspective's fall-back chain and persist its result.
///
/// Models are tried in order; the first delivered response wins, even if
/// it parses as invalid. Permanent failures abandon the chain. A chain
/// exhausted without any delivered response contributes the invalid
/// sentinel so the article never blocks on one perspective.
async fn run_perspective(task: PerspectiveTask) -> PerspectiveOutcome {
    let name = task.perspective.name.clone();
    let mut last_kind = None;
    let mut last_retry_after = None;

    for model in &task.perspective.models {
        match try_model(&task, model).await {
            Ok((verdict, latency_ms)) => {
                if task.cancel.is_cancelled() {
                    // Canceled before completion: leave no row behind.
                    return PerspectiveOutcome {
                        index: task.index,
                        name,
                        error: Some(ErrorKind::Canceled),
                        retry_after: None,
                    };
                }

                let metadata = serde_json::json!({
                    "variant": task.request.variant,
                    "latency_ms": latency_ms,
                })
                .to_string();

                if let Err(err) = scores::upsert_score(
                    &task.db,
                    task.article_id,
                    model,
                    verdict.score,
                    verdict.confidence,
                    Some(&metadata),
                )
                .await
                {
                    tracing::error!(
                        article_id = task.article_id,
                        model,
                        error = %err,
                        "failed to persist model score"
                    );
                    return PerspectiveOutcome {
                        index: task.index,
                        name,
                        error: Some(ErrorKind::PersistenceFailed),
                        retry_after: None,
                    };
                }

                let error = if verdict.score.is_some() {
                    None
                } else {
                    Some(ErrorKind::InputInvalid)
                };
                return PerspectiveOutcome {
                    index: task.index,
                    name,
                    error,
                    retry_after: None,
                };
            }
            Err(err) => {
                let kind = err.kind();
                last_kind = Some(kind);
                if kind == ErrorKind::RateLimit {
                    last_retry_after = err.retry_after_secs();
                }
                tracing::warn!(
                    article_id = task.article_id,
                    perspective = %name,
                    model,
                    error = %err,
                    "model failed"
                );

                if matches!(
                    kind,
                    ErrorKind::Authentication
                        | ErrorKind::CreditsExhausted
                        | ErrorKind::InputInvalid
                ) {
                    // Permanent for this perspective: abandon the chain.
                    break;
                }
            }
        }
    }

    // Chain exhausted: record the invalid sentinel under the primary model
    // so the score set reflects the attempt.
    if !task.cancel.is_cancelled() {
        if let Some(primary) = task.perspective.models.first() {
            let metadata = serde_json::json!({
                "variant": task.request.variant,
                "exhausted": true,
            })
            .to_string();
            if let Err(err) = scores::upsert_score(
                &task.db,
                task.article_id,
                primary,
                None,
                0.0,
                Some(&metadata),
            )
            .await
            {
                tracing::error!(
                    article_id = task.article_id,
                    model = %primary,
                    error = %err,
                    "failed to persist invalid sentinel"
                );
            }
        }
    }

    PerspectiveOutcome {
        index: task.index,
        name,
        error: Some(last_kind.unwrap_or(ErrorKind::Unknown)),
        retry_after: last_retry_after,
    }
}

/// Call one model with the per-call deadline and the retry policy:
/// rate limits sleep the provider hint against the shared job budget,
/// transient failures back off up to [`retry::MAX_TRANSIENT_RETRIES`]
/// times, unknown failures retry once, permanent failures surface
/// immediately.
async fn try_model(
    task: &PerspectiveTask,
    model: &str,
) -> Result<(crate::llm::ModelVerdict, u64), crate::error::LlmError> {
    let mut transient_attempts = 0u32;
    let mut unknown_attempts = 0u32;

    loop {
        let started = Instant::now();
        let result =
            tokio::time::timeout(task.per_call_timeout, task.scorer.score(model, &task.request))
                .await;

        let err = match result {
            Ok(Ok(verdict)) => {
                #[allow(clippy::cast_possible_truncation)]
                let latency_ms = started.elapsed().as_millis() as u64;
                return Ok((verdict, latency_ms));
            }
            Ok(Err(err)) => err,
            Err(_) => crate::error::LlmError::Timeout,
        };

        match err.kind() {
            ErrorKind::RateLimit => {
                let hint_ms = err
                    .retry_after_secs()
                    .unwrap_or(retry::DEFAULT_RATE_LIMIT_HINT_SECS)
                    .saturating_mul(1000);

                let granted = {
                    let mut remaining = task.budget.lock().await;
                    if *remaining >= hint_ms {
                        *remaining -= hint_ms;
                        true
                    } else {
                        false
                    }
                };

                if !granted {
                    // Budget exhausted: advance to the next fall-back.
                    return Err(err);
                }
                tracing::debug!(model, wait_ms = hint_ms, "honoring rate-limit hint");
                tokio::time::sleep(Duration::from_millis(hint_ms)).await;
            }
            ErrorKind::Streaming
            | ErrorKind::Network
            | ErrorKind::ServerTransient
            | ErrorKind::Timeout => {
                transient_attempts += 1;
                if transient_attempts > retry::MAX_TRANSIENT_RETRIES {
                    return Err(err);
                }
                tokio::time::sleep(retry::backoff_delay(transient_attempts)).await;
            }
            ErrorKind::Unknown => {
                unknown_attempts += 1;
                if unknown_attempts > 1 {
                    return Err(err);
                }
                tokio::time::sleep(retry::backoff_delay(1)).await;
            }
            _ => return Err(err),
        }
    }
}
