//! LLM scoring abstraction and HTTP implementation.
//!
//! Provides a trait-based seam for the ensemble orchestrator: one call
//! scores one article with one model and classifies every failure into the
//! closed [`LlmError`](crate::error::LlmError) taxonomy. The HTTP
//! implementation targets OpenAI-compatible chat completion endpoints and
//! owns API-key rotation.

pub mod openai_compat;
pub mod parser;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

use crate::error::ErrorKind;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

pub use openai_compat::HttpLlmScorer;

/// Input for one scoring call.
#[derive(Debug, Clone)]
pub struct ScoreRequest {
    /// Article headline.
    pub title: String,
    /// Article body text.
    pub content: String,
    /// Prompt variant selecting the system prompt.
    pub variant: String,
}

/// One model's verdict on one article.
///
/// `score == None` marks an invalid result: the model responded but the
/// value was missing, non-numeric, or non-finite. Out-of-range values are
/// clamped rather than invalidated.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelVerdict {
    /// Bias score in [-1, +1], or `None` for invalid.
    pub score: Option<f64>,
    /// Per-call confidence in [0, 1].
    pub confidence: f64,
}

impl ModelVerdict {
    /// The invalid sentinel verdict.
    pub fn invalid() -> Self {
        Self {
            score: None,
            confidence: 0.0,
        }
    }
}

/// Trait abstracting the LLM scoring operation.
///
/// Object-safe so the orchestrator can hold `Arc<dyn LlmScorer>` and tests
/// can inject scripted implementations.
#[async_trait::async_trait]
pub trait LlmScorer: Send + Sync {
    /// Score one article with one model.
    ///
    /// An unusable-but-delivered response is `Ok` with an invalid verdict;
    /// `Err` is reserved for the failure taxonomy.
    async fn score(
        &self,
        model: &str,
        request: &ScoreRequest,
    ) -> Result<ModelVerdict, crate::error::LlmError>;
}

/// The system prompt for a variant. Unrecognized variants fall back to the
/// default.
pub fn system_prompt(variant: &str) -> &'static str {
    match variant {
        "concise" => {
            "You rate the political bias of news articles. Reply with only a JSON object \
             {\"score\": s, \"confidence\": c} where s is in [-1, 1] (-1 far left, 0 neutral, \
             1 far right) and c is in [0, 1]."
        }
        _ => {
            "You are a media-bias analyst. Read the article and rate its political bias on a \
             scale from -1.0 (strongly left-leaning) through 0.0 (neutral) to +1.0 (strongly \
             right-leaning), considering framing, word choice, source selection, and emphasis. \
             Respond with a single JSON object of the form \
             {\"score\": <number in [-1, 1]>, \"confidence\": <number in [0, 1]>} and nothing else."
        }
    }
}

/// Build the user message for a scoring call.
pub fn user_prompt(request: &ScoreRequest) -> String {
    format!(
        "Title: {}\n\n{}\n\nRate the political bias of this article.",
        request.title, request.content
    )
}

/// Per-kind error counters for observability.
///
/// Counters only ever increase; a snapshot is exposed on the health
/// endpoint.
#[derive(Debug, Default)]
pub struct LlmMetrics {
    calls: AtomicU64,
    rate_limit: AtomicU64,
    authentication: AtomicU64,
    credits_exhausted: AtomicU64,
    input_invalid: AtomicU64,
    streaming: AtomicU64,
    server_transient: AtomicU64,
    network: AtomicU64,
    timeout: AtomicU64,
    unknown: AtomicU64,
}

/// Point-in-time view of [`LlmMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct LlmMetricsSnapshot {
    /// Total scoring calls attempted.
    pub calls: u64,
    /// Failures per error kind.
    pub errors: std::collections::BTreeMap<&'static str, u64>,
}

impl LlmMetrics {
    /// Record an attempted call.
    pub fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a classified failure.
    pub fn record_error(&self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::RateLimit => &self.rate_limit,
            ErrorKind::Authentication => &self.authentication,
            ErrorKind::CreditsExhausted => &self.credits_exhausted,
            ErrorKind::InputInvalid => &self.input_invalid,
            ErrorKind::Streaming => &self.streaming,
            ErrorKind::ServerTransient => &self.server_transient,
            ErrorKind::Network => &self.network,
            ErrorKind::Timeout => &self.timeout,
            _ => &self.unknown,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters.
    pub fn snapshot(&self) -> LlmMetricsSnapshot {
        let mut errors = std::collections::BTreeMap::new();
        errors.insert("RateLimit", self.rate_limit.load(Ordering::Relaxed));
        errors.insert(
            "Authentication",
            self.authentication.load(Ordering::Relaxed),
        );
        errors.insert(
            "CreditsExhausted",
            self.credits_exhausted.load(Ordering::Relaxed),
        );
        errors.insert("InputInvalid", self.input_invalid.load(Ordering::Relaxed));
        errors.insert("Streaming", self.streaming.load(Ordering::Relaxed));
        errors.insert(
            "ServerTransient",
            self.server_transient.load(Ordering::Relaxed),
        );
        errors.insert("Network", self.network.load(Ordering::Relaxed));
        errors.insert("Timeout", self.timeout.load(Ordering::Relaxed));
        errors.insert("Unknown", self.unknown.load(Ordering::Relaxed));

        LlmMetricsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_variant_falls_back_to_default_prompt() {
        assert_eq!(system_prompt("nope"), system_prompt("default"));
        assert_ne!(system_prompt("concise"), system_prompt("default"));
    }

    #[test]
    fn metrics_count_per_kind() {
        let metrics = LlmMetrics::default();
        metrics.record_call();
        metrics.record_call();
        metrics.record_error(ErrorKind::RateLimit);
        metrics.record_error(ErrorKind::RateLimit);
        metrics.record_error(ErrorKind::Network);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.calls, 2);
        assert_eq!(snapshot.errors["RateLimit"], 2);
        assert_eq!(snapshot.errors["Network"], 1);
        assert_eq!(snapshot.errors["Timeout"], 0);
    }
}
