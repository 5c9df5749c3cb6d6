//! Scripted scorer for orchestrator and API tests.

use super::{LlmScorer, ModelVerdict, ScoreRequest};
use crate::error::LlmError;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One scripted model response.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// A usable verdict (score, confidence).
    Score(f64, f64),
    /// A delivered response with no usable score.
    Invalid,
    /// HTTP 429 with an optional retry-after hint.
    RateLimited(Option<u64>),
    /// HTTP 401.
    AuthFailed,
    /// HTTP 402.
    CreditsExhausted,
    /// HTTP 5xx.
    ServerError(u16),
    /// Malformed response stream.
    StreamBroken,
}

impl ScriptedResponse {
    fn realize(&self) -> Result<ModelVerdict, LlmError> {
        match self {
            Self::Score(score, confidence) => Ok(ModelVerdict {
                score: Some(*score),
                confidence: *confidence,
            }),
            Self::Invalid => Ok(ModelVerdict::invalid()),
            Self::RateLimited(hint) => Err(LlmError::RateLimited {
                retry_after_secs: *hint,
            }),
            Self::AuthFailed => Err(LlmError::Authentication {
                message: "invalid key".to_string(),
            }),
            Self::CreditsExhausted => Err(LlmError::CreditsExhausted {
                message: "payment required".to_string(),
            }),
            Self::ServerError(status) => Err(LlmError::ServerTransient {
                status: *status,
                message: "upstream error".to_string(),
            }),
            Self::StreamBroken => Err(LlmError::Streaming {
                message: "premature close".to_string(),
            }),
        }
    }
}

/// An [`LlmScorer`] that replays scripted responses per model.
///
/// Responses for a model are consumed in order; the last one repeats for
/// any further calls. Models without a script fail as unknown.
#[derive(Default)]
pub struct ScriptedScorer {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedScorer {
    /// Create an empty scorer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, for cancellation tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Script a sequence of responses for a model.
    pub fn script(self, model: &str, responses: Vec<ScriptedResponse>) -> Self {
        self.scripts
            .lock()
            .expect("scorer lock")
            .insert(model.to_string(), responses.into());
        self
    }

    /// Total calls observed.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmScorer for ScriptedScorer {
    async fn score(
        &self,
        model: &str,
        _request: &ScoreRequest,
    ) -> Result<ModelVerdict, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = {
            let mut scripts = self.scripts.lock().expect("scorer lock");
            match scripts.get_mut(model) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match response {
            Some(scripted) => scripted.realize(),
            None => Err(LlmError::Unknown {
                status: None,
                message: format!("no script for model '{model}'"),
            }),
        }
    }
}
