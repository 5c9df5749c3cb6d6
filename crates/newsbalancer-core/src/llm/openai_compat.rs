//! OpenAI-compatible HTTP scorer.
//!
//! Works with OpenRouter, OpenAI, and any endpoint speaking the chat
//! completions format. Owns key rotation between the configured primary
//! and secondary API keys and classifies every failure into the closed
//! error taxonomy. Response bodies are redacted before they are embedded
//! in error messages.

use super::parser::parse_verdict;
use super::{user_prompt, LlmMetrics, LlmScorer, ModelVerdict, ScoreRequest};
use crate::config::LlmConfig;
use crate::error::{ErrorKind, LlmError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

/// LLM scorer speaking the OpenAI chat completions wire format.
pub struct HttpLlmScorer {
    client: reqwest::Client,
    base_url: String,
    keys: Mutex<KeyRing>,
    per_call_timeout: Duration,
    metrics: Arc<LlmMetrics>,
}

struct KeyRing {
    keys: Vec<String>,
    active: usize,
}

impl HttpLlmScorer {
    /// Create a scorer from the LLM config section.
    pub fn new(config: &LlmConfig) -> Self {
        Self::with_base_url(config, config.base_url.clone())
    }

    /// Create a scorer with a custom base URL (for testing).
    pub fn with_base_url(config: &LlmConfig, base_url: String) -> Self {
        let mut keys = vec![config.primary_api_key.clone()];
        if let Some(secondary) = &config.secondary_api_key {
            if !secondary.is_empty() {
                keys.push(secondary.clone());
            }
        }

        Self {
            client: reqwest::Client::new(),
            base_url,
            keys: Mutex::new(KeyRing { keys, active: 0 }),
            per_call_timeout: Duration::from_millis(config.per_call_timeout_ms),
            metrics: Arc::new(LlmMetrics::default()),
        }
    }

    /// Shared handle to the per-kind error counters.
    pub fn metrics(&self) -> Arc<LlmMetrics> {
        Arc::clone(&self.metrics)
    }

    fn active_key(&self) -> (String, usize) {
        let ring = self.keys.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        (ring.keys[ring.active].clone(), ring.active)
    }

    /// The other configured key, if any.
    fn standby_key(&self, used: usize) -> Option<(String, usize)> {
        let ring = self.keys.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if ring.keys.len() < 2 {
            return None;
        }
        let idx = 1 - used;
        Some((ring.keys[idx].clone(), idx))
    }

    fn set_active(&self, idx: usize) {
        let mut ring = self.keys.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if idx < ring.keys.len() && ring.active != idx {
            tracing::info!(key_index = idx, "switched active LLM API key");
            ring.active = idx;
        }
    }

    async fn request_once(
        &self,
        model: &str,
        request: &ScoreRequest,
        api_key: &str,
    ) -> Result<ModelVerdict, LlmError> {
        let user_message = user_prompt(request);
        let body = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: super::system_prompt(&request.variant),
                },
                ChatMessage {
                    role: "user",
                    content: &user_message,
                },
            ],
            max_tokens: 128,
            temperature: 0.0,
        };

        tracing::debug!(model, variant = %request.variant, "LLM scoring request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .timeout(self.per_call_timeout)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, &text));
        }

        let text = response.text().await.map_err(classify_transport)?;
        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Streaming {
                message: format!("malformed completion body: {e}"),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Streaming {
                message: "completion contained no choices".to_string(),
            })?;

        let verdict = parse_verdict(&content);
        if verdict.score.is_none() {
            tracing::debug!(model, "model response did not contain a usable score");
        }

        Ok(verdict)
    }
}

#[async_trait::async_trait]
impl LlmScorer for HttpLlmScorer {
    async fn score(
        &self,
        model: &str,
        request: &ScoreRequest,
    ) -> Result<ModelVerdict, LlmError> {
        self.metrics.record_call();

        let (key, key_idx) = self.active_key();
        let first = self.request_once(model, request, &key).await;

        let err = match first {
            Ok(verdict) => return Ok(verdict),
            Err(e) => e,
        };

        // On rate-limit or auth failures the standby key is retried once
        // with the same request before the error surfaces.
        if matches!(err.kind(), ErrorKind::RateLimit | ErrorKind::Authentication) {
            if let Some((standby, standby_idx)) = self.standby_key(key_idx) {
                self.metrics.record_error(err.kind());
                tracing::warn!(model, kind = %err.kind(), "retrying with standby API key");

                match self.request_once(model, request, &standby).await {
                    Ok(verdict) => {
                        self.set_active(standby_idx);
                        return Ok(verdict);
                    }
                    Err(second) => {
                        self.metrics.record_error(second.kind());
                        return Err(second);
                    }
                }
            }
        }

        self.metrics.record_error(err.kind());
        Err(err)
    }
}

/// Map an HTTP error status onto the taxonomy.
fn classify_status(status: u16, retry_after: Option<u64>, body: &str) -> LlmError {
    match status {
        429 => LlmError::RateLimited {
            retry_after_secs: retry_after,
        },
        401 => LlmError::Authentication {
            message: redact(body),
        },
        402 => LlmError::CreditsExhausted {
            message: redact(body),
        },
        400 => LlmError::InputInvalid {
            message: redact(body),
        },
        500..=599 => LlmError::ServerTransient {
            status,
            message: redact(body),
        },
        _ => LlmError::Unknown {
            status: Some(status),
            message: redact(body),
        },
    }
}

/// Map a transport-level failure onto the taxonomy.
fn classify_transport(error: reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout
    } else if error.is_decode() || error.is_body() {
        LlmError::Streaming {
            message: error.to_string(),
        }
    } else {
        LlmError::Network { source: error }
    }
}

/// Replace API-key-shaped tokens in provider text before it leaves the
/// service.
pub fn redact(text: &str) -> String {
    static KEY_PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    let pattern = KEY_PATTERN.get_or_init(|| {
        regex::Regex::new(r"(?i)(sk-[A-Za-z0-9_-]{8,}|bearer\s+[A-Za-z0-9._~+/=-]{8,})")
            .expect("redaction pattern is valid")
    });

    pattern.replace_all(text, "[redacted]").into_owned()
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}
