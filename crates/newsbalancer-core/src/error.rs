//! Error types for the NewsBalancer core library.
//!
//! Each module has its own error enum to provide clear error boundaries.
//! The library uses `thiserror` for structured, typed errors. The wire-level
//! error codes carried on API responses live in [`ErrorKind`].

use serde::{Deserialize, Serialize};

/// Stable error codes carried on the wire and in progress records.
///
/// Every domain error maps onto exactly one of these codes; HTTP handlers
/// and SSE clients pattern-match on the code, never on error message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Request or article content is malformed or empty.
    InputInvalid,
    /// The referenced entity does not exist.
    NotFound,
    /// The operation conflicts with existing state.
    Conflict,
    /// Provider rate limit hit.
    RateLimit,
    /// Provider rejected the configured credentials.
    Authentication,
    /// Provider account has no remaining credits.
    CreditsExhausted,
    /// Response stream was malformed or closed prematurely.
    Streaming,
    /// Provider returned a 5xx response.
    ServerTransient,
    /// Transport-level failure.
    Network,
    /// A deadline expired.
    Timeout,
    /// The operation was canceled by the caller.
    Canceled,
    /// The score calculator could not produce a composite.
    CalculationFailed,
    /// A store write failed.
    PersistenceFailed,
    /// Anything that does not fit the taxonomy.
    Unknown,
}

impl ErrorKind {
    /// The stable string code for this kind.
    pub fn as_code(self) -> &'static str {
        match self {
            Self::InputInvalid => "InputInvalid",
            Self::NotFound => "NotFound",
            Self::Conflict => "Conflict",
            Self::RateLimit => "RateLimit",
            Self::Authentication => "Authentication",
            Self::CreditsExhausted => "CreditsExhausted",
            Self::Streaming => "Streaming",
            Self::ServerTransient => "ServerTransient",
            Self::Network => "Network",
            Self::Timeout => "Timeout",
            Self::Canceled => "Canceled",
            Self::CalculationFailed => "CalculationFailed",
            Self::PersistenceFailed => "PersistenceFailed",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether a retry may succeed without operator intervention.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::RateLimit
                | Self::Streaming
                | Self::ServerTransient
                | Self::Network
                | Self::Timeout
                | Self::Unknown
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Errors related to configuration loading, parsing, and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration field is absent.
    #[error("missing required config field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration field has an unacceptable value.
    #[error("invalid value for config field '{field}': {message}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// A description of why the value is invalid.
        message: String,
    },

    /// The configuration file does not exist at the specified path.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The path that was searched.
        path: String,
    },

    /// TOML deserialization failed.
    #[error("failed to parse config file: {source}")]
    ParseError {
        /// The underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from calling an LLM provider to score an article.
///
/// This is a closed taxonomy: the HTTP layer classifies every provider
/// response into exactly one variant, and callers only pattern-match.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Provider rate limit hit (HTTP 429 or rate-limit body).
    #[error("LLM rate limited{}", match .retry_after_secs {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    })]
    RateLimited {
        /// Seconds to wait before retrying, if provided by the API.
        retry_after_secs: Option<u64>,
    },

    /// Provider rejected the API key (HTTP 401).
    #[error("LLM authentication failed: {message}")]
    Authentication {
        /// Sanitized provider message.
        message: String,
    },

    /// Provider account is out of credits (HTTP 402).
    #[error("LLM credits exhausted: {message}")]
    CreditsExhausted {
        /// Sanitized provider message.
        message: String,
    },

    /// The prompt or request was rejected as malformed (HTTP 400).
    #[error("LLM rejected request as invalid: {message}")]
    InputInvalid {
        /// Sanitized provider message.
        message: String,
    },

    /// The response body or stream was malformed or closed prematurely.
    #[error("LLM response stream error: {message}")]
    Streaming {
        /// Description of the parse or framing failure.
        message: String,
    },

    /// Provider returned a 5xx response.
    #[error("LLM server error (HTTP {status}): {message}")]
    ServerTransient {
        /// The HTTP status code.
        status: u16,
        /// Sanitized provider message.
        message: String,
    },

    /// Transport-level failure reaching the provider.
    #[error("LLM network error: {source}")]
    Network {
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The per-call deadline expired.
    #[error("LLM call timed out")]
    Timeout,

    /// Any other provider response.
    #[error("LLM error{}: {message}", match .status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    })]
    Unknown {
        /// The HTTP status code, if the failure came from a response.
        status: Option<u16>,
        /// Sanitized provider message.
        message: String,
    },
}

impl LlmError {
    /// The wire-level code for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::CreditsExhausted { .. } => ErrorKind::CreditsExhausted,
            Self::InputInvalid { .. } => ErrorKind::InputInvalid,
            Self::Streaming { .. } => ErrorKind::Streaming,
            Self::ServerTransient { .. } => ErrorKind::ServerTransient,
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout => ErrorKind::Timeout,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Whether the orchestrator may retry this call.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_transient()
    }

    /// The provider's retry-after hint, when one was supplied.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }
}

/// Errors from SQLite storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to connect to the SQLite database.
    #[error("database connection error: {source}")]
    Connection {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// Database migration failed.
    #[error("database migration error: {source}")]
    Migration {
        /// The underlying migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    /// A database query failed.
    #[error("database query error: {source}")]
    Query {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },
}

/// Errors from the composite score calculator.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    /// An invalid model score was encountered under the `fail` policy.
    #[error("composite calculation failed: {message}")]
    CalculationFailed {
        /// Which score or perspective aborted the computation.
        message: String,
    },
}

/// Errors surfaced by the ensemble orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The article does not exist.
    #[error("article {id} not found")]
    NotFound {
        /// The requested article id.
        id: i64,
    },

    /// The article has no content to score.
    #[error("article {id} has empty content")]
    EmptyContent {
        /// The requested article id.
        id: i64,
    },

    /// The overall job deadline expired.
    #[error("analysis timed out after {seconds}s")]
    Timeout {
        /// The configured deadline in seconds.
        seconds: u64,
    },

    /// The job was canceled via its handle.
    #[error("analysis canceled")]
    Canceled,

    /// Every perspective exhausted its fall-back chain.
    #[error("no perspective produced a valid score")]
    AllPerspectivesFailed {
        /// The dominant failure kind across perspectives.
        kind: ErrorKind,
        /// Provider retry hint, when the dominant failure was a rate limit.
        retry_after_secs: Option<u64>,
    },

    /// Composite computation aborted.
    #[error(transparent)]
    Calculation(#[from] ScoringError),

    /// Persisting results failed; the previous composite is untouched.
    #[error("failed to persist analysis results: {source}")]
    Persistence {
        /// The underlying storage error.
        #[source]
        source: StorageError,
    },

    /// A read from the store failed before any results were written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AnalysisError {
    /// The wire-level code for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::EmptyContent { .. } => ErrorKind::InputInvalid,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Canceled => ErrorKind::Canceled,
            Self::AllPerspectivesFailed { kind, .. } => *kind,
            Self::Calculation(_) => ErrorKind::CalculationFailed,
            Self::Persistence { .. } => ErrorKind::PersistenceFailed,
            Self::Storage(_) => ErrorKind::PersistenceFailed,
        }
    }

    /// The provider's retry hint, when one survived aggregation.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::AllPerspectivesFailed {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

/// Errors from fetching and parsing RSS feeds.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// HTTP request for the feed failed.
    #[error("feed fetch failed: {source}")]
    Http {
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body exceeded the configured size limit.
    #[error("feed exceeds size limit of {limit} bytes")]
    TooLarge {
        /// The configured byte cap.
        limit: u64,
    },

    /// The feed body was not parseable as RSS.
    #[error("feed parse error: {source}")]
    Parse {
        /// The underlying RSS parse error.
        #[source]
        source: rss::Error,
    },

    /// A store operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_codes_are_stable() {
        assert_eq!(ErrorKind::RateLimit.as_code(), "RateLimit");
        assert_eq!(ErrorKind::CreditsExhausted.as_code(), "CreditsExhausted");
        assert_eq!(ErrorKind::CalculationFailed.as_code(), "CalculationFailed");
        assert_eq!(ErrorKind::PersistenceFailed.as_code(), "PersistenceFailed");
    }

    #[test]
    fn transient_kinds_match_taxonomy() {
        assert!(ErrorKind::RateLimit.is_transient());
        assert!(ErrorKind::Streaming.is_transient());
        assert!(ErrorKind::ServerTransient.is_transient());
        assert!(ErrorKind::Network.is_transient());
        assert!(ErrorKind::Timeout.is_transient());
        assert!(ErrorKind::Unknown.is_transient());

        assert!(!ErrorKind::Authentication.is_transient());
        assert!(!ErrorKind::CreditsExhausted.is_transient());
        assert!(!ErrorKind::InputInvalid.is_transient());
        assert!(!ErrorKind::CalculationFailed.is_transient());
    }

    #[test]
    fn llm_error_rate_limited_with_retry_message() {
        let err = LlmError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "LLM rate limited, retry after 30s");
        assert_eq!(err.retry_after_secs(), Some(30));
        assert!(err.is_retryable());
    }

    #[test]
    fn llm_error_rate_limited_without_retry_message() {
        let err = LlmError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "LLM rate limited");
        assert_eq!(err.retry_after_secs(), None);
    }

    #[test]
    fn llm_error_authentication_is_permanent() {
        let err = LlmError::Authentication {
            message: "invalid key".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(!err.is_retryable());
    }

    #[test]
    fn llm_error_unknown_message_with_status() {
        let err = LlmError::Unknown {
            status: Some(418),
            message: "teapot".to_string(),
        };
        assert_eq!(err.to_string(), "LLM error (HTTP 418): teapot");
    }

    #[test]
    fn analysis_error_kinds() {
        assert_eq!(
            AnalysisError::NotFound { id: 7 }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AnalysisError::EmptyContent { id: 7 }.kind(),
            ErrorKind::InputInvalid
        );
        assert_eq!(AnalysisError::Canceled.kind(), ErrorKind::Canceled);
        let failed = AnalysisError::AllPerspectivesFailed {
            kind: ErrorKind::RateLimit,
            retry_after_secs: Some(5),
        };
        assert_eq!(failed.kind(), ErrorKind::RateLimit);
        assert_eq!(failed.retry_after_secs(), Some(5));
    }

    #[test]
    fn config_error_missing_field_message() {
        let err = ConfigError::MissingField {
            field: "llm.primary_api_key".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing required config field: llm.primary_api_key"
        );
    }
}
