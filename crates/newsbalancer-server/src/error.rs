//! API error types for the NewsBalancer server.
//!
//! Maps core domain errors to HTTP status codes and the uniform response
//! envelope. Every error response carries a correlation id that also
//! appears on a log line.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use newsbalancer_core::error::{AnalysisError, ErrorKind, StorageError};
use serde_json::json;

/// Default Retry-After seconds for transient failures without a provider
/// hint.
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// API error type for route handlers.
pub enum ApiError {
    /// Internal storage/database error.
    Storage(StorageError),
    /// Analysis could not be started or failed synchronously.
    Analysis(AnalysisError),
    /// Requested resource not found.
    NotFound(String),
    /// Bad request (invalid parameters or body).
    BadRequest(String),
    /// Conflict with existing state.
    Conflict(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        Self::Analysis(err)
    }
}

impl ApiError {
    fn parts(&self) -> (ErrorKind, String, Option<u64>) {
        match self {
            Self::Storage(e) => (ErrorKind::PersistenceFailed, e.to_string(), None),
            Self::Analysis(e) => {
                // RateLimit carries the provider hint; other transient
                // kinds default to a flat backoff.
                let retry_after = if e.kind().is_transient() {
                    Some(e.retry_after_secs().unwrap_or(DEFAULT_RETRY_AFTER_SECS))
                } else {
                    None
                };
                (e.kind(), e.to_string(), retry_after)
            }
            Self::NotFound(msg) => (ErrorKind::NotFound, msg.clone(), None),
            Self::BadRequest(msg) => (ErrorKind::InputInvalid, msg.clone(), None),
            Self::Conflict(msg) => (ErrorKind::Conflict, msg.clone(), None),
        }
    }
}

/// HTTP status for a wire error code: transient kinds are 503 so clients
/// retry, permanent kinds are 4xx, store failures are 500.
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InputInvalid => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::Canceled => StatusCode::CONFLICT,
        ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
        ErrorKind::CreditsExhausted => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::CalculationFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::RateLimit
        | ErrorKind::Streaming
        | ErrorKind::ServerTransient
        | ErrorKind::Network
        | ErrorKind::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::PersistenceFailed | ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (kind, message, retry_after) = self.parts();
        let status = status_for(kind);
        let correlation_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(%correlation_id, code = kind.as_code(), "api error: {message}");
        } else {
            tracing::debug!(%correlation_id, code = kind.as_code(), "api error: {message}");
        }

        let body = axum::Json(json!({
            "success": false,
            "error": {
                "code": kind.as_code(),
                "message": message,
                "details": { "correlation_id": correlation_id },
            },
        }));

        match retry_after {
            Some(secs) => (
                status,
                [(header::RETRY_AFTER, secs.to_string())],
                body,
            )
                .into_response(),
            None => (status, body).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_map_to_service_unavailable() {
        assert_eq!(status_for(ErrorKind::RateLimit), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(ErrorKind::Network), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(ErrorKind::Timeout), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn permanent_kinds_map_to_client_errors() {
        assert_eq!(status_for(ErrorKind::InputInvalid), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Authentication), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(ErrorKind::CreditsExhausted),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status_for(ErrorKind::CalculationFailed),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
