//! Error types for web handlers.
//!
//! Bridges [`DispatchError`] to HTTP responses with a stable JSON body:
//!
//! ```json
//! { "code": "ALREADY_ACCEPTED", "message": "..." }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use emergency_core::DispatchError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// Carries the HTTP status, a machine-readable code and a user-facing
/// message. Server errors keep their cause in `source` for logging; the
/// cause is never written to the response body.
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400, malformed request (bad JSON, bad path or query).
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// 400, well-formed request that fails domain validation.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "VALIDATION_ERROR")
    }

    /// 404.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND",
        )
    }

    /// 409 with an explicit code.
    #[must_use]
    pub fn conflict(message: impl Into<String>, code: &'static str) -> Self {
        Self::new(StatusCode::CONFLICT, message, code)
    }

    /// 500.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            "INTERNAL_SERVER_ERROR",
        )
    }

    /// HTTP status this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: &'static str,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        } else {
            tracing::debug!(
                status = %self.status,
                code = self.code,
                message = %self.message,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match err {
            DispatchError::Validation(reason) => Self::validation(reason),
            DispatchError::NotFound(id) => Self::not_found("Emergency request", id),
            DispatchError::InvalidTransition { .. } => {
                Self::conflict(message, "INVALID_TRANSITION")
            },
            DispatchError::AlreadyAccepted(_) => Self::conflict(message, "ALREADY_ACCEPTED"),
            DispatchError::ConcurrentModification(_) => {
                Self::conflict(message, "CONCURRENT_MODIFICATION")
            },
            DispatchError::Store(_) => {
                Self::internal("An internal error occurred").with_source(anyhow::Error::new(err))
            },
        }
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emergency_core::RequestId;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_not_found() {
        let id = RequestId::new();
        let err = AppError::from(DispatchError::NotFound(id));
        assert_eq!(
            err.to_string(),
            format!("[NOT_FOUND] Emergency request with id {id} not found")
        );
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_is_bad_request() {
        let err = AppError::from(DispatchError::Validation("latitude is required".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_conflicts_keep_distinct_codes() {
        let id = RequestId::new();
        let cases = [
            (
                DispatchError::invalid_transition(id, "closed"),
                "INVALID_TRANSITION",
            ),
            (DispatchError::AlreadyAccepted(id), "ALREADY_ACCEPTED"),
            (
                DispatchError::ConcurrentModification(id),
                "CONCURRENT_MODIFICATION",
            ),
        ];
        for (err, code) in cases {
            let err = AppError::from(err);
            assert_eq!(err.status(), StatusCode::CONFLICT);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_store_error_hides_details() {
        let err = AppError::from(DispatchError::Store("connection refused".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "INTERNAL_SERVER_ERROR");
        assert!(!err.message.contains("connection refused"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
