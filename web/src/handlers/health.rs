//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

/// Readiness response body.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// `ready` or `unavailable`
    pub status: &'static str,
    /// Fixed failure summary when not ready; store detail is only logged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// Simple health check endpoint (for basic liveness).
///
/// Does NOT check the store.
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness: the request store answers.
///
/// - 200 OK: store reachable
/// - 503 Service Unavailable: store unreachable
///
/// ```text
/// GET /ready
/// ```
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    match state.service.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                reason: None,
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "unavailable",
                    reason: Some("store unreachable"),
                }),
            )
        },
    }
}
