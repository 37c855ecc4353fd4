//! Emergency request endpoints.
//!
//! - `POST /api/emergencies` - raise a new request
//! - `GET /api/emergencies` - list requests, oldest first
//! - `GET /api/emergencies/:id` - fetch one request
//! - `PATCH|PUT /api/emergencies/:id` - status / ambulance update
//!
//! # Status progression
//!
//! ```text
//! PENDING → ASSIGNED_AMBULANCE → EN_ROUTE → ON_SCENE → TRANSPORTING → CLOSED
//! ```
//!
//! Forward skips are allowed, backward moves are not, and `CLOSED` is final.

use crate::WebResult;
use crate::error::AppError;
use crate::middleware::CorrelationId;
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use emergency_core::{EmergencyRequest, ListQuery, NewEmergency, RequestId, StatusPatch};
use futures::StreamExt;
use uuid::Uuid;

pub(crate) fn request_id(path: Result<Path<Uuid>, PathRejection>) -> Result<RequestId, AppError> {
    let Path(id) = path.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    Ok(RequestId::from_uuid(id))
}

/// Raise a new emergency request.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/emergencies \
///   -H "Content-Type: application/json" \
///   -d '{"callerId":"u1","latitude":10.0,"longitude":20.0,"natureOfEmergency":"cardiac"}'
/// ```
///
/// # Errors
///
/// - 400 `BAD_REQUEST` for a body that is not valid JSON
/// - 400 `VALIDATION_ERROR` for missing fields or out-of-range coordinates
pub async fn create_emergency(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    payload: Result<Json<NewEmergency>, JsonRejection>,
) -> Result<(StatusCode, Json<EmergencyRequest>), AppError> {
    let Json(command) = payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    let record = state.service.create_request(command).await?;

    tracing::info!(
        correlation_id = %correlation_id,
        request_id = %record.id,
        "Emergency request raised"
    );

    Ok((StatusCode::CREATED, Json(record)))
}

/// List emergency requests, oldest first.
///
/// Optional query filters: `status`, `hospitalStatus`, `hospitalId`,
/// `openOnly`.
///
/// # Errors
///
/// - 400 `BAD_REQUEST` for an unparseable filter
/// - 500 if the store cannot be read
pub async fn list_emergencies(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> WebResult<Json<Vec<EmergencyRequest>>> {
    let Query(query) = query.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    let records = state
        .service
        .list_requests(&query)
        .await?
        .collect::<Vec<_>>()
        .await;

    Ok(Json(records))
}

/// Fetch a single emergency request.
///
/// # Errors
///
/// - 400 `BAD_REQUEST` for an id that is not a UUID
/// - 404 `NOT_FOUND`
pub async fn get_emergency(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> WebResult<Json<EmergencyRequest>> {
    let id = request_id(path)?;
    Ok(Json(state.service.get_request(id).await?))
}

/// Move the request along its lifecycle and/or assign an ambulance.
///
/// # Example
///
/// ```bash
/// curl -X PATCH http://localhost:8080/api/emergencies/<id> \
///   -H "Content-Type: application/json" \
///   -d '{"status":"EN_ROUTE","assignedAmbulanceId":"AMB1"}'
/// ```
///
/// # Errors
///
/// - 400 `BAD_REQUEST` / `VALIDATION_ERROR`
/// - 404 `NOT_FOUND`
/// - 409 `INVALID_TRANSITION` for backward moves or closed requests
/// - 409 `CONCURRENT_MODIFICATION` after repeated lost races
pub async fn update_emergency(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<StatusPatch>, JsonRejection>,
) -> WebResult<Json<EmergencyRequest>> {
    let id = request_id(path)?;
    let Json(patch) = payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    tracing::debug!(
        correlation_id = %correlation_id,
        request_id = %id,
        status = ?patch.status,
        ambulance = ?patch.assigned_ambulance_id,
        "Status update received"
    );

    Ok(Json(state.service.update_request(id, patch).await?))
}
