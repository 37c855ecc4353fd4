//! Hospital acceptance endpoint.
//!
//! `PATCH|PUT /api/hospitals/accept/:id?hospitalId=..&doctorName=..`
//!
//! The first hospital to commit wins. A different hospital (or the same
//! hospital naming a different doctor) gets 409 `ALREADY_ACCEPTED`; the
//! winner repeating its own acceptance gets the record back unchanged.

use crate::WebResult;
use crate::error::AppError;
use crate::handlers::emergencies::request_id;
use crate::middleware::CorrelationId;
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
};
use emergency_core::{EmergencyRequest, HospitalId};
use serde::Deserialize;
use uuid::Uuid;

/// Query parameters of an acceptance.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptParams {
    /// Accepting hospital
    pub hospital_id: HospitalId,
    /// Doctor taking the case
    pub doctor_name: String,
}

/// Record a hospital's acceptance of an emergency request.
///
/// # Errors
///
/// - 400 `BAD_REQUEST` for a malformed id or missing query parameter
/// - 400 `VALIDATION_ERROR` for blank values
/// - 404 `NOT_FOUND`
/// - 409 `ALREADY_ACCEPTED`, `INVALID_TRANSITION` or `CONCURRENT_MODIFICATION`
pub async fn accept_emergency(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    path: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<AcceptParams>, QueryRejection>,
) -> WebResult<Json<EmergencyRequest>> {
    let id = request_id(path)?;
    let Query(params) = params.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    tracing::debug!(
        correlation_id = %correlation_id,
        request_id = %id,
        hospital_id = %params.hospital_id,
        "Hospital acceptance received"
    );

    let record = state
        .service
        .accept_request(id, params.hospital_id, params.doctor_name)
        .await?;

    Ok(Json(record))
}
