//! Lifecycle engine for emergency requests.
//!
//! Pure transition logic: every function takes the current record plus a
//! command and returns the next record or an error. Nothing here performs I/O
//! or keeps state between calls.
//!
//! Persisting the result is the [`crate::service`] layer's job.

use crate::error::DispatchError;
use crate::types::{
    EmergencyRequest, HospitalId, HospitalStatus, NewEmergency, RequestId, RequestStatus,
    StatusPatch, Version,
};
use chrono::{DateTime, Utc};

/// Outcome of applying a command to a record.
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    /// The record changed and must be written back.
    Changed(EmergencyRequest),
    /// The command was already reflected in the record; nothing to write.
    Unchanged(EmergencyRequest),
}

impl Transition {
    /// The resulting record, changed or not.
    #[must_use]
    pub fn into_record(self) -> EmergencyRequest {
        match self {
            Self::Changed(record) | Self::Unchanged(record) => record,
        }
    }

    /// Borrow the resulting record.
    #[must_use]
    pub const fn record(&self) -> &EmergencyRequest {
        match self {
            Self::Changed(record) | Self::Unchanged(record) => record,
        }
    }

    /// `true` if a write is needed.
    #[must_use]
    pub const fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Lifecycle engine for emergency requests
#[derive(Clone, Copy, Debug, Default)]
pub struct LifecycleEngine;

impl LifecycleEngine {
    /// Build a fresh record in `PENDING` / `UNASSIGNED`.
    ///
    /// The record carries [`Version::UNSAVED`] until the store inserts it.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Validation`] if the caller id or nature is missing or
    /// blank, or if either coordinate is missing, non-finite or out of range.
    pub fn create(
        command: NewEmergency,
        id: RequestId,
        now: DateTime<Utc>,
    ) -> Result<EmergencyRequest, DispatchError> {
        let caller_id = command
            .caller_id
            .filter(|caller| !caller.as_str().trim().is_empty())
            .ok_or_else(|| DispatchError::Validation("callerId is required".to_string()))?;

        let latitude = Self::validate_coordinate("latitude", command.latitude, 90.0)?;
        let longitude = Self::validate_coordinate("longitude", command.longitude, 180.0)?;

        let nature_of_emergency = command
            .nature_of_emergency
            .map(|nature| nature.trim().to_string())
            .filter(|nature| !nature.is_empty())
            .ok_or_else(|| {
                DispatchError::Validation("natureOfEmergency is required".to_string())
            })?;

        Ok(EmergencyRequest {
            id,
            caller_id,
            latitude,
            longitude,
            nature_of_emergency,
            status: RequestStatus::Pending,
            assigned_ambulance_id: None,
            hospital_id: None,
            hospital_status: HospitalStatus::Unassigned,
            doctor_name: None,
            version: Version::UNSAVED,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply the present fields of `patch` to `current`.
    ///
    /// Rules, in order:
    /// - a closed record accepts nothing;
    /// - a requested status must not be behind the current one;
    /// - assigning an ambulance to a `PENDING` request without an explicit
    ///   status moves it to `ASSIGNED_AMBULANCE`;
    /// - in-service statuses need an ambulance on the record;
    /// - the first ambulance puts the case in front of hospitals
    ///   (`UNASSIGNED` → `PENDING_REVIEW`).
    ///
    /// # Errors
    ///
    /// - [`DispatchError::InvalidTransition`] for closed records, backward
    ///   moves, or in-service statuses without an ambulance
    /// - [`DispatchError::Validation`] for a blank ambulance id
    pub fn apply_status_update(
        current: &EmergencyRequest,
        patch: &StatusPatch,
        now: DateTime<Utc>,
    ) -> Result<Transition, DispatchError> {
        if current.is_closed() {
            return Err(DispatchError::invalid_transition(
                current.id,
                "request is closed and can no longer change",
            ));
        }

        if let Some(ambulance) = &patch.assigned_ambulance_id {
            if ambulance.as_str().trim().is_empty() {
                return Err(DispatchError::Validation(
                    "assignedAmbulanceId must not be blank".to_string(),
                ));
            }
        }

        let target = match patch.status {
            Some(requested) => {
                if !current.status.can_transition_to(requested) {
                    return Err(DispatchError::invalid_transition(
                        current.id,
                        format!("cannot move from {} to {requested}", current.status),
                    ));
                }
                requested
            },
            None if patch.assigned_ambulance_id.is_some()
                && current.status == RequestStatus::Pending =>
            {
                RequestStatus::AssignedAmbulance
            },
            None => current.status,
        };

        let mut next = current.clone();
        if let Some(ambulance) = &patch.assigned_ambulance_id {
            next.assigned_ambulance_id = Some(ambulance.clone());
        }

        if target.requires_ambulance() && next.assigned_ambulance_id.is_none() {
            return Err(DispatchError::invalid_transition(
                current.id,
                format!("status {target} requires an assigned ambulance"),
            ));
        }
        next.status = target;

        if next.assigned_ambulance_id.is_some()
            && next.hospital_status == HospitalStatus::Unassigned
        {
            next.hospital_status = HospitalStatus::PendingReview;
        }

        if next == *current {
            return Ok(Transition::Unchanged(next));
        }

        next.updated_at = now;
        Ok(Transition::Changed(next))
    }

    /// Record a hospital's claim on the request.
    ///
    /// Re-submitting the acceptance that already holds (same hospital, same
    /// doctor) is an idempotent success and returns the record untouched.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Validation`] for a blank hospital id or doctor name
    /// - [`DispatchError::AlreadyAccepted`] if any other acceptance holds
    /// - [`DispatchError::InvalidTransition`] if the request is closed
    pub fn apply_hospital_acceptance(
        current: &EmergencyRequest,
        hospital_id: &HospitalId,
        doctor_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, DispatchError> {
        if hospital_id.as_str().trim().is_empty() {
            return Err(DispatchError::Validation("hospitalId is required".to_string()));
        }
        if doctor_name.trim().is_empty() {
            return Err(DispatchError::Validation("doctorName is required".to_string()));
        }

        if current.is_accepted() {
            if current.is_accepted_by(hospital_id)
                && current.doctor_name.as_deref() == Some(doctor_name)
            {
                return Ok(Transition::Unchanged(current.clone()));
            }
            return Err(DispatchError::AlreadyAccepted(current.id));
        }

        if current.is_closed() {
            return Err(DispatchError::invalid_transition(
                current.id,
                "a closed request cannot be accepted",
            ));
        }

        let mut next = current.clone();
        next.hospital_id = Some(hospital_id.clone());
        next.doctor_name = Some(doctor_name.to_string());
        next.hospital_status = HospitalStatus::Accepted;
        next.updated_at = now;
        Ok(Transition::Changed(next))
    }

    fn validate_coordinate(
        name: &str,
        value: Option<f64>,
        bound: f64,
    ) -> Result<f64, DispatchError> {
        let value =
            value.ok_or_else(|| DispatchError::Validation(format!("{name} is required")))?;
        if !value.is_finite() || value < -bound || value > bound {
            return Err(DispatchError::Validation(format!(
                "{name} must be between -{bound} and {bound}"
            )));
        }
        Ok(value)
    }
}
