//! Coordination service: the single authoritative entry point.
//!
//! Every mutating operation follows the same shape:
//!
//! ```text
//! load current record ─→ LifecycleEngine decides ─→ store.save(next, version_read)
//!        ↑                                                   │
//!        └──────────── ConcurrencyConflict (once) ───────────┘
//! ```
//!
//! There is no in-process lock. Racing hospital acceptances are ordered by
//! whichever conditional write commits first at the store; the loser reloads,
//! re-runs the engine against the winner's record and gets either
//! `AlreadyAccepted` or an idempotent success.

use crate::environment::Clock;
use crate::error::DispatchError;
use crate::lifecycle::{LifecycleEngine, Transition};
use crate::store::{RequestStore, StoreError};
use crate::types::{
    EmergencyRequest, HospitalId, HospitalStatus, NewEmergency, RequestId, RequestStatus,
    StatusPatch,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use std::sync::Arc;

/// One initial attempt plus exactly one retry after a lost race.
const WRITE_ATTEMPTS: usize = 2;

/// Optional filters for [`CoordinationService::list_requests`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Only requests in this status
    pub status: Option<RequestStatus>,
    /// Only requests in this hospital status
    pub hospital_status: Option<HospitalStatus>,
    /// Only requests accepted by this hospital
    pub hospital_id: Option<HospitalId>,
    /// Hide closed requests
    #[serde(default)]
    pub open_only: bool,
}

impl ListQuery {
    /// `true` if `request` passes every filter that is set.
    #[must_use]
    pub fn matches(&self, request: &EmergencyRequest) -> bool {
        self.status.is_none_or(|status| request.status == status)
            && self
                .hospital_status
                .is_none_or(|status| request.hospital_status == status)
            && self
                .hospital_id
                .as_ref()
                .is_none_or(|hospital| request.hospital_id.as_ref() == Some(hospital))
            && !(self.open_only && request.is_closed())
    }
}

/// Coordinates the lifecycle engine with the request store.
///
/// Cheap to share: clone the `Arc` it lives in, one per inbound call.
pub struct CoordinationService {
    store: Arc<dyn RequestStore>,
    clock: Arc<dyn Clock>,
}

impl CoordinationService {
    /// Create a service over `store`, stamping changes with `clock`.
    #[must_use]
    pub fn new(store: Arc<dyn RequestStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Raise a new emergency request.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Validation`] for missing or out-of-range input
    /// - [`DispatchError::Store`] if the insert fails
    pub async fn create_request(
        &self,
        command: NewEmergency,
    ) -> Result<EmergencyRequest, DispatchError> {
        let record = LifecycleEngine::create(command, RequestId::new(), self.clock.now())?;
        let stored = self.store.insert(record).await?;

        metrics::counter!("emergency_requests_created_total").increment(1);
        tracing::info!(
            request_id = %stored.id,
            caller_id = %stored.caller_id,
            nature = %stored.nature_of_emergency,
            "Emergency request created"
        );

        Ok(stored)
    }

    /// Fetch one request.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] for an unknown id
    /// - [`DispatchError::Store`] if the read fails
    pub async fn get_request(&self, id: RequestId) -> Result<EmergencyRequest, DispatchError> {
        self.load(id).await
    }

    /// Point-in-time snapshot of all requests matching `query`, oldest first.
    ///
    /// Updates committed after the snapshot is taken are not reflected.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Store`] if the read fails
    pub async fn list_requests(
        &self,
        query: &ListQuery,
    ) -> Result<BoxStream<'static, EmergencyRequest>, DispatchError> {
        let snapshot: Vec<EmergencyRequest> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|request| query.matches(request))
            .collect();

        tracing::debug!(count = snapshot.len(), "Listed emergency requests");
        Ok(stream::iter(snapshot).boxed())
    }

    /// Apply a status/ambulance patch.
    ///
    /// A patch that changes nothing returns the current record without a
    /// write.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] for an unknown id
    /// - [`DispatchError::InvalidTransition`] for backward moves or closed records
    /// - [`DispatchError::Validation`] for a blank ambulance id
    /// - [`DispatchError::ConcurrentModification`] after two lost races
    pub async fn update_request(
        &self,
        id: RequestId,
        patch: StatusPatch,
    ) -> Result<EmergencyRequest, DispatchError> {
        let transition = self
            .read_modify_write(id, "update", |current, now| {
                LifecycleEngine::apply_status_update(current, &patch, now)
            })
            .await?;

        if let Transition::Changed(record) = &transition {
            metrics::counter!(
                "emergency_status_updates_total",
                "status" => record.status.as_str()
            )
            .increment(1);
            tracing::info!(
                request_id = %record.id,
                status = %record.status,
                ambulance_id = ?record.assigned_ambulance_id.as_ref().map(ToString::to_string),
                version = %record.version,
                "Emergency request updated"
            );
        }

        Ok(transition.into_record())
    }

    /// Record a hospital's acceptance. First committed acceptance wins.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] for an unknown id
    /// - [`DispatchError::AlreadyAccepted`] if another acceptance holds
    /// - [`DispatchError::InvalidTransition`] if the request is closed
    /// - [`DispatchError::Validation`] for blank hospital id or doctor name
    /// - [`DispatchError::ConcurrentModification`] after two lost races
    pub async fn accept_request(
        &self,
        id: RequestId,
        hospital_id: HospitalId,
        doctor_name: String,
    ) -> Result<EmergencyRequest, DispatchError> {
        let result = self
            .read_modify_write(id, "accept", |current, now| {
                LifecycleEngine::apply_hospital_acceptance(current, &hospital_id, &doctor_name, now)
            })
            .await;

        match result {
            Ok(Transition::Changed(record)) => {
                metrics::counter!("emergency_acceptances_total", "outcome" => "accepted")
                    .increment(1);
                tracing::info!(
                    request_id = %record.id,
                    hospital_id = %hospital_id,
                    doctor = %doctor_name,
                    "Emergency request accepted by hospital"
                );
                Ok(record)
            },
            Ok(Transition::Unchanged(record)) => {
                metrics::counter!("emergency_acceptances_total", "outcome" => "idempotent")
                    .increment(1);
                tracing::debug!(
                    request_id = %record.id,
                    hospital_id = %hospital_id,
                    "Repeated acceptance by the holding hospital"
                );
                Ok(record)
            },
            Err(err @ DispatchError::AlreadyAccepted(_)) => {
                metrics::counter!("emergency_acceptances_total", "outcome" => "rejected")
                    .increment(1);
                tracing::warn!(
                    request_id = %id,
                    hospital_id = %hospital_id,
                    "Acceptance rejected, request already claimed"
                );
                Err(err)
            },
            Err(err) => Err(err),
        }
    }

    /// Liveness of the backing store.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Store`] if the store is unreachable
    pub async fn health_check(&self) -> Result<(), DispatchError> {
        self.store.health_check().await.map_err(DispatchError::from)
    }

    async fn load(&self, id: RequestId) -> Result<EmergencyRequest, DispatchError> {
        self.store
            .get(id)
            .await?
            .ok_or(DispatchError::NotFound(id))
    }

    /// Read → decide → conditional write, retried once on a lost race.
    ///
    /// Returns `Unchanged` without writing when the engine reports nothing to
    /// do; `Changed` carries the record as stored (new version).
    async fn read_modify_write<F>(
        &self,
        id: RequestId,
        operation: &'static str,
        decide: F,
    ) -> Result<Transition, DispatchError>
    where
        F: Fn(&EmergencyRequest, DateTime<Utc>) -> Result<Transition, DispatchError>,
    {
        for attempt in 1..=WRITE_ATTEMPTS {
            let current = self.load(id).await?;
            let next = match decide(&current, self.clock.now())? {
                Transition::Changed(next) => next,
                unchanged @ Transition::Unchanged(_) => return Ok(unchanged),
            };

            match self.store.save(next, current.version).await {
                Ok(stored) => return Ok(Transition::Changed(stored)),
                Err(StoreError::ConcurrencyConflict { expected, actual, .. }) => {
                    metrics::counter!("emergency_write_conflicts_total", "operation" => operation)
                        .increment(1);
                    tracing::debug!(
                        request_id = %id,
                        operation,
                        attempt,
                        %expected,
                        %actual,
                        "Lost optimistic write race"
                    );
                },
                Err(err) => return Err(err.into()),
            }
        }

        metrics::counter!("emergency_concurrent_modifications_total", "operation" => operation)
            .increment(1);
        tracing::warn!(request_id = %id, operation, "Giving up after repeated write conflicts");
        Err(DispatchError::ConcurrentModification(id))
    }
}
