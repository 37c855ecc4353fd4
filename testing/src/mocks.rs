//! Mock implementations for testing.

use chrono::{DateTime, Utc};
use emergency_core::environment::Clock;
use emergency_core::store::{InMemoryRequestStore, RequestStore, StoreFuture};
use emergency_core::{
    AmbulanceId, EmergencyRequest, HospitalId, HospitalStatus, RequestId, RequestStatus, Version,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Fixed clock for deterministic tests
///
/// Always returns the same time, making tests reproducible.
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
///
/// # Panics
///
/// This function will panic if the hardcoded timestamp fails to parse,
/// which should never happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

type RivalWrite = Box<dyn FnOnce(EmergencyRequest) -> EmergencyRequest + Send>;

/// Store wrapper that lets another writer win the race.
///
/// Each queued rival write is committed directly to the inner store right
/// before the next [`RequestStore::save`] call is evaluated, exactly as if a
/// concurrent request had landed between the caller's read and its write.
/// With an empty queue it behaves like [`InMemoryRequestStore`].
#[derive(Default)]
pub struct RacingStore {
    inner: InMemoryRequestStore,
    rivals: Mutex<VecDeque<RivalWrite>>,
    saves: AtomicUsize,
}

impl RacingStore {
    /// Create an empty store with no rivals queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an arbitrary rival write.
    pub async fn rival<F>(&self, write: F)
    where
        F: FnOnce(EmergencyRequest) -> EmergencyRequest + Send + 'static,
    {
        self.rivals.lock().await.push_back(Box::new(write));
    }

    /// Queue a rival hospital acceptance.
    pub async fn rival_accepts(&self, hospital: &str, doctor: &str) {
        let hospital = HospitalId::new(hospital);
        let doctor = doctor.to_string();
        self.rival(move |mut record| {
            record.hospital_id = Some(hospital);
            record.doctor_name = Some(doctor);
            record.hospital_status = HospitalStatus::Accepted;
            record
        })
        .await;
    }

    /// Queue a rival ambulance assignment.
    pub async fn rival_assigns(&self, ambulance: &str) {
        let ambulance = AmbulanceId::new(ambulance);
        self.rival(move |mut record| {
            record.assigned_ambulance_id = Some(ambulance);
            record.status = record.status.max(RequestStatus::AssignedAmbulance);
            record.hospital_status = match record.hospital_status {
                HospitalStatus::Unassigned => HospitalStatus::PendingReview,
                other => other,
            };
            record
        })
        .await;
    }

    /// Queue a rival write that changes nothing but the version.
    pub async fn rival_touches(&self) {
        self.rival(|record| record).await;
    }

    /// Number of `save` calls seen, rival commits excluded.
    #[must_use]
    pub fn save_attempts(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    async fn commit_rival(&self, id: RequestId) {
        let Some(rival) = self.rivals.lock().await.pop_front() else {
            return;
        };
        if let Ok(Some(stored)) = self.inner.get(id).await {
            let version = stored.version;
            // Rival commits that fail (e.g. closed record) are dropped.
            let _ = self.inner.save(rival(stored), version).await;
        }
    }
}

impl RequestStore for RacingStore {
    fn insert(&self, request: EmergencyRequest) -> StoreFuture<'_, EmergencyRequest> {
        self.inner.insert(request)
    }

    fn get(&self, id: RequestId) -> StoreFuture<'_, Option<EmergencyRequest>> {
        self.inner.get(id)
    }

    fn save(
        &self,
        request: EmergencyRequest,
        expected: Version,
    ) -> StoreFuture<'_, EmergencyRequest> {
        Box::pin(async move {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.commit_rival(request.id).await;
            self.inner.save(request, expected).await
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<EmergencyRequest>> {
        self.inner.list()
    }
}
