//! Domain types for emergency requests.
//!
//! Identifiers, the two status machines, the central [`EmergencyRequest`]
//! record and the commands that drive it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an emergency request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new random `RequestId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RequestId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the person who raised the emergency.
///
/// Issued by the external user directory; opaque here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
    /// Creates a new `CallerId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CallerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an ambulance unit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmbulanceId(String);

impl AmbulanceId {
    /// Creates a new `AmbulanceId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AmbulanceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for AmbulanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a hospital from the external hospital directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HospitalId(String);

impl HospitalId {
    /// Creates a new `HospitalId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HospitalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for HospitalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optimistic concurrency token of a stored record.
///
/// `0` means "never stored". The store assigns `1` on insert and bumps the
/// version by one on every successful conditional write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Version of a record that has not been stored yet.
    pub const UNSAVED: Self = Self(0);

    /// Version assigned on first insert.
    pub const INITIAL: Self = Self(1);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw version number.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The version a successful write produces.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status machines
// ============================================================================

/// Request-side lifecycle.
///
/// Declaration order is the allowed order: a request only ever moves to a
/// later variant. `Closed` is terminal and reachable from every open status.
///
/// ```text
/// Pending → AssignedAmbulance → EnRoute → OnScene → Transporting → Closed
///    └──────────────┴───────────────┴────────┴────────────┴─────────↗
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Raised by a caller, nobody dispatched yet
    Pending,
    /// An ambulance has taken the call
    #[serde(alias = "ACCEPTED")]
    AssignedAmbulance,
    /// Ambulance driving to the caller
    EnRoute,
    /// Ambulance crew with the patient
    OnScene,
    /// Patient on the way to hospital
    Transporting,
    /// Finished or cancelled; no further mutation
    #[serde(alias = "COMPLETED")]
    Closed,
}

impl RequestStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::AssignedAmbulance,
        Self::EnRoute,
        Self::OnScene,
        Self::Transporting,
        Self::Closed,
    ];

    /// Wire/database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::AssignedAmbulance => "ASSIGNED_AMBULANCE",
            Self::EnRoute => "EN_ROUTE",
            Self::OnScene => "ON_SCENE",
            Self::Transporting => "TRANSPORTING",
            Self::Closed => "CLOSED",
        }
    }

    /// `true` for the terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Statuses that only make sense with an ambulance on the record.
    #[must_use]
    pub const fn requires_ambulance(&self) -> bool {
        matches!(
            self,
            Self::AssignedAmbulance | Self::EnRoute | Self::OnScene | Self::Transporting
        )
    }

    /// Transition table: forward moves (including skips) are allowed,
    /// re-asserting the current status is a no-op, nothing leaves `Closed`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        next >= *self
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ASSIGNED_AMBULANCE" | "ACCEPTED" => Ok(Self::AssignedAmbulance),
            "EN_ROUTE" => Ok(Self::EnRoute),
            "ON_SCENE" => Ok(Self::OnScene),
            "TRANSPORTING" => Ok(Self::Transporting),
            "CLOSED" | "COMPLETED" => Ok(Self::Closed),
            other => Err(format!("unknown request status: {other}")),
        }
    }
}

/// Hospital-side lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HospitalStatus {
    /// No hospital involvement yet
    Unassigned,
    /// Ambulance dispatched, waiting for a hospital to claim the patient
    PendingReview,
    /// Claimed by exactly one hospital
    Accepted,
}

impl HospitalStatus {
    /// Wire/database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unassigned => "UNASSIGNED",
            Self::PendingReview => "PENDING_REVIEW",
            Self::Accepted => "ACCEPTED",
        }
    }
}

impl fmt::Display for HospitalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HospitalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNASSIGNED" => Ok(Self::Unassigned),
            "PENDING_REVIEW" => Ok(Self::PendingReview),
            "ACCEPTED" => Ok(Self::Accepted),
            other => Err(format!("unknown hospital status: {other}")),
        }
    }
}

// ============================================================================
// Record
// ============================================================================

/// One emergency-response case, tracked from creation to closure.
///
/// Records are immutable snapshots: the engine returns a new value for every
/// change and the store replaces the stored copy through a conditional write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRequest {
    /// Assigned on creation, never changes
    pub id: RequestId,
    /// Who raised the emergency
    pub caller_id: CallerId,
    /// Caller latitude in degrees
    pub latitude: f64,
    /// Caller longitude in degrees
    pub longitude: f64,
    /// Free-text description (e.g. "cardiac")
    pub nature_of_emergency: String,
    /// Request-side status
    pub status: RequestStatus,
    /// Dispatched ambulance, if any
    pub assigned_ambulance_id: Option<AmbulanceId>,
    /// Hospital that accepted the case; set once
    pub hospital_id: Option<HospitalId>,
    /// Hospital-side status
    pub hospital_status: HospitalStatus,
    /// Receiving doctor; set together with `hospital_id`
    pub doctor_name: Option<String>,
    /// Optimistic concurrency token
    pub version: Version,
    /// When the request was raised
    pub created_at: DateTime<Utc>,
    /// Last successful change
    pub updated_at: DateTime<Utc>,
}

impl EmergencyRequest {
    /// `true` once the request reached its terminal status.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }

    /// `true` once a hospital has claimed the request.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.hospital_status == HospitalStatus::Accepted
    }

    /// `true` if `hospital_id` holds the acceptance.
    #[must_use]
    pub fn is_accepted_by(&self, hospital_id: &HospitalId) -> bool {
        self.is_accepted() && self.hospital_id.as_ref() == Some(hospital_id)
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Input for raising a new emergency.
///
/// Every field is optional on the wire so that missing values surface as a
/// validation error rather than a deserialization failure.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmergency {
    /// Caller identifier (`userId` in older clients)
    #[serde(alias = "userId")]
    pub caller_id: Option<CallerId>,
    /// Latitude in degrees, -90..=90
    pub latitude: Option<f64>,
    /// Longitude in degrees, -180..=180
    pub longitude: Option<f64>,
    /// Free-text description
    pub nature_of_emergency: Option<String>,
}

/// Partial update from dispatch staff or an ambulance crew.
///
/// Absent fields are left untouched. The in-service statuses
/// (`ASSIGNED_AMBULANCE` through `TRANSPORTING`) are only accepted once the
/// record carries an ambulance, either already stored or in the same patch;
/// otherwise the update fails as an invalid transition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPatch {
    /// Requested next status
    pub status: Option<RequestStatus>,
    /// Ambulance to assign or reassign
    pub assigned_ambulance_id: Option<AmbulanceId>,
}

impl StatusPatch {
    /// Patch that only moves the status.
    #[must_use]
    pub const fn status(status: RequestStatus) -> Self {
        Self {
            status: Some(status),
            assigned_ambulance_id: None,
        }
    }

    /// Patch that only assigns an ambulance.
    #[must_use]
    pub const fn ambulance(ambulance_id: AmbulanceId) -> Self {
        Self {
            status: None,
            assigned_ambulance_id: Some(ambulance_id),
        }
    }

    /// `true` if the patch carries no field at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none() && self.assigned_ambulance_id.is_none()
    }
}
