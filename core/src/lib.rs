//! # Emergency Core
//!
//! Lifecycle engine and assignment coordination for emergency requests.
//!
//! An emergency request is created by a caller, may be assigned an ambulance,
//! may be accepted by at most one hospital, and moves through a closed set of
//! statuses until it is closed. Citizens, hospitals and dispatch staff observe
//! and mutate the same record concurrently.
//!
//! ## Layers
//!
//! - [`types`]: records, identifiers, statuses and commands
//! - [`lifecycle`]: the pure engine, `(record, command) → next record | error`
//! - [`store`]: the `RequestStore` trait with its conditional write, plus an
//!   in-memory implementation
//! - [`service`]: the `CoordinationService`, which runs read → decide →
//!   conditional write and resolves racing acceptances
//!
//! ## Example
//!
//! ```ignore
//! use emergency_core::{CoordinationService, NewEmergency, InMemoryRequestStore};
//! use emergency_core::environment::SystemClock;
//! use std::sync::Arc;
//!
//! let service = CoordinationService::new(
//!     Arc::new(InMemoryRequestStore::new()),
//!     Arc::new(SystemClock),
//! );
//!
//! let request = service.create_request(NewEmergency {
//!     caller_id: Some("u1".into()),
//!     latitude: Some(10.0),
//!     longitude: Some(20.0),
//!     nature_of_emergency: Some("cardiac".into()),
//! }).await?;
//!
//! let accepted = service
//!     .accept_request(request.id, "hospital-a".into(), "Dr. X".into())
//!     .await?;
//! ```

pub mod error;
pub mod lifecycle;
pub mod service;
pub mod store;
pub mod types;

pub use error::DispatchError;
pub use lifecycle::{LifecycleEngine, Transition};
pub use service::{CoordinationService, ListQuery};
pub use store::{InMemoryRequestStore, RequestStore, StoreError};
pub use types::{
    AmbulanceId, CallerId, EmergencyRequest, HospitalId, HospitalStatus, NewEmergency,
    RequestId, RequestStatus, StatusPatch, Version,
};

/// Environment module - dependency injection traits
///
/// Everything the engine and service need from the outside world that is not
/// the store itself.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
