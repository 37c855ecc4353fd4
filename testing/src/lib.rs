//! # Emergency Testing
//!
//! Testing utilities and helpers for the emergency dispatch core.
//!
//! This crate provides:
//! - Deterministic clocks
//! - Command fixtures
//! - A store wrapper that injects rival writes, to exercise the optimistic
//!   retry path without relying on thread scheduling
//! - Given-When-Then helpers for the lifecycle engine
//! - proptest strategies for commands
//!
//! ## Example
//!
//! ```ignore
//! use emergency_testing::{fixtures, mocks::RacingStore, test_clock};
//!
//! #[tokio::test]
//! async fn lost_race_is_retried() {
//!     let store = Arc::new(RacingStore::new());
//!     let service = CoordinationService::new(store.clone(), Arc::new(test_clock()));
//!     let request = service.create_request(fixtures::cardiac_call()).await?;
//!
//!     store.rival_accepts("hospital-b", "Dr. Y").await;
//!     let err = service.accept_request(request.id, "hospital-a".into(), "Dr. X".into()).await;
//!     assert!(matches!(err, Err(DispatchError::AlreadyAccepted(_))));
//! }
//! ```

pub mod mocks;

pub use lifecycle_test::LifecycleTest;
pub use mocks::{FixedClock, RacingStore, test_clock};

/// Command fixtures.
pub mod fixtures {
    use emergency_core::{CallerId, NewEmergency};

    /// The canonical call: caller "u1" at (10.0, 20.0), "cardiac".
    #[must_use]
    pub fn cardiac_call() -> NewEmergency {
        call_from("u1", 10.0, 20.0, "cardiac")
    }

    /// A fully populated creation command.
    #[must_use]
    pub fn call_from(caller: &str, latitude: f64, longitude: f64, nature: &str) -> NewEmergency {
        NewEmergency {
            caller_id: Some(CallerId::new(caller)),
            latitude: Some(latitude),
            longitude: Some(longitude),
            nature_of_emergency: Some(nature.to_string()),
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use emergency_core::{CallerId, NewEmergency, RequestStatus};
    use proptest::prelude::*;

    /// Any request status.
    pub fn any_status() -> impl Strategy<Value = RequestStatus> {
        proptest::sample::select(RequestStatus::ALL.to_vec())
    }

    /// Creation commands that must pass validation.
    pub fn valid_call() -> impl Strategy<Value = NewEmergency> {
        (
            "[a-z][a-z0-9]{0,11}",
            -90.0f64..=90.0,
            -180.0f64..=180.0,
            "[a-z]{1,8}( [a-z]{1,8}){0,2}",
        )
            .prop_map(|(caller, latitude, longitude, nature)| NewEmergency {
                caller_id: Some(CallerId::new(caller)),
                latitude: Some(latitude),
                longitude: Some(longitude),
                nature_of_emergency: Some(nature),
            })
    }

    /// Latitudes outside the valid range.
    pub fn out_of_range_latitude() -> impl Strategy<Value = f64> {
        prop_oneof![-1.0e6f64..-90.000_001, 90.000_001f64..1.0e6]
    }

    /// Longitudes outside the valid range.
    pub fn out_of_range_longitude() -> impl Strategy<Value = f64> {
        prop_oneof![-1.0e6f64..-180.000_001, 180.000_001f64..1.0e6]
    }
}

/// Install a test-friendly tracing subscriber once per process.
///
/// Respects `RUST_LOG`; output is captured by the test harness.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,emergency_core=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
