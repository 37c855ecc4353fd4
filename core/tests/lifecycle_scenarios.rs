//! Lifecycle engine scenarios written Given-When-Then.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use emergency_core::environment::Clock;
use emergency_core::{
    AmbulanceId, DispatchError, HospitalId, HospitalStatus, LifecycleEngine, NewEmergency,
    RequestId, RequestStatus, StatusPatch,
};
use emergency_testing::{LifecycleTest, properties, test_clock};
use proptest::prelude::*;

fn dispatch(status: RequestStatus) -> StatusPatch {
    StatusPatch {
        status: Some(status),
        assigned_ambulance_id: Some(AmbulanceId::new("AMB1")),
    }
}

#[test]
fn ambulance_assignment_advances_pending_call() {
    LifecycleTest::new()
        .given_pending()
        .when_updated(StatusPatch::ambulance(AmbulanceId::new("AMB1")))
        .then_changed()
        .then_record(|record| {
            assert_eq!(record.status, RequestStatus::AssignedAmbulance);
            assert_eq!(record.hospital_status, HospitalStatus::PendingReview);
            assert_eq!(record.assigned_ambulance_id, Some(AmbulanceId::new("AMB1")));
        })
        .run();
}

#[test]
fn full_dispatch_progression() {
    LifecycleTest::new()
        .given_patched(&dispatch(RequestStatus::OnScene))
        .when_updated(StatusPatch::status(RequestStatus::Transporting))
        .then_changed()
        .then_record(|record| assert_eq!(record.status, RequestStatus::Transporting))
        .run();
}

#[test]
fn moving_backwards_is_rejected() {
    LifecycleTest::new()
        .given_patched(&dispatch(RequestStatus::EnRoute))
        .when_updated(StatusPatch::status(RequestStatus::AssignedAmbulance))
        .then_error(|err| assert!(matches!(err, DispatchError::InvalidTransition { .. })))
        .run();
}

#[test]
fn in_service_status_without_ambulance_is_rejected() {
    LifecycleTest::new()
        .given_pending()
        .when_updated(StatusPatch::status(RequestStatus::EnRoute))
        .then_error(|err| assert!(matches!(err, DispatchError::InvalidTransition { .. })))
        .run();
}

#[test]
fn pending_call_can_be_closed_directly() {
    LifecycleTest::new()
        .given_pending()
        .when_updated(StatusPatch::status(RequestStatus::Closed))
        .then_changed()
        .then_record(|record| assert!(record.is_closed()))
        .run();
}

#[test]
fn closed_call_rejects_everything() {
    LifecycleTest::new()
        .given_patched(&StatusPatch::status(RequestStatus::Closed))
        .when_updated(StatusPatch::ambulance(AmbulanceId::new("AMB2")))
        .then_error(|err| assert!(matches!(err, DispatchError::InvalidTransition { .. })))
        .run();

    LifecycleTest::new()
        .given_patched(&StatusPatch::status(RequestStatus::Closed))
        .when_accepted_by("hospitalA", "Dr. X")
        .then_error(|err| assert!(matches!(err, DispatchError::InvalidTransition { .. })))
        .run();
}

#[test]
fn repeating_the_current_status_changes_nothing() {
    LifecycleTest::new()
        .given_patched(&dispatch(RequestStatus::EnRoute))
        .when_updated(dispatch(RequestStatus::EnRoute))
        .then_unchanged()
        .run();
}

#[test]
fn first_acceptance_records_hospital_and_doctor() {
    LifecycleTest::new()
        .given_pending()
        .when_accepted_by("hospitalA", "Dr. X")
        .then_changed()
        .then_record(|record| {
            assert_eq!(record.hospital_status, HospitalStatus::Accepted);
            assert_eq!(record.hospital_id, Some(HospitalId::new("hospitalA")));
            assert_eq!(record.doctor_name.as_deref(), Some("Dr. X"));
            assert_eq!(record.status, RequestStatus::Pending);
        })
        .run();
}

#[test]
fn second_hospital_is_turned_away() {
    LifecycleTest::new()
        .given_accepted_by("hospitalA", "Dr. X")
        .when_accepted_by("hospitalB", "Dr. Y")
        .then_error(|err| assert!(matches!(err, DispatchError::AlreadyAccepted(_))))
        .run();
}

#[test]
fn same_hospital_new_doctor_is_turned_away() {
    LifecycleTest::new()
        .given_accepted_by("hospitalA", "Dr. X")
        .when_accepted_by("hospitalA", "Dr. Z")
        .then_error(|err| assert!(matches!(err, DispatchError::AlreadyAccepted(_))))
        .run();
}

#[test]
fn repeated_acceptance_is_a_no_op() {
    LifecycleTest::new()
        .given_accepted_by("hospitalA", "Dr. X")
        .when_accepted_by("hospitalA", "Dr. X")
        .then_unchanged()
        .run();
}

#[test]
fn blank_doctor_name_is_invalid() {
    LifecycleTest::new()
        .given_pending()
        .when_accepted_by("hospitalA", "   ")
        .then_error(|err| assert!(matches!(err, DispatchError::Validation(_))))
        .run();
}

proptest! {
    #[test]
    fn out_of_range_latitude_is_rejected(
        call in properties::valid_call(),
        latitude in properties::out_of_range_latitude(),
    ) {
        let call = NewEmergency { latitude: Some(latitude), ..call };
        let result = LifecycleEngine::create(call, RequestId::new(), test_clock().now());
        prop_assert!(matches!(result, Err(DispatchError::Validation(_))));
    }

    #[test]
    fn out_of_range_longitude_is_rejected(
        call in properties::valid_call(),
        longitude in properties::out_of_range_longitude(),
    ) {
        let call = NewEmergency { longitude: Some(longitude), ..call };
        let result = LifecycleEngine::create(call, RequestId::new(), test_clock().now());
        prop_assert!(matches!(result, Err(DispatchError::Validation(_))));
    }

    #[test]
    fn valid_calls_start_pending(call in properties::valid_call()) {
        let record = LifecycleEngine::create(call, RequestId::new(), test_clock().now()).unwrap();
        prop_assert_eq!(record.status, RequestStatus::Pending);
        prop_assert_eq!(record.hospital_status, HospitalStatus::Unassigned);
        prop_assert!(record.assigned_ambulance_id.is_none());
    }

    #[test]
    fn status_never_moves_backwards(from in properties::any_status(), to in properties::any_status()) {
        let now = test_clock().now();
        let pending = LifecycleEngine::create(
            emergency_testing::fixtures::cardiac_call(),
            RequestId::new(),
            now,
        )
        .unwrap();
        let Ok(current) = LifecycleEngine::apply_status_update(&pending, &dispatch(from), now) else {
            return Ok(());
        };
        let current = current.into_record();

        match LifecycleEngine::apply_status_update(&current, &StatusPatch::status(to), now) {
            Ok(next) => {
                let next = next.into_record();
                prop_assert!(next.status >= current.status);
                prop_assert!(!current.is_closed() || next == current);
            },
            Err(err) => {
                let is_invalid_transition = matches!(err, DispatchError::InvalidTransition { .. });
                prop_assert!(is_invalid_transition);
            },
        }
    }
}
