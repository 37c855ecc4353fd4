//! Router tests through `axum-test`.
//!
//! Each test builds the full router over an in-memory (or deliberately
//! misbehaving) store and talks to it over JSON.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use axum::http::StatusCode;
use axum_test::TestServer;
use emergency_core::store::{RequestStore, StoreError, StoreFuture};
use emergency_core::{
    CoordinationService, EmergencyRequest, HospitalStatus, InMemoryRequestStore, RequestId,
    RequestStatus, Version,
};
use emergency_testing::{RacingStore, test_clock};
use emergency_web::{AppState, CORRELATION_ID_HEADER, build_router};
use serde_json::{Value, json};
use std::sync::Arc;

fn server_over(store: Arc<dyn RequestStore>) -> TestServer {
    let service = CoordinationService::new(store, Arc::new(test_clock()));
    TestServer::new(build_router(AppState::new(Arc::new(service)))).unwrap()
}

fn server() -> TestServer {
    server_over(Arc::new(InMemoryRequestStore::new()))
}

async fn create_cardiac(server: &TestServer) -> EmergencyRequest {
    let response = server
        .post("/api/emergencies")
        .json(&json!({
            "callerId": "u1",
            "latitude": 10.0,
            "longitude": 20.0,
            "natureOfEmergency": "cardiac"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<EmergencyRequest>()
}

fn error_code(body: &Value) -> &str {
    body["code"].as_str().expect("error body carries a code")
}

/// Store whose backend is down.
struct UnreachableStore;

impl RequestStore for UnreachableStore {
    fn insert(&self, _request: EmergencyRequest) -> StoreFuture<'_, EmergencyRequest> {
        Box::pin(async { Err(StoreError::DatabaseError("connection refused".into())) })
    }

    fn get(&self, _id: RequestId) -> StoreFuture<'_, Option<EmergencyRequest>> {
        Box::pin(async { Err(StoreError::DatabaseError("connection refused".into())) })
    }

    fn save(
        &self,
        _request: EmergencyRequest,
        _expected: Version,
    ) -> StoreFuture<'_, EmergencyRequest> {
        Box::pin(async { Err(StoreError::DatabaseError("connection refused".into())) })
    }

    fn list(&self) -> StoreFuture<'_, Vec<EmergencyRequest>> {
        Box::pin(async { Err(StoreError::DatabaseError("connection refused".into())) })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Err(StoreError::DatabaseError("connection refused".into())) })
    }
}

// ============================================================================
// Creation and reads
// ============================================================================

#[tokio::test]
async fn create_returns_pending_record() {
    let server = server();
    let record = create_cardiac(&server).await;

    assert_eq!(record.status, RequestStatus::Pending);
    assert_eq!(record.hospital_status, HospitalStatus::Unassigned);
    assert!(record.assigned_ambulance_id.is_none());
    assert!(record.hospital_id.is_none());
    assert!(record.doctor_name.is_none());
}

#[tokio::test]
async fn create_accepts_legacy_user_id_key() {
    let response = server()
        .post("/api/emergencies")
        .json(&json!({
            "userId": "u9",
            "latitude": -33.9,
            "longitude": 151.2,
            "natureOfEmergency": "fall"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["callerId"], "u9");
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["hospitalStatus"], "UNASSIGNED");
}

#[tokio::test]
async fn create_rejects_out_of_range_latitude() {
    let response = server()
        .post("/api/emergencies")
        .json(&json!({
            "callerId": "u1",
            "latitude": 91.0,
            "longitude": 20.0,
            "natureOfEmergency": "cardiac"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response.json::<Value>()), "VALIDATION_ERROR");
}

#[tokio::test]
async fn create_rejects_missing_caller() {
    let response = server()
        .post("/api/emergencies")
        .json(&json!({ "latitude": 10.0, "longitude": 20.0, "natureOfEmergency": "cardiac" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response.json::<Value>()), "VALIDATION_ERROR");
}

#[tokio::test]
async fn get_unknown_id_is_not_found() {
    let response = server()
        .get(&format!("/api/emergencies/{}", RequestId::new()))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(&response.json::<Value>()), "NOT_FOUND");
}

#[tokio::test]
async fn malformed_id_is_bad_request() {
    let response = server().get("/api/emergencies/not-a-uuid").await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response.json::<Value>()), "BAD_REQUEST");
}

#[tokio::test]
async fn list_returns_creation_order_and_filters() {
    let server = server();
    let first = create_cardiac(&server).await;
    let second = create_cardiac(&server).await;

    server
        .patch(&format!("/api/emergencies/{}", first.id))
        .json(&json!({ "status": "CLOSED" }))
        .await;

    let all = server.get("/api/emergencies").await.json::<Vec<EmergencyRequest>>();
    assert_eq!(
        all.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );

    let open = server
        .get("/api/emergencies")
        .add_query_param("openOnly", "true")
        .await
        .json::<Vec<EmergencyRequest>>();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, second.id);

    let closed = server
        .get("/api/emergencies")
        .add_query_param("status", "CLOSED")
        .await
        .json::<Vec<EmergencyRequest>>();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].id, first.id);
}

// ============================================================================
// Updates
// ============================================================================

#[tokio::test]
async fn ambulance_assignment_then_progression() {
    let server = server();
    let record = create_cardiac(&server).await;
    let path = format!("/api/emergencies/{}", record.id);

    let assigned = server
        .patch(&path)
        .json(&json!({ "assignedAmbulanceId": "AMB1" }))
        .await;
    assert_eq!(assigned.status_code(), StatusCode::OK);
    let assigned = assigned.json::<Value>();
    assert_eq!(assigned["status"], "ASSIGNED_AMBULANCE");
    assert_eq!(assigned["hospitalStatus"], "PENDING_REVIEW");

    // Older clients send PUT.
    let en_route = server.put(&path).json(&json!({ "status": "EN_ROUTE" })).await;
    assert_eq!(en_route.status_code(), StatusCode::OK);
    assert_eq!(en_route.json::<Value>()["status"], "EN_ROUTE");

    let backwards = server.patch(&path).json(&json!({ "status": "PENDING" })).await;
    assert_eq!(backwards.status_code(), StatusCode::CONFLICT);
    assert_eq!(error_code(&backwards.json::<Value>()), "INVALID_TRANSITION");
}

#[tokio::test]
async fn in_service_status_needs_an_ambulance() {
    let server = server();
    let record = create_cardiac(&server).await;
    let path = format!("/api/emergencies/{}", record.id);

    let bare = server
        .patch(&path)
        .json(&json!({ "status": "ASSIGNED_AMBULANCE" }))
        .await;
    assert_eq!(bare.status_code(), StatusCode::CONFLICT);
    assert_eq!(error_code(&bare.json::<Value>()), "INVALID_TRANSITION");

    let with_ambulance = server
        .patch(&path)
        .json(&json!({ "status": "ASSIGNED_AMBULANCE", "assignedAmbulanceId": "AMB1" }))
        .await;
    assert_eq!(with_ambulance.status_code(), StatusCode::OK);
    assert_eq!(with_ambulance.json::<Value>()["version"], 2);
}

#[tokio::test]
async fn closed_request_rejects_ambulance_assignment() {
    let server = server();
    let record = create_cardiac(&server).await;
    let path = format!("/api/emergencies/{}", record.id);

    let closed = server.patch(&path).json(&json!({ "status": "CLOSED" })).await;
    assert_eq!(closed.status_code(), StatusCode::OK);

    let response = server
        .patch(&path)
        .json(&json!({ "assignedAmbulanceId": "AMB1" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(error_code(&response.json::<Value>()), "INVALID_TRANSITION");
}

#[tokio::test]
async fn unknown_status_value_is_bad_request() {
    let server = server();
    let record = create_cardiac(&server).await;

    let response = server
        .patch(&format!("/api/emergencies/{}", record.id))
        .json(&json!({ "status": "TELEPORTED" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Hospital acceptance
// ============================================================================

#[tokio::test]
async fn second_hospital_gets_already_accepted() {
    let server = server();
    let record = create_cardiac(&server).await;
    let path = format!("/api/hospitals/accept/{}", record.id);

    let first = server
        .put(&path)
        .add_query_param("hospitalId", "hospitalA")
        .add_query_param("doctorName", "Dr. X")
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);
    let first = first.json::<Value>();
    assert_eq!(first["hospitalStatus"], "ACCEPTED");
    assert_eq!(first["hospitalId"], "hospitalA");
    assert_eq!(first["doctorName"], "Dr. X");

    let second = server
        .patch(&path)
        .add_query_param("hospitalId", "hospitalB")
        .add_query_param("doctorName", "Dr. Y")
        .await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);
    assert_eq!(error_code(&second.json::<Value>()), "ALREADY_ACCEPTED");

    let stored = server
        .get(&format!("/api/emergencies/{}", record.id))
        .await
        .json::<Value>();
    assert_eq!(stored["hospitalId"], "hospitalA");
}

#[tokio::test]
async fn repeated_acceptance_is_ok_and_unchanged() {
    let server = server();
    let record = create_cardiac(&server).await;
    let path = format!("/api/hospitals/accept/{}", record.id);

    let accept = || {
        server
            .patch(&path)
            .add_query_param("hospitalId", "hospitalA")
            .add_query_param("doctorName", "Dr. X")
    };

    let first = accept().await.json::<EmergencyRequest>();
    let again = accept().await;
    assert_eq!(again.status_code(), StatusCode::OK);
    assert_eq!(again.json::<EmergencyRequest>(), first);
}

#[tokio::test]
async fn accept_unknown_id_is_not_found() {
    let response = server()
        .patch(&format!("/api/hospitals/accept/{}", RequestId::new()))
        .add_query_param("hospitalId", "hospitalA")
        .add_query_param("doctorName", "Dr. X")
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn accept_without_doctor_is_bad_request() {
    let server = server();
    let record = create_cardiac(&server).await;

    let response = server
        .patch(&format!("/api/hospitals/accept/{}", record.id))
        .add_query_param("hospitalId", "hospitalA")
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repeated_lost_races_surface_concurrent_modification() {
    let store = Arc::new(RacingStore::new());
    let server = server_over(store.clone());
    let record = create_cardiac(&server).await;

    store.rival_touches().await;
    store.rival_touches().await;
    let response = server
        .patch(&format!("/api/hospitals/accept/{}", record.id))
        .add_query_param("hospitalId", "hospitalA")
        .add_query_param("doctorName", "Dr. X")
        .await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(error_code(&response.json::<Value>()), "CONCURRENT_MODIFICATION");
}

// ============================================================================
// Infrastructure
// ============================================================================

#[tokio::test]
async fn store_failure_is_internal_error_without_details() {
    let response = server_over(Arc::new(UnreachableStore))
        .get("/api/emergencies")
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.json::<Value>();
    assert_eq!(error_code(&body), "INTERNAL_SERVER_ERROR");
    assert!(!body["message"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn health_and_readiness() {
    let healthy = server();
    assert_eq!(healthy.get("/health").await.status_code(), StatusCode::OK);
    assert_eq!(healthy.get("/ready").await.status_code(), StatusCode::OK);

    let down = server_over(Arc::new(UnreachableStore));
    assert_eq!(down.get("/health").await.status_code(), StatusCode::OK);
    let ready = down.get("/ready").await;
    assert_eq!(ready.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let body = ready.json::<Value>();
    assert_eq!(body["status"], "unavailable");
    assert_eq!(body["reason"], "store unreachable");
    assert!(!ready.text().contains("connection refused"));
}

#[tokio::test]
async fn responses_carry_correlation_id() {
    let response = server().get("/health").await;
    assert!(response.headers().get(CORRELATION_ID_HEADER).is_some());
}
