//! Router configuration.

use crate::handlers::{
    accept_emergency, create_emergency, get_emergency, health_check, list_emergencies,
    readiness_check, update_emergency,
};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, patch},
};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Updates accept both `PATCH` and `PUT`; older clients send `PUT`.
/// CORS is left to the caller since allowed origins are deployment config.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/emergencies",
            get(list_emergencies).post(create_emergency),
        )
        .route(
            "/emergencies/:id",
            get(get_emergency)
                .patch(update_emergency)
                .put(update_emergency),
        )
        .route(
            "/hospitals/accept/:id",
            patch(accept_emergency).put(accept_emergency),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
