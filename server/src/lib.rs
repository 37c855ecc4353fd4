//! Emergency dispatch server.
//!
//! Wires configuration, the selected request store, the coordination
//! service and the HTTP router together. The binary in `src/bin/server.rs`
//! only adds tracing, metrics and signal handling on top.

#![forbid(unsafe_code)]

pub mod config;
pub mod metrics;

pub use config::{Config, ConfigError, StoreBackend};

use anyhow::Context;
use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use config::{CorsConfig, StoreConfig};
use emergency_core::environment::SystemClock;
use emergency_core::{CoordinationService, InMemoryRequestStore, RequestStore};
use emergency_postgres::PostgresRequestStore;
use emergency_web::{AppState, build_router};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Build the configured request store.
///
/// The postgres store is migrated before it is returned.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn build_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn RequestStore>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory request store; state is lost on restart");
            Ok(Arc::new(InMemoryRequestStore::new()))
        },
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let store =
                PostgresRequestStore::new(url, config.max_connections, config.connect_timeout)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
            store.migrate().await.context("Failed to run migrations")?;
            tracing::info!("PostgreSQL request store ready");
            Ok(Arc::new(store))
        },
    }
}

/// CORS policy for browser clients.
///
/// Origins that are not valid header values are skipped with a warning.
#[must_use]
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            },
        })
        .collect();

    let correlation = HeaderName::from_static("x-correlation-id");
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE, correlation.clone()])
        .expose_headers([correlation])
}

/// Assemble the full application router over `store`.
pub fn build_app(config: &Config, store: Arc<dyn RequestStore>) -> Router {
    let service = Arc::new(CoordinationService::new(store, Arc::new(SystemClock)));
    build_router(AppState::new(service)).layer(cors_layer(&config.cors))
}
