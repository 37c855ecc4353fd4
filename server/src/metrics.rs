//! Prometheus metrics for the dispatch server.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `emergency_requests_created_total` - Requests raised
//! - `emergency_status_updates_total{status}` - Committed status updates, by new status
//! - `emergency_acceptances_total{outcome}` - Acceptances: `accepted`, `idempotent`, `rejected`
//! - `emergency_write_conflicts_total{operation}` - Lost optimistic writes (retried)
//! - `emergency_concurrent_modifications_total{operation}` - Operations that gave up after the retry
//! - `emergency_store_errors_total{operation}` - Failed `PostgreSQL` queries
//!
//! # Example
//!
//! ```rust,no_run
//! use emergency_server::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! # Ok(())
//! # }
//! ```

use axum::{Router, routing::get};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
    /// `start` was not called before `router`
    #[error("Metrics recorder not installed")]
    NotStarted,
}

/// Prometheus metrics server.
///
/// Exposes metrics on a separate HTTP listener for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once served.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Install the global recorder and register metric descriptions.
    ///
    /// Only one recorder can exist per process, so only the first
    /// `MetricsServer` to start gets a scrape endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if the exporter cannot be installed,
    /// including when another recorder is already installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?;
        register_metrics();
        self.handle = Some(handle);
        tracing::info!(
            addr = %self.addr,
            "Metrics available at http://{}/metrics",
            self.addr
        );
        Ok(())
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }

    /// Router serving `GET /metrics`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::NotStarted`] before [`MetricsServer::start`].
    pub fn router(&self) -> Result<Router, MetricsError> {
        let handle = self.handle.clone().ok_or(MetricsError::NotStarted)?;
        Ok(Router::new().route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        ))
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "emergency_requests_created_total",
        "Total number of emergency requests raised"
    );
    describe_counter!(
        "emergency_status_updates_total",
        "Committed status updates by resulting status"
    );
    describe_counter!(
        "emergency_acceptances_total",
        "Hospital acceptances by outcome (accepted, idempotent, rejected)"
    );
    describe_counter!(
        "emergency_write_conflicts_total",
        "Optimistic writes that lost a race and were retried"
    );
    describe_counter!(
        "emergency_concurrent_modifications_total",
        "Operations abandoned after repeated write conflicts"
    );
    describe_counter!(
        "emergency_store_errors_total",
        "Failed request store queries by operation"
    );
}
