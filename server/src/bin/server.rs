//! Emergency Dispatch Server
//!
//! This binary:
//! - Loads configuration from the environment (and `.env`)
//! - Builds the selected request store (in-memory or `PostgreSQL`)
//! - Serves the dispatch API and a Prometheus scrape endpoint
//! - Shuts down gracefully on Ctrl+C / SIGTERM
//!
//! # Usage
//!
//! ```bash
//! STORE_BACKEND=postgres DATABASE_URL=postgres://localhost/dispatch \
//!     cargo run --bin emergency-server
//! ```

use emergency_server::metrics::MetricsServer;
use emergency_server::{Config, build_app, build_store};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{},emergency_core=debug,sqlx=warn", config.server.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        backend = ?config.store.backend,
        bind = %config.bind_address(),
        origins = ?config.cors.allowed_origins,
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr = config.metrics_address().parse()?;
    let mut metrics = MetricsServer::new(metrics_addr);
    metrics.start()?;

    let store = build_store(&config.store).await?;
    let app = build_app(&config, store);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_listener = tokio::net::TcpListener::bind(metrics.addr()).await?;
    let metrics_app = metrics.router()?;
    let mut metrics_shutdown = shutdown_rx.clone();
    let metrics_handle = tokio::spawn(async move {
        axum::serve(metrics_listener, metrics_app)
            .with_graceful_shutdown(async move {
                let _ = metrics_shutdown.changed().await;
            })
            .await
    });

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(addr = %listener.local_addr()?, "Emergency dispatch server listening");

    let mut http_shutdown = shutdown_rx;
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = http_shutdown.changed().await;
    });
    let server_handle = tokio::spawn(async move { server.await });

    shutdown_signal().await;
    info!("Shutting down gracefully...");
    let _ = shutdown_tx.send(true);

    let drain = async {
        if let Err(err) = server_handle.await? {
            tracing::error!(error = %err, "HTTP server error");
        }
        if let Err(err) = metrics_handle.await? {
            tracing::error!(error = %err, "Metrics server error");
        }
        Ok::<(), tokio::task::JoinError>(())
    };

    match tokio::time::timeout(Duration::from_secs(config.server.shutdown_timeout), drain).await {
        Ok(result) => result?,
        Err(_) => tracing::warn!(
            timeout_secs = config.server.shutdown_timeout,
            "Shutdown timed out with requests still in flight"
        ),
    }

    info!("Graceful shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}
