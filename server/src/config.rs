//! Configuration management for the dispatch server.
//!
//! Loads configuration from environment variables with sensible defaults.
//! A `.env` file is honored by the binary via `dotenvy`.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `STORE_BACKEND` holds an unknown value.
    #[error("Unknown STORE_BACKEND '{0}', expected 'memory' or 'postgres'")]
    UnknownBackend(String),

    /// The postgres backend was selected without a database URL.
    #[error("STORE_BACKEND=postgres requires DATABASE_URL")]
    MissingDatabaseUrl,
}

/// Which [`emergency_core::RequestStore`] backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store; state is lost on restart.
    Memory,
    /// `PostgreSQL` store.
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Store selection and database settings
    pub store: StoreConfig,
    /// Allowed browser origins
    pub cors: CorsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Selected backend
    pub backend: StoreBackend,
    /// `PostgreSQL` connection URL (postgres backend only)
    pub database_url: Option<String>,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to call the API from a browser
    pub allowed_origins: Vec<String>,
}

const DEFAULT_ORIGINS: &str = "http://localhost:5173,http://localhost:5174";

/// Numeric setting, falling back to `default` when absent or unparseable.
fn parsed<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown store backend, or for the
    /// postgres backend without `DATABASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = lookup("STORE_BACKEND")
            .map(|s| s.parse::<StoreBackend>())
            .transpose()?
            .unwrap_or(StoreBackend::Memory);
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        Ok(Self {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parsed(&lookup, "PORT", 8080),
                log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
                metrics_host: lookup("METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                metrics_port: parsed(&lookup, "METRICS_PORT", 9090),
                shutdown_timeout: parsed(&lookup, "SHUTDOWN_TIMEOUT", 30),
            },
            store: StoreConfig {
                backend,
                database_url,
                max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10),
                connect_timeout: parsed(&lookup, "DATABASE_CONNECT_TIMEOUT", 30),
            },
            cors: CorsConfig {
                allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|| DEFAULT_ORIGINS.to_string())
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(String::from)
                    .collect(),
            },
        })
    }

    /// Get the server bind address.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Get the metrics bind address.
    #[must_use]
    pub fn metrics_address(&self) -> String {
        format!("{}:{}", self.server.metrics_host, self.server.metrics_port)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_use_memory_store() {
        let config = load(&[]).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.metrics_address(), "0.0.0.0:9090");
        assert_eq!(config.server.shutdown_timeout, 30);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["http://localhost:5173", "http://localhost:5174"]
        );
    }

    #[test]
    fn postgres_backend_needs_url() {
        assert_eq!(
            load(&[("STORE_BACKEND", "postgres")]).unwrap_err(),
            ConfigError::MissingDatabaseUrl
        );

        let config = load(&[
            ("STORE_BACKEND", "Postgres"),
            ("DATABASE_URL", "postgres://localhost/dispatch"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
        ])
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.store.max_connections, 4);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(matches!(
            load(&[("STORE_BACKEND", "redis")]),
            Err(ConfigError::UnknownBackend(_))
        ));
    }

    #[test]
    fn unparseable_numbers_fall_back_to_defaults() {
        let config = load(&[("PORT", "eighty"), ("HOST", "127.0.0.1")]).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn origins_are_trimmed() {
        let config = load(&[("CORS_ALLOWED_ORIGINS", " https://a.example , ,https://b.example")])
            .unwrap();
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }
}
