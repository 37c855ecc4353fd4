//! `PostgreSQL` request store for the emergency dispatch core.
//!
//! Implements [`RequestStore`] from `emergency-core` on a single
//! `emergency_requests` table. The optimistic write is one statement:
//!
//! ```sql
//! UPDATE emergency_requests SET ...
//! WHERE id = $1 AND version = $2 AND status <> 'CLOSED'
//! RETURNING ...
//! ```
//!
//! so the database row lock decides which of two racing writers wins. When no
//! row comes back the store re-reads the row to report *why* (missing, closed
//! or stale version).
//!
//! # Example
//!
//! ```ignore
//! use emergency_postgres::PostgresRequestStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresRequestStore::new("postgres://localhost/dispatch", 10, 30).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use emergency_core::store::{RequestStore, StoreError, StoreFuture};
use emergency_core::{
    AmbulanceId, CallerId, EmergencyRequest, HospitalId, RequestId, RequestStatus, Version,
};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;
use uuid::Uuid;

const COLUMNS: &str = "id, caller_id, latitude, longitude, nature_of_emergency, status, \
     assigned_ambulance_id, hospital_id, hospital_status, doctor_name, version, \
     created_at, updated_at";

/// PostgreSQL-backed request store.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct PostgresRequestStore {
    pool: PgPool,
}

impl PostgresRequestStore {
    /// Connect to `database_url` with a bounded pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the pool cannot connect.
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections, "Connected to PostgreSQL request store");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `emergency_requests` table and its indexes if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Work out why a conditional update matched no row.
    async fn classify_failed_save(&self, id: RequestId, expected: Version) -> StoreError {
        let row = sqlx::query("SELECT status, version FROM emergency_requests WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await;

        let row = match row {
            Ok(Some(row)) => row,
            Ok(None) => return StoreError::NotFound(id),
            Err(e) => return database_error("save", &e),
        };

        let status: Result<String, _> = row.try_get("status");
        let version: Result<i64, _> = row.try_get("version");
        match (status, version) {
            (Ok(status), _) if status == RequestStatus::Closed.as_str() => StoreError::Closed(id),
            (Ok(_), Ok(actual)) => match version_from_db(actual) {
                Ok(actual) => StoreError::ConcurrencyConflict {
                    request_id: id,
                    expected,
                    actual,
                },
                Err(e) => e,
            },
            (Err(e), _) | (_, Err(e)) => database_error("save", &e),
        }
    }
}

fn database_error(operation: &'static str, error: &sqlx::Error) -> StoreError {
    metrics::counter!("emergency_store_errors_total", "operation" => operation).increment(1);
    tracing::error!(operation, error = %error, "Request store query failed");
    StoreError::DatabaseError(error.to_string())
}

fn version_to_db(version: Version) -> Result<i64, StoreError> {
    i64::try_from(version.value())
        .map_err(|_| StoreError::SerializationError(format!("version {version} out of range")))
}

fn version_from_db(version: i64) -> Result<Version, StoreError> {
    u64::try_from(version)
        .map(Version::new)
        .map_err(|_| StoreError::SerializationError(format!("negative version {version}")))
}

fn decode(row: &PgRow) -> Result<EmergencyRequest, StoreError> {
    let decode_err = |e: sqlx::Error| StoreError::SerializationError(e.to_string());

    let id: Uuid = row.try_get("id").map_err(decode_err)?;
    let status: String = row.try_get("status").map_err(decode_err)?;
    let hospital_status: String = row.try_get("hospital_status").map_err(decode_err)?;
    let version: i64 = row.try_get("version").map_err(decode_err)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(decode_err)?;

    Ok(EmergencyRequest {
        id: RequestId::from_uuid(id),
        caller_id: CallerId::new(row.try_get::<String, _>("caller_id").map_err(decode_err)?),
        latitude: row.try_get("latitude").map_err(decode_err)?,
        longitude: row.try_get("longitude").map_err(decode_err)?,
        nature_of_emergency: row.try_get("nature_of_emergency").map_err(decode_err)?,
        status: status.parse().map_err(StoreError::SerializationError)?,
        assigned_ambulance_id: row
            .try_get::<Option<String>, _>("assigned_ambulance_id")
            .map_err(decode_err)?
            .map(AmbulanceId::new),
        hospital_id: row
            .try_get::<Option<String>, _>("hospital_id")
            .map_err(decode_err)?
            .map(HospitalId::new),
        hospital_status: hospital_status
            .parse()
            .map_err(StoreError::SerializationError)?,
        doctor_name: row.try_get("doctor_name").map_err(decode_err)?,
        version: version_from_db(version)?,
        created_at,
        updated_at,
    })
}

impl RequestStore for PostgresRequestStore {
    fn insert(&self, request: EmergencyRequest) -> StoreFuture<'_, EmergencyRequest> {
        Box::pin(async move {
            let query = format!(
                "INSERT INTO emergency_requests ({COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                 ON CONFLICT (id) DO NOTHING \
                 RETURNING {COLUMNS}"
            );

            let row = sqlx::query(&query)
                .bind(request.id.as_uuid())
                .bind(request.caller_id.as_str())
                .bind(request.latitude)
                .bind(request.longitude)
                .bind(&request.nature_of_emergency)
                .bind(request.status.as_str())
                .bind(request.assigned_ambulance_id.as_ref().map(AmbulanceId::as_str))
                .bind(request.hospital_id.as_ref().map(HospitalId::as_str))
                .bind(request.hospital_status.as_str())
                .bind(request.doctor_name.as_deref())
                .bind(version_to_db(Version::INITIAL)?)
                .bind(request.created_at)
                .bind(request.updated_at)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| database_error("insert", &e))?;

            match row {
                Some(row) => decode(&row),
                None => Err(StoreError::AlreadyExists(request.id)),
            }
        })
    }

    fn get(&self, id: RequestId) -> StoreFuture<'_, Option<EmergencyRequest>> {
        Box::pin(async move {
            let query = format!("SELECT {COLUMNS} FROM emergency_requests WHERE id = $1");
            let row = sqlx::query(&query)
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| database_error("get", &e))?;

            row.as_ref().map(decode).transpose()
        })
    }

    fn save(
        &self,
        request: EmergencyRequest,
        expected: Version,
    ) -> StoreFuture<'_, EmergencyRequest> {
        Box::pin(async move {
            // created_at is never part of the SET list; the stored value wins.
            let query = format!(
                "UPDATE emergency_requests SET \
                     caller_id = $3, latitude = $4, longitude = $5, nature_of_emergency = $6, \
                     status = $7, assigned_ambulance_id = $8, hospital_id = $9, \
                     hospital_status = $10, doctor_name = $11, updated_at = $12, \
                     version = version + 1 \
                 WHERE id = $1 AND version = $2 AND status <> 'CLOSED' \
                 RETURNING {COLUMNS}"
            );

            let row = sqlx::query(&query)
                .bind(request.id.as_uuid())
                .bind(version_to_db(expected)?)
                .bind(request.caller_id.as_str())
                .bind(request.latitude)
                .bind(request.longitude)
                .bind(&request.nature_of_emergency)
                .bind(request.status.as_str())
                .bind(request.assigned_ambulance_id.as_ref().map(AmbulanceId::as_str))
                .bind(request.hospital_id.as_ref().map(HospitalId::as_str))
                .bind(request.hospital_status.as_str())
                .bind(request.doctor_name.as_deref())
                .bind(request.updated_at)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| database_error("save", &e))?;

            match row {
                Some(row) => decode(&row),
                None => Err(self.classify_failed_save(request.id, expected).await),
            }
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<EmergencyRequest>> {
        Box::pin(async move {
            let query =
                format!("SELECT {COLUMNS} FROM emergency_requests ORDER BY created_at, seq");
            let rows = sqlx::query(&query)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| database_error("list", &e))?;

            rows.iter().map(decode).collect()
        })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| database_error("health_check", &e))?;
            Ok(())
        })
    }
}
