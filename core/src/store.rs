//! Request store trait and the in-memory implementation.
//!
//! The store is the only shared mutable resource in the system. It owns the
//! durable copy of every [`EmergencyRequest`] and offers exactly one way to
//! change it: a conditional write that succeeds only if the stored version
//! still equals the version the caller read. There is no blind overwrite.
//!
//! # Implementations
//!
//! - [`InMemoryRequestStore`]: `HashMap` behind a `RwLock`, for tests and
//!   single-process deployments
//! - `PostgresRequestStore` (in `emergency-postgres`): durable storage

use crate::types::{EmergencyRequest, RequestId, Version};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur during request store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency conflict: the stored version moved on since it
    /// was read.
    #[error("Concurrency conflict on {request_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The record where the conflict occurred.
        request_id: RequestId,
        /// The version the writer read.
        expected: Version,
        /// The version currently stored.
        actual: Version,
    },

    /// No record with this id.
    #[error("Request not found: {0}")]
    NotFound(RequestId),

    /// The stored record is closed; closed records never change again.
    #[error("Request {0} is closed")]
    Closed(RequestId),

    /// Insert of an id that is already stored.
    #[error("Request already exists: {0}")]
    AlreadyExists(RequestId),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Stored data could not be decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Boxed future returned by [`RequestStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Durable keyed storage for emergency requests.
///
/// # Consistency
///
/// Each call is atomic per record. [`RequestStore::save`] is a
/// compare-and-swap on [`EmergencyRequest::version`]; it is the only
/// primitive the coordination service relies on for correctness.
///
/// # Dyn Compatibility
///
/// Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
/// store can be shared as `Arc<dyn RequestStore>`.
pub trait RequestStore: Send + Sync {
    /// Insert a new record.
    ///
    /// Returns the stored record, carrying [`Version::INITIAL`].
    ///
    /// # Errors
    ///
    /// - `AlreadyExists`: the id is taken
    /// - `DatabaseError`: storage failure
    fn insert(&self, request: EmergencyRequest) -> StoreFuture<'_, EmergencyRequest>;

    /// Load a record by id. Unknown ids yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` / `SerializationError`: storage failure
    fn get(&self, id: RequestId) -> StoreFuture<'_, Option<EmergencyRequest>>;

    /// Conditionally replace the stored record.
    ///
    /// Succeeds only if the stored record is still at `expected` and is not
    /// closed. Returns the stored record with its version bumped.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no record with `request.id`
    /// - `Closed`: the stored record is closed
    /// - `ConcurrencyConflict`: the stored version is not `expected`
    /// - `DatabaseError`: storage failure
    fn save(
        &self,
        request: EmergencyRequest,
        expected: Version,
    ) -> StoreFuture<'_, EmergencyRequest>;

    /// Point-in-time snapshot of every record, oldest first.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` / `SerializationError`: storage failure
    fn list(&self) -> StoreFuture<'_, Vec<EmergencyRequest>>;

    /// Cheap reachability probe used by readiness checks.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: the backing storage is unreachable
    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

#[derive(Debug, Default)]
struct Records {
    by_id: HashMap<RequestId, EmergencyRequest>,
    /// Insertion order, used to break `created_at` ties.
    order: Vec<RequestId>,
}

/// In-memory request store.
///
/// Every operation takes the lock once, so each call is atomic the way a
/// single-row statement is in a database.
#[derive(Debug, Default)]
pub struct InMemoryRequestStore {
    records: RwLock<Records>,
}

impl InMemoryRequestStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.by_id.len()
    }

    /// `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.by_id.is_empty()
    }
}

impl RequestStore for InMemoryRequestStore {
    fn insert(&self, mut request: EmergencyRequest) -> StoreFuture<'_, EmergencyRequest> {
        Box::pin(async move {
            let mut records = self.records.write().await;
            if records.by_id.contains_key(&request.id) {
                return Err(StoreError::AlreadyExists(request.id));
            }
            request.version = Version::INITIAL;
            records.order.push(request.id);
            records.by_id.insert(request.id, request.clone());
            Ok(request)
        })
    }

    fn get(&self, id: RequestId) -> StoreFuture<'_, Option<EmergencyRequest>> {
        Box::pin(async move { Ok(self.records.read().await.by_id.get(&id).cloned()) })
    }

    fn save(
        &self,
        mut request: EmergencyRequest,
        expected: Version,
    ) -> StoreFuture<'_, EmergencyRequest> {
        Box::pin(async move {
            let mut records = self.records.write().await;
            let stored = records
                .by_id
                .get_mut(&request.id)
                .ok_or(StoreError::NotFound(request.id))?;

            if stored.is_closed() {
                return Err(StoreError::Closed(request.id));
            }
            if stored.version != expected {
                return Err(StoreError::ConcurrencyConflict {
                    request_id: request.id,
                    expected,
                    actual: stored.version,
                });
            }

            request.version = stored.version.next();
            request.created_at = stored.created_at;
            *stored = request.clone();
            Ok(request)
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<EmergencyRequest>> {
        Box::pin(async move {
            let records = self.records.read().await;
            let mut snapshot: Vec<EmergencyRequest> = records
                .order
                .iter()
                .filter_map(|id| records.by_id.get(id).cloned())
                .collect();
            // Stable sort keeps insertion order for equal timestamps.
            snapshot.sort_by_key(|request| request.created_at);
            Ok(snapshot)
        })
    }
}
