//! Error taxonomy for the emergency request lifecycle.
//!
//! Every variant except [`DispatchError::Store`] is a business outcome the
//! caller caused or raced into. Only [`DispatchError::ConcurrentModification`]
//! is worth retrying from the outside; the service already retried once.

use crate::store::StoreError;
use crate::types::RequestId;
use thiserror::Error;

/// Errors surfaced by the lifecycle engine and the coordination service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Malformed input (missing fields, coordinates out of range, blank ids).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No request with this id exists.
    #[error("Emergency request not found: {0}")]
    NotFound(RequestId),

    /// The command does not fit the current lifecycle position.
    ///
    /// The caller should re-fetch the record before trying again.
    #[error("Invalid transition for request {request_id}: {reason}")]
    InvalidTransition {
        /// Request the command targeted
        request_id: RequestId,
        /// What was wrong with the move
        reason: String,
    },

    /// Another hospital (or another doctor) already holds the request.
    #[error("Emergency request {0} has already been accepted by another hospital")]
    AlreadyAccepted(RequestId),

    /// Lost the optimistic-concurrency race twice in a row.
    #[error("Emergency request {0} was modified concurrently; retry the operation")]
    ConcurrentModification(RequestId),

    /// Infrastructure failure in the request store.
    #[error("Store error: {0}")]
    Store(String),
}

impl DispatchError {
    /// Build an [`DispatchError::InvalidTransition`].
    #[must_use]
    pub fn invalid_transition(request_id: RequestId, reason: impl Into<String>) -> Self {
        Self::InvalidTransition {
            request_id,
            reason: reason.into(),
        }
    }

    /// `true` if repeating the whole operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Closed(id) => {
                Self::invalid_transition(id, "request is closed and can no longer change")
            },
            StoreError::ConcurrencyConflict { request_id, .. } => {
                Self::ConcurrentModification(request_id)
            },
            StoreError::AlreadyExists(id) => Self::Store(format!("duplicate request id {id}")),
            StoreError::DatabaseError(msg) | StoreError::SerializationError(msg) => {
                Self::Store(msg)
            },
        }
    }
}
