//! HTTP surface for the emergency dispatch core.
//!
//! Thin Axum shell over [`emergency_core::CoordinationService`]: handlers
//! parse input, call the service once and map [`emergency_core::DispatchError`]
//! to a status code through [`AppError`]. No lifecycle rule lives here.
//!
//! # Request Flow
//!
//! 1. **Correlation id** assigned by [`middleware::correlation_id_layer`]
//! 2. **Extract** path, query and JSON body (rejections become 400)
//! 3. **Call** the coordination service
//! 4. **Map** the record or error to an HTTP response
//!
//! # Example
//!
//! ```ignore
//! use emergency_web::{AppState, build_router};
//!
//! let state = AppState::new(Arc::new(service));
//! let app = build_router(state);
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::AppError;
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, correlation_id_layer};
pub use router::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
