//! Application state for Axum handlers.

use emergency_core::CoordinationService;
use std::sync::Arc;

/// State shared across all HTTP handlers.
///
/// Handlers never touch the store directly; every read and write goes
/// through the [`CoordinationService`].
#[derive(Clone)]
pub struct AppState {
    /// The coordination service
    pub service: Arc<CoordinationService>,
}

impl AppState {
    /// Wrap a shared service.
    #[must_use]
    pub const fn new(service: Arc<CoordinationService>) -> Self {
        Self { service }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
