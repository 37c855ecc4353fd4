//! HTTP request handlers, organized by resource.

pub mod emergencies;
pub mod health;
pub mod hospitals;

pub use emergencies::{create_emergency, get_emergency, list_emergencies, update_emergency};
pub use health::{health_check, readiness_check};
pub use hospitals::accept_emergency;
