//! HTTP API handlers for rollcall-svc

pub mod health;
pub mod identity;
pub mod records;
pub mod sessions;

pub use health::health_routes;
pub use identity::TeacherId;
pub use records::record_routes;
pub use sessions::session_routes;
