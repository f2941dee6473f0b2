//! Listeners, HTTP-level middleware, the health probe, and node readiness.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod readiness;

pub use config::{NetworkConfig, TlsConfig};
pub use handlers::health_router;
pub use middleware::build_http_layers;
pub use module::{BoundAddresses, NetworkModule};
pub use readiness::{InFlightGuard, Readiness, ReadinessController};
