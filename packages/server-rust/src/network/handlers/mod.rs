//! Unauthenticated handlers served beside the protected routes.

pub mod health;

pub use health::{live_probe, LIVE_PATH};

use std::sync::Arc;

use axum::routing::any;
use axum::Router;

use super::readiness::ReadinessController;

/// Router for the health probe. Mounted outside the authentication layer.
pub fn health_router(readiness: Arc<ReadinessController>) -> Router {
    Router::new()
        .route(LIVE_PATH, any(live_probe))
        .with_state(readiness)
}
