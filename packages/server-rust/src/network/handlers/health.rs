//! Liveness probe for load balancers and orchestrators.
//!
//! Served outside the authentication layer. The probe reflects node
//! readiness: 204 when ready, 503 otherwise.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::network::readiness::ReadinessController;

pub const LIVE_PATH: &str = "/health/live";

/// `GET`/`HEAD /health/live`. Any other method gets 405.
pub async fn live_probe(
    State(readiness): State<Arc<ReadinessController>>,
    method: Method,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET, HEAD")]).into_response();
    }
    if readiness.is_ready() {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use streamgate_core::LifecycleEvent;
    use tower::ServiceExt;

    use super::*;
    use crate::network::handlers::health_router;

    async fn routed(readiness: &Arc<ReadinessController>, method: Method) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(LIVE_PATH)
            .body(Body::empty())
            .unwrap();
        health_router(Arc::clone(readiness)).oneshot(request).await.unwrap()
    }

    async fn probe(readiness: &Arc<ReadinessController>, method: Method) -> StatusCode {
        live_probe(State(Arc::clone(readiness)), method).await.status()
    }

    #[tokio::test]
    async fn unavailable_until_system_ready() {
        let readiness = Arc::new(ReadinessController::new());
        assert_eq!(probe(&readiness, Method::GET).await, StatusCode::SERVICE_UNAVAILABLE);

        readiness.apply(LifecycleEvent::SystemReady);
        assert_eq!(probe(&readiness, Method::GET).await, StatusCode::NO_CONTENT);
        assert_eq!(probe(&readiness, Method::HEAD).await, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn unavailable_after_shutting_down() {
        let readiness = Arc::new(ReadinessController::new());
        readiness.apply(LifecycleEvent::SystemReady);
        readiness.apply(LifecycleEvent::ShuttingDown);
        assert_eq!(probe(&readiness, Method::GET).await, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn other_methods_are_rejected() {
        let readiness = Arc::new(ReadinessController::new());
        readiness.apply(LifecycleEvent::SystemReady);

        let response = live_probe(State(Arc::clone(&readiness)), Method::POST).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, HEAD");
    }

    #[tokio::test]
    async fn head_reports_not_ready() {
        let readiness = Arc::new(ReadinessController::new());
        assert_eq!(routed(&readiness, Method::HEAD).await.status(), StatusCode::SERVICE_UNAVAILABLE);

        readiness.apply(LifecycleEvent::SystemReady);
        assert_eq!(routed(&readiness, Method::HEAD).await.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn wrong_method_is_405_in_every_state() {
        let readiness = Arc::new(ReadinessController::new());
        for method in [Method::POST, Method::PUT, Method::DELETE] {
            assert_eq!(routed(&readiness, method).await.status(), StatusCode::METHOD_NOT_ALLOWED);
        }

        readiness.apply(LifecycleEvent::SystemReady);
        assert_eq!(routed(&readiness, Method::PATCH).await.status(), StatusCode::METHOD_NOT_ALLOWED);

        readiness.apply(LifecycleEvent::ShuttingDown);
        let response = routed(&readiness, Method::POST).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, HEAD");
    }
}
