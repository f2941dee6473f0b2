//! RPC service registry: mounts every registered service on the router.
//!
//! Each service is served under `POST /rpc/{service}/{method}` with its own
//! request body limit. Unknown methods are answered with `unimplemented`
//! before the service sees the call.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use streamgate_core::{Principal, RequestContext, TransportChannel, TransportKind};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::Instrument;

use super::descriptor::ServiceDescriptor;
use super::service::{RpcCall, RpcService};
use super::status::{reply_response, RpcError};
use crate::network::middleware::REQUEST_ID_HEADER;
use crate::observability::catalog::RPC_CALL_SECONDS;

/// A service name was registered twice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rpc service '{0}' is already registered")]
pub struct DuplicateService(pub &'static str);

#[derive(Default)]
pub struct RpcRegistry {
    services: Vec<Arc<dyn RpcService>>,
}

impl RpcRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `DuplicateService` if a service with the same name exists.
    pub fn register(&mut self, service: Arc<dyn RpcService>) -> Result<(), DuplicateService> {
        let name = service.descriptor().name;
        if self.services.iter().any(|s| s.descriptor().name == name) {
            return Err(DuplicateService(name));
        }
        tracing::debug!(service = name, "registered rpc service");
        self.services.push(service);
        Ok(())
    }

    #[must_use]
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.services.iter().map(|s| s.descriptor().clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Build the router serving every registered service.
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new();
        for service in &self.services {
            let descriptor = service.descriptor();
            let limit = descriptor.max_receive_message_size;
            let path = format!("/rpc/{}/{{method}}", descriptor.name);
            let service = Arc::clone(service);
            let handler = move |Path(method): Path<String>, request: Request| {
                let service = Arc::clone(&service);
                async move { handle(service, method, request).await }
            };
            router = router.route(&path, post(handler).layer(RequestBodyLimitLayer::new(limit)));
        }
        router
    }
}

async fn handle(service: Arc<dyn RpcService>, method: String, request: Request) -> Response {
    let descriptor = service.descriptor();
    let Some(known) = descriptor.find(&method) else {
        return RpcError::Unimplemented {
            service: descriptor.name.to_string(),
            method,
        }
        .into_response();
    };
    let limit = descriptor.max_receive_message_size;

    let (parts, body) = request.into_parts();
    let request_id = parts
        .headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let channel = parts
        .extensions
        .get::<TransportChannel>()
        .copied()
        .unwrap_or(TransportChannel::Public);
    let mut context = RequestContext::new(request_id, TransportKind::Rpc, channel, parts.uri.path());
    if let Some(principal) = parts.extensions.get::<Principal>() {
        context = context.with_principal(principal.clone());
    }

    let payload = match axum::body::to_bytes(body, limit).await {
        Ok(payload) => payload,
        Err(_) => return RpcError::ResourceExhausted { limit }.into_response(),
    };

    let span = tracing::info_span!(
        "rpc",
        service = descriptor.name,
        method = known.name,
        request_id = %context.request_id,
    );
    let started = Instant::now();
    let call = RpcCall {
        context,
        method,
        payload,
    };
    let result = service.call(call).instrument(span).await;
    let status = match &result {
        Ok(_) => "ok",
        Err(e) => e.status_name(),
    };
    metrics::histogram!(
        RPC_CALL_SECONDS,
        "service" => descriptor.name,
        "method" => known.name,
        "status" => status,
    )
    .record(started.elapsed().as_secs_f64());

    match result {
        Ok(reply) => reply_response(reply),
        Err(e) => {
            tracing::debug!(service = descriptor.name, method = known.name, error = %e, "rpc call failed");
            e.into_response()
        }
    }
}
