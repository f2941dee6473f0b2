//! The legacy request pipeline as three ordered axum stages:
//!
//! 1. [`resolve_route`] attaches an [`InternalContext`] or answers 404/405/400/415/406
//! 2. [`authorize_route`] checks the context's operation with the shared authorizer
//! 3. [`dispatch_route`] executes the action through the dispatch bridge
//!
//! The first two are middleware, the last is the router's fallback handler.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use serde::Deserialize;
use streamgate_core::messages::{ProposedEvent, StreamCommand, UserCommand};
use streamgate_core::{Command, CoreReply, Principal, StreamId};

use super::codec::Codec;
use super::error::LegacyError;
use super::routes::{InternalContext, LegacyAction, RouteTable};
use crate::dispatch::DispatchBridge;
use crate::security::{AuthenticationError, Authorized, Authorizer};

/// Shared state of the legacy stages.
pub struct LegacyState<S: StreamId> {
    pub routes: Arc<RouteTable>,
    pub authorizer: Arc<Authorizer>,
    pub bridge: Arc<DispatchBridge<S>>,
    /// Renders `/metrics`; `None` when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    pub max_body_size: usize,
}

impl<S: StreamId> Clone for LegacyState<S> {
    fn clone(&self) -> Self {
        Self {
            routes: Arc::clone(&self.routes),
            authorizer: Arc::clone(&self.authorizer),
            bridge: Arc::clone(&self.bridge),
            metrics: self.metrics.clone(),
            max_body_size: self.max_body_size,
        }
    }
}

/// Hands the grant from the authorize stage to the dispatch stage, which
/// takes it exactly once.
#[derive(Clone)]
struct GrantSlot(Arc<Mutex<Option<Authorized>>>);

impl GrantSlot {
    fn take(&self) -> Option<Authorized> {
        self.0.lock().take()
    }
}

/// Build the legacy router. Mounted as the fallback of the protected router,
/// so it runs after authentication.
pub fn legacy_router<S: StreamId>(state: LegacyState<S>) -> Router {
    Router::new()
        .fallback(dispatch_route::<S>)
        .layer(middleware::from_fn_with_state(state.clone(), authorize_route::<S>))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_route::<S>))
        .with_state(state)
}

pub async fn resolve_route<S: StreamId>(
    State(state): State<LegacyState<S>>,
    mut request: Request,
    next: Next,
) -> Response {
    match state
        .routes
        .resolve::<S>(request.method(), request.uri(), request.headers())
    {
        Ok(context) => {
            tracing::trace!(route = context.template, operation = %context.operation, "resolved legacy route");
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(path = request.uri().path(), error = %e, "legacy route not resolved");
            e.into_response()
        }
    }
}

pub async fn authorize_route<S: StreamId>(
    State(state): State<LegacyState<S>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(principal) = request.extensions().get::<Principal>().cloned() else {
        return AuthenticationError::MissingCredentials.into_response();
    };
    let Some(operation) = request
        .extensions()
        .get::<InternalContext<S>>()
        .map(|c| c.operation.clone())
    else {
        return LegacyError::Internal("legacy route was not resolved".into()).into_response();
    };
    match state.authorizer.authorize(&principal, operation).await {
        Ok(grant) => {
            request
                .extensions_mut()
                .insert(GrantSlot(Arc::new(Mutex::new(Some(grant)))));
            next.run(request).await
        }
        Err(denied) => denied.into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserBody {
    login: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    groups: Vec<String>,
    password: String,
}

pub async fn dispatch_route<S: StreamId>(
    State(state): State<LegacyState<S>>,
    mut request: Request,
) -> Response {
    let context = request.extensions_mut().remove::<InternalContext<S>>();
    let grant = request
        .extensions_mut()
        .remove::<GrantSlot>()
        .and_then(|slot| slot.take());
    let (Some(context), Some(grant)) = (context, grant) else {
        return LegacyError::Internal("legacy request reached dispatch unauthorized".into())
            .into_response();
    };
    let codec = context.response_codec;
    let request_codec = context.request_codec;
    let created = matches!(context.action, LegacyAction::Append { .. });

    let result = match context.action {
        LegacyAction::Metrics => return render_metrics(&state),
        LegacyAction::Command(command) => state.bridge.dispatch(grant, command).await.map_err(LegacyError::from),
        LegacyAction::Append { stream, expected } => {
            match read_body::<Vec<ProposedEvent>>(request, request_codec, state.max_body_size).await {
                Ok(events) if events.is_empty() => {
                    Err(LegacyError::InvalidBody("append requires at least one event".into()))
                }
                Ok(events) => {
                    let command = Command::Streams(StreamCommand::Append {
                        stream,
                        expected,
                        events,
                    });
                    state.bridge.dispatch(grant, command).await.map_err(LegacyError::from)
                }
                Err(e) => Err(e),
            }
        }
        LegacyAction::CreateUser => {
            match read_body::<CreateUserBody>(request, request_codec, state.max_body_size).await {
                Ok(body) if body.login.is_empty() || body.password.is_empty() => Err(
                    LegacyError::InvalidBody("login and password are required".into()),
                ),
                Ok(body) => {
                    let command = Command::Users(UserCommand::Create {
                        login: body.login,
                        full_name: body.full_name,
                        groups: body.groups,
                        password: body.password,
                    });
                    state.bridge.dispatch(grant, command).await.map_err(LegacyError::from)
                }
                Err(e) => Err(e),
            }
        }
    };

    match result {
        Ok(CoreReply::Success(value)) => {
            let status = if created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            encoded(status, codec, &value)
        }
        Ok(CoreReply::Failure(failure)) => {
            let status = StatusCode::from_u16(failure.code.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            encoded(status, codec, &failure)
        }
        Err(e) => e.into_response(),
    }
}

async fn read_body<T: serde::de::DeserializeOwned>(
    request: Request,
    codec: Option<Codec>,
    limit: usize,
) -> Result<T, LegacyError> {
    let bytes = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|_| LegacyError::PayloadTooLarge { limit })?;
    codec
        .unwrap_or(Codec::Json)
        .decode(&bytes)
        .map_err(|e| LegacyError::InvalidBody(e.to_string()))
}

fn encoded<T: serde::Serialize>(status: StatusCode, codec: Codec, value: &T) -> Response {
    match codec.encode(value) {
        Ok(body) => (
            status,
            [(header::CONTENT_TYPE, HeaderValue::from_static(codec.media_type()))],
            body,
        )
            .into_response(),
        Err(e) => LegacyError::Internal(e.to_string()).into_response(),
    }
}

fn render_metrics<S: StreamId>(state: &LegacyState<S>) -> Response {
    match &state.metrics {
        Some(handle) => encoded(StatusCode::OK, Codec::Text, &handle.render()),
        None => LegacyError::MetricsDisabled.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::json;
    use streamgate_core::{roles, DomainFailure, FailureCode, StreamName};
    use tower::ServiceExt;

    use super::*;
    use crate::dispatch::DispatchConfig;
    use crate::network::readiness::ReadinessController;
    use crate::security::providers::PolicyAuthorizationProvider;
    use crate::test_support::{admin, user, BusBehaviour, RecordingBus};

    fn router(bus: Arc<RecordingBus>, metrics: Option<PrometheusHandle>) -> Router {
        let bridge = DispatchBridge::new(bus, DispatchConfig::default(), Arc::new(ReadinessController::new()));
        legacy_router(LegacyState::<StreamName> {
            routes: Arc::new(RouteTable::standard().unwrap()),
            authorizer: Arc::new(Authorizer::new(Arc::new(PolicyAuthorizationProvider))),
            bridge: Arc::new(bridge),
            metrics,
            max_body_size: 1024,
        })
    }

    fn request(method: &str, uri: &str, principal: Principal, body: Body) -> axum::http::Request<Body> {
        let mut request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .unwrap();
        request.extensions_mut().insert(principal);
        request
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn read_reaches_the_core_with_the_callers_principal() {
        let bus = RecordingBus::new(BusBehaviour::Reply(CoreReply::Success(json!({"events": []}))));
        let response = router(bus.clone(), None)
            .oneshot(request("GET", "/streams/orders", user("ouro"), Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"events": []}));
        assert_eq!(bus.published()[0].principal.id, "ouro");
    }

    #[tokio::test]
    async fn unresolved_requests_never_reach_authorization_or_bus() {
        let bus = RecordingBus::new(BusBehaviour::Reply(CoreReply::empty()));
        let app = router(bus.clone(), None);

        // Anonymous would be denied; resolution answers first.
        let response = app
            .clone()
            .oneshot(request("GET", "/nowhere", Principal::anonymous(), Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request("PATCH", "/users", Principal::anonymous(), Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn denied_requests_publish_nothing() {
        let bus = RecordingBus::new(BusBehaviour::Reply(CoreReply::empty()));
        let response = router(bus.clone(), None)
            .oneshot(request("POST", "/admin/shutdown", user("ouro"), Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn append_decodes_events_and_answers_created() {
        let bus = RecordingBus::new(BusBehaviour::Reply(CoreReply::Success(json!({"nextExpectedVersion": 0}))));
        let events = json!([{
            "eventId": "6f1a2b3c-0000-4000-8000-000000000001",
            "eventType": "OrderPlaced",
            "data": {"total": 12},
        }]);
        let response = router(bus.clone(), None)
            .oneshot(request(
                "POST",
                "/streams/orders",
                user("ouro"),
                Body::from(serde_json::to_vec(&events).unwrap()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        match &bus.published()[0].command {
            Command::Streams(StreamCommand::Append { events, .. }) => {
                assert_eq!(events[0].event_type, "OrderPlaced");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_body_is_400() {
        let bus = RecordingBus::new(BusBehaviour::Reply(CoreReply::empty()));
        let response = router(bus.clone(), None)
            .oneshot(request("POST", "/streams/orders", user("ouro"), Body::from("[]")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn domain_failures_keep_their_status() {
        let failure = DomainFailure::new(FailureCode::StreamNotFound, "no such stream");
        let bus = RecordingBus::new(BusBehaviour::Reply(CoreReply::Failure(failure)));
        let response = router(bus, None)
            .oneshot(request("GET", "/streams/missing", user("ouro"), Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], "stream-not-found");
    }

    #[tokio::test]
    async fn unanswered_dispatch_is_503() {
        let bus = RecordingBus::new(BusBehaviour::Drop);
        let response = router(bus, None)
            .oneshot(request("GET", "/gossip", Principal::anonymous(), Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn msgpack_responses_on_request() {
        let bus = RecordingBus::new(BusBehaviour::Reply(CoreReply::Success(json!({"members": []}))));
        let mut req = request("GET", "/gossip", Principal::anonymous(), Body::empty());
        req.headers_mut()
            .insert(header::ACCEPT, HeaderValue::from_static("application/msgpack"));
        let response = router(bus, None).oneshot(req).await.unwrap();

        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/msgpack");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"members": []}));
    }

    #[tokio::test]
    async fn metrics_scrape_is_authorized_and_local() {
        let bus = RecordingBus::new(BusBehaviour::Hold);
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let app = router(bus.clone(), Some(handle));

        let response = app
            .clone()
            .oneshot(request("GET", "/metrics", Principal::anonymous(), Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(request("GET", "/metrics", admin(), Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn system_streams_need_admin() {
        let bus = RecordingBus::new(BusBehaviour::Reply(CoreReply::empty()));
        let ops = Principal::authenticated("ops", [roles::OPS.to_string()]);
        let response = router(bus, None)
            .oneshot(request("GET", "/streams/$settings", ops, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
