//! Composition root.
//!
//! [`NodeBuilder::build`] wires the security chain, the dispatch bridge, the
//! RPC registry, the legacy pipeline and every subsystem into one router:
//!
//! ```text
//! HTTP layers (request id, trace, compression, CORS, timeout)
//! ├── /health/live                      unauthenticated
//! └── authenticate
//!     ├── /rpc/{service}/{method}       core services, then subsystem services
//!     ├── subsystem routes
//!     └── fallback: legacy pipeline     resolve → authorize → dispatch
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::{middleware, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use streamgate_core::{LifecycleEvent, StreamId, TransportChannel};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cluster::{GossipSeedDiscovery, PeerClient};
use crate::config::NodeConfig;
use crate::dispatch::DispatchBridge;
use crate::legacy::{legacy_router, LegacyState, RouteTable};
use crate::network::{build_http_layers, health_router, BoundAddresses, NetworkModule, ReadinessController};
use crate::observability::{InstallError, MetricCatalog};
use crate::rpc::services::{core_services, FeaturesService};
use crate::rpc::{DuplicateService, RpcRegistry, ServiceDescriptor, ServiceDeps};
use crate::security::middleware::authenticate;
use crate::security::{
    authentication_provider, authorization_provider, AuthenticationProvider, Authenticator,
    AuthorizationProvider, Authorizer, SecurityConfigError,
};
use crate::service::{DuplicateManagedService, ServiceContext, ServiceRegistry};
use crate::subsystem::{Composition, Subsystem};
use crate::traits::{MessageBus, ReadIndex};

/// Startup failed; the node accepts no traffic.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("no {0} was supplied")]
    MissingDependency(&'static str),

    #[error(transparent)]
    Security(#[from] SecurityConfigError),

    #[error("invalid legacy route table: {0}")]
    Routes(#[from] matchit::InsertError),

    #[error(transparent)]
    DuplicateService(#[from] DuplicateService),

    #[error(transparent)]
    DuplicateManagedService(#[from] DuplicateManagedService),

    #[error("subsystem '{name}' failed: {error:#}")]
    Subsystem { name: &'static str, error: anyhow::Error },

    #[error("cannot install metrics recorder: {0}")]
    Metrics(#[from] InstallError),
}

pub struct NodeBuilder<S: StreamId> {
    config: NodeConfig,
    bus: Option<Arc<dyn MessageBus<S>>>,
    read_index: Option<Arc<dyn ReadIndex<S>>>,
    authentication: Option<Arc<dyn AuthenticationProvider>>,
    authorization: Option<Arc<dyn AuthorizationProvider>>,
    subsystems: Vec<Arc<dyn Subsystem<S>>>,
    metrics: Option<PrometheusHandle>,
}

impl<S: StreamId> NodeBuilder<S> {
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            bus: None,
            read_index: None,
            authentication: None,
            authorization: None,
            subsystems: Vec::new(),
            metrics: None,
        }
    }

    #[must_use]
    pub fn bus(mut self, bus: Arc<dyn MessageBus<S>>) -> Self {
        self.bus = Some(bus);
        self
    }

    #[must_use]
    pub fn read_index(mut self, read_index: Arc<dyn ReadIndex<S>>) -> Self {
        self.read_index = Some(read_index);
        self
    }

    /// Replace the backend selected by `config.security.authentication`.
    #[must_use]
    pub fn authentication_provider(mut self, provider: Arc<dyn AuthenticationProvider>) -> Self {
        self.authentication = Some(provider);
        self
    }

    /// Replace the backend selected by `config.security.authorization`.
    #[must_use]
    pub fn authorization_provider(mut self, provider: Arc<dyn AuthorizationProvider>) -> Self {
        self.authorization = Some(provider);
        self
    }

    /// Append a subsystem. Subsystems are applied in the order added.
    #[must_use]
    pub fn subsystem(mut self, subsystem: Arc<dyn Subsystem<S>>) -> Self {
        self.subsystems.push(subsystem);
        self
    }

    /// Render `/metrics` from an existing recorder instead of installing one.
    #[must_use]
    pub fn metrics_handle(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Wire everything together. Nothing is bound until [`Node::start`].
    ///
    /// # Errors
    ///
    /// Returns `StartupError` for missing dependencies, invalid security
    /// settings, duplicate registrations or a failing subsystem.
    pub fn build(self) -> Result<Node<S>, StartupError> {
        let config = Arc::new(self.config);
        let bus = self.bus.ok_or(StartupError::MissingDependency("message bus"))?;
        let read_index = self.read_index.ok_or(StartupError::MissingDependency("read index"))?;

        let authentication = match self.authentication {
            Some(provider) => provider,
            None => authentication_provider(&config.security)?,
        };
        let authorization = self
            .authorization
            .unwrap_or_else(|| authorization_provider(&config.security));
        let authenticator = Arc::new(Authenticator::new(authentication, config.security.allow_anonymous));
        let authorizer = Arc::new(Authorizer::new(authorization));

        let readiness = Arc::new(ReadinessController::new());
        let lifecycle_events = bus.subscribe_lifecycle();
        let bridge = Arc::new(DispatchBridge::new(
            Arc::clone(&bus),
            config.dispatch.clone(),
            Arc::clone(&readiness),
        ));
        let deps = ServiceDeps::new(Arc::clone(&bridge), Arc::clone(&authorizer));

        let mut rpc = RpcRegistry::new();
        for service in core_services(&deps, Arc::clone(&read_index), &config.rpc) {
            rpc.register(service)?;
        }

        let services = Arc::new(ServiceRegistry::new());
        let client = PeerClient::new(config.cluster.peer_timeout, config.security.node_password.clone())
            .with_tls(config.network.tls.is_some())
            .with_retry(config.cluster.peer_retries, config.cluster.retry_backoff);
        let advertised = config
            .cluster
            .advertised_address(&config.network.host, config.network.port);
        if let Some(discovery) =
            GossipSeedDiscovery::from_topology(&config.cluster, advertised, Arc::clone(&bridge), client)
        {
            services.register(Arc::new(discovery))?;
        }

        let mut catalog = MetricCatalog::standard();
        for subsystem in &self.subsystems {
            let mut composition = Composition {
                config: &config,
                deps: &deps,
                read_index: &read_index,
                rpc: &mut rpc,
                services: &services,
                metrics: &mut catalog,
            };
            subsystem
                .register(&mut composition)
                .map_err(|error| StartupError::Subsystem {
                    name: subsystem.name(),
                    error,
                })?;
            info!(subsystem = subsystem.name(), "subsystem registered");
        }

        let descriptors = rpc.descriptors();
        rpc.register(Arc::new(FeaturesService::new(
            deps.clone(),
            &descriptors,
            config.rpc.max_receive_message_size,
        )))?;

        let metrics = match self.metrics {
            Some(handle) => Some(handle),
            None if config.install_metrics => Some(catalog.install()?),
            None => None,
        };

        let mut protected = rpc.router();
        for subsystem in &self.subsystems {
            protected = subsystem
                .configure_routes(protected)
                .map_err(|error| StartupError::Subsystem {
                    name: subsystem.name(),
                    error,
                })?;
        }
        let legacy = legacy_router(LegacyState {
            routes: Arc::new(RouteTable::standard()?),
            authorizer,
            bridge,
            metrics: metrics.clone(),
            max_body_size: config.rpc.max_append_size,
        });
        let protected = protected
            .fallback_service(legacy)
            .layer(middleware::from_fn_with_state(authenticator, authenticate));

        let router = health_router(Arc::clone(&readiness))
            .merge(protected)
            .layer(build_http_layers(&config.network));

        info!(
            rpc_services = rpc.len(),
            managed_services = services.names().len(),
            subsystems = self.subsystems.len(),
            "node composed"
        );

        Ok(Node {
            network: NetworkModule::new(config.network.clone(), router, Arc::clone(&readiness)),
            config,
            services,
            readiness,
            descriptors: rpc.descriptors(),
            metrics,
            lifecycle_events: Some(lifecycle_events),
            lifecycle_task: None,
            _stream: std::marker::PhantomData,
        })
    }
}

/// A composed node.
pub struct Node<S: StreamId> {
    config: Arc<NodeConfig>,
    network: NetworkModule,
    services: Arc<ServiceRegistry>,
    readiness: Arc<ReadinessController>,
    descriptors: Vec<ServiceDescriptor>,
    metrics: Option<PrometheusHandle>,
    lifecycle_events: Option<broadcast::Receiver<LifecycleEvent>>,
    lifecycle_task: Option<JoinHandle<()>>,
    _stream: std::marker::PhantomData<fn() -> S>,
}

impl<S: StreamId> Node<S> {
    #[must_use]
    pub fn readiness(&self) -> Arc<ReadinessController> {
        Arc::clone(&self.readiness)
    }

    /// The full router as served on `channel`.
    #[must_use]
    pub fn router_for(&self, channel: TransportChannel) -> Router {
        self.network.router_for(channel)
    }

    /// Every registered RPC service, in registration order.
    #[must_use]
    pub fn rpc_services(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    #[must_use]
    pub fn managed_services(&self) -> Arc<ServiceRegistry> {
        Arc::clone(&self.services)
    }

    #[must_use]
    pub fn metrics(&self) -> Option<&PrometheusHandle> {
        self.metrics.as_ref()
    }

    /// Follow core lifecycle events, bind the listeners and start every
    /// managed service.
    ///
    /// # Errors
    ///
    /// Returns an error if a listener cannot bind or a service fails to start.
    pub async fn start(&mut self) -> anyhow::Result<BoundAddresses> {
        if let Some(events) = self.lifecycle_events.take() {
            self.lifecycle_task = Some(self.readiness.spawn_lifecycle_listener(events));
        }
        let bound = self.network.start().await?;
        let ctx = ServiceContext {
            config: Arc::clone(&self.config),
        };
        self.services.init_all(&ctx).await?;
        info!(public = %bound.public, local = ?bound.local, "node started");
        Ok(bound)
    }

    /// Serve until `shutdown` completes, drain, then stop managed services.
    ///
    /// # Errors
    ///
    /// Returns the listener error, if any.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let Self {
            network,
            services,
            lifecycle_task,
            ..
        } = self;

        let served = network.serve(shutdown).await;
        if let Err(error) = services.shutdown_all(false).await {
            warn!(error = %format!("{error:#}"), "managed services did not stop cleanly");
        }
        if let Some(task) = lifecycle_task {
            task.abort();
        }
        info!("node stopped");
        served
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use axum::routing::get;
    use serde_json::{json, Value};
    use streamgate_core::operations::node;
    use streamgate_core::{CoreReply, StreamName};
    use tower::ServiceExt;

    use super::*;
    use crate::network::NetworkConfig;
    use crate::rpc::{RpcCall, RpcError, RpcService, RPC_STATUS_HEADER};
    use crate::security::Credentials;
    use crate::test_support::{BusBehaviour, RecordingBus, StaticReadIndex};

    fn config() -> NodeConfig {
        NodeConfig {
            network: NetworkConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                ..NetworkConfig::default()
            },
            install_metrics: false,
            ..NodeConfig::default()
        }
    }

    fn builder(bus: &Arc<RecordingBus>) -> NodeBuilder<StreamName> {
        NodeBuilder::new(config())
            .bus(bus.clone())
            .read_index(Arc::new(StaticReadIndex::default()))
    }

    fn ok_bus() -> Arc<RecordingBus> {
        RecordingBus::new(BusBehaviour::Reply(CoreReply::Success(json!({"ok": true}))))
    }

    fn admin() -> String {
        Credentials::basic_header("admin", "changeit")
    }

    async fn send(node: &Node<StreamName>, method: Method, uri: &str, auth: Option<&str>, body: Value) -> Response {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            request = request.header(header::AUTHORIZATION, auth);
        }
        let body = if body.is_null() { Body::empty() } else { Body::from(body.to_string()) };
        node.router_for(TransportChannel::Public)
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// RPC service answering every call without touching the bus.
    struct Audit {
        descriptor: ServiceDescriptor,
    }

    #[async_trait]
    impl RpcService for Audit {
        fn descriptor(&self) -> &ServiceDescriptor {
            &self.descriptor
        }

        async fn call(&self, call: RpcCall) -> Result<CoreReply, RpcError> {
            let _principal = call.principal()?;
            Ok(CoreReply::Success(json!({"audited": call.method})))
        }
    }

    struct AuditSubsystem;

    impl Subsystem<StreamName> for AuditSubsystem {
        fn name(&self) -> &'static str {
            "audit"
        }

        fn register(&self, composition: &mut Composition<'_, StreamName>) -> anyhow::Result<()> {
            let descriptor = ServiceDescriptor::new("audit", 1024).method("Ping", node::INFORMATION_READ);
            composition.add_rpc_service(Arc::new(Audit { descriptor }))
        }

        fn configure_routes(&self, router: Router) -> anyhow::Result<Router> {
            Ok(router.route("/audit/ping", get(|| async { "pong" })))
        }
    }

    struct Broken;

    impl Subsystem<StreamName> for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn register(&self, _composition: &mut Composition<'_, StreamName>) -> anyhow::Result<()> {
            anyhow::bail!("missing license")
        }
    }

    /// Re-registers a core service name.
    struct Shadowing;

    impl Subsystem<StreamName> for Shadowing {
        fn name(&self) -> &'static str {
            "shadowing"
        }

        fn register(&self, composition: &mut Composition<'_, StreamName>) -> anyhow::Result<()> {
            let descriptor = ServiceDescriptor::new("streams", 1024).method("Read", node::INFORMATION_READ);
            composition.add_rpc_service(Arc::new(Audit { descriptor }))
        }
    }

    #[test]
    fn missing_bus_fails_startup() {
        let result = NodeBuilder::<StreamName>::new(config())
            .read_index(Arc::new(StaticReadIndex::default()))
            .build();
        assert!(matches!(result, Err(StartupError::MissingDependency("message bus"))));
    }

    #[tokio::test]
    async fn health_probe_skips_authentication() {
        let node = builder(&ok_bus()).build().unwrap();
        let response = send(&node, Method::GET, "/health/live", None, Value::Null).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        node.readiness().apply(LifecycleEvent::SystemReady);
        let response = send(&node, Method::GET, "/health/live", None, Value::Null).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn authentication_precedes_routing() {
        let bus = ok_bus();
        let node = builder(&bus).build().unwrap();

        let response = send(&node, Method::GET, "/no/such/route", None, Value::Null).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = send(&node, Method::POST, "/rpc/streams/Read", None, json!({"stream": "orders", "maxCount": 1})).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&node, Method::GET, "/no/such/route", Some(&admin()), Value::Null).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn rpc_and_legacy_share_the_bridge() {
        let bus = ok_bus();
        let node = builder(&bus).build().unwrap();

        let response = send(
            &node,
            Method::POST,
            "/rpc/streams/Read",
            Some(&admin()),
            json!({"stream": "orders", "maxCount": 10}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[RPC_STATUS_HEADER], "ok");

        let response = send(&node, Method::GET, "/streams/orders", Some(&admin()), Value::Null).await;
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(bus.published().len(), 2);
    }

    #[tokio::test]
    async fn subsystem_services_and_routes_are_protected() {
        let node = builder(&ok_bus())
            .subsystem(Arc::new(AuditSubsystem))
            .build()
            .unwrap();

        let names: Vec<_> = node.rpc_services().iter().map(|d| d.name).collect();
        assert_eq!(names.last(), Some(&"server-features"));
        assert!(names.contains(&"audit"));

        assert_eq!(
            send(&node, Method::GET, "/audit/ping", None, Value::Null).await.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            send(&node, Method::GET, "/audit/ping", Some(&admin()), Value::Null).await.status(),
            StatusCode::OK
        );

        let response = send(&node, Method::POST, "/rpc/audit/Ping", Some(&admin()), json!({})).await;
        assert_eq!(json_body(response).await, json!({"audited": "Ping"}));

        let response = send(
            &node,
            Method::POST,
            "/rpc/server-features/GetSupportedMethods",
            Some(&admin()),
            json!({}),
        )
        .await;
        let services = json_body(response).await["services"].clone();
        assert!(services
            .as_array()
            .unwrap()
            .iter()
            .any(|s| s["service"] == "audit"));
    }

    #[test]
    fn failing_subsystem_aborts_startup_by_name() {
        let result = builder(&ok_bus())
            .subsystem(Arc::new(AuditSubsystem))
            .subsystem(Arc::new(Broken))
            .build();
        match result {
            Err(StartupError::Subsystem { name, error }) => {
                assert_eq!(name, "broken");
                assert!(error.to_string().contains("missing license"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("startup should fail"),
        }
    }

    #[test]
    fn subsystems_cannot_shadow_core_services() {
        let result = builder(&ok_bus()).subsystem(Arc::new(Shadowing)).build();
        assert!(matches!(result, Err(StartupError::Subsystem { name: "shadowing", .. })));
    }

    #[tokio::test]
    async fn metrics_scrape_uses_the_supplied_handle() {
        let recorder = MetricCatalog::standard().builder().unwrap().build_recorder();
        let node = builder(&ok_bus())
            .metrics_handle(recorder.handle())
            .build()
            .unwrap();
        assert!(node.metrics().is_some());

        let response = send(&node, Method::GET, "/metrics", Some(&admin()), Value::Null).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn start_follows_core_lifecycle() {
        let bus = ok_bus();
        let mut node = builder(&bus).build().unwrap();
        let readiness = node.readiness();

        let bound = node.start().await.unwrap();
        assert!(bound.public.port() > 0);
        assert!(!readiness.is_ready());

        bus.emit(LifecycleEvent::SystemReady);
        for _ in 0..100 {
            if readiness.is_ready() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(readiness.is_ready());

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(node.serve(async move {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
