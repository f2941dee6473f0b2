use std::any::{Any, TypeId};
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::config::NodeConfig;

/// Context handed to every managed service when the node starts.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub config: Arc<NodeConfig>,
}

/// A component with a start/stop lifecycle owned by the node.
///
/// Services are initialized in registration order and shut down in reverse.
/// The `Any` bound allows typed lookup through [`ServiceRegistry::get`].
#[async_trait]
pub trait ManagedService: Send + Sync + Any {
    /// Unique name, used in logs and startup errors.
    fn name(&self) -> &'static str;

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()>;

    /// Stop the service. `terminate` skips graceful cleanup.
    async fn shutdown(&self, terminate: bool) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("managed service '{0}' is already registered")]
pub struct DuplicateManagedService(pub &'static str);

/// Lifecycle-managed services, by name and by concrete type.
pub struct ServiceRegistry {
    by_name: DashMap<&'static str, Arc<dyn ManagedService>>,
    by_type: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    order: RwLock<Vec<&'static str>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: DashMap::new(),
            by_type: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Register a service. Registration order is lifecycle order.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateManagedService` if the name is taken.
    pub fn register<T: ManagedService>(&self, service: Arc<T>) -> Result<(), DuplicateManagedService> {
        let name = service.name();
        let mut order = self.order.write();
        if self.by_name.contains_key(name) {
            return Err(DuplicateManagedService(name));
        }
        self.by_name.insert(name, service.clone());
        self.by_type.insert(TypeId::of::<T>(), service);
        order.push(name);
        tracing::debug!(service = name, "managed service registered");
        Ok(())
    }

    pub fn get<T: ManagedService>(&self) -> Option<Arc<T>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value().clone().downcast::<T>().ok())
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn ManagedService>> {
        self.by_name.get(name).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.order.read().clone()
    }

    /// Initialize every service in registration order, stopping at the
    /// first failure.
    ///
    /// # Errors
    ///
    /// Returns the failing service's error, annotated with its name.
    pub async fn init_all(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        for name in self.names() {
            if let Some(service) = self.get_by_name(name) {
                service
                    .init(ctx)
                    .await
                    .with_context(|| format!("managed service '{name}' failed to start"))?;
                tracing::info!(service = name, "managed service started");
            }
        }
        Ok(())
    }

    /// Shut every service down in reverse registration order. Every service
    /// is asked to stop even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first shutdown error.
    pub async fn shutdown_all(&self, terminate: bool) -> anyhow::Result<()> {
        let mut first_error = None;
        for name in self.names().into_iter().rev() {
            let Some(service) = self.get_by_name(name) else {
                continue;
            };
            if let Err(error) = service.shutdown(terminate).await {
                tracing::warn!(service = name, %error, "managed service failed to stop");
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorded {
        name: &'static str,
        log: Log,
        fail_init: bool,
        fail_shutdown: bool,
    }

    impl Recorded {
        fn new(name: &'static str, log: &Log) -> Arc<Self> {
            Arc::new(Self {
                name,
                log: Arc::clone(log),
                fail_init: false,
                fail_shutdown: false,
            })
        }
    }

    #[async_trait]
    impl ManagedService for Recorded {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
            self.log.lock().push(format!("init:{}", self.name));
            if self.fail_init {
                anyhow::bail!("boom");
            }
            Ok(())
        }

        async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
            self.log.lock().push(format!("stop:{}", self.name));
            if self.fail_shutdown {
                anyhow::bail!("stuck");
            }
            Ok(())
        }
    }

    struct Marker;

    #[async_trait]
    impl ManagedService for Marker {
        fn name(&self) -> &'static str {
            "marker"
        }
        async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
            Ok(())
        }
        async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn ctx() -> ServiceContext {
        ServiceContext {
            config: Arc::new(NodeConfig::default()),
        }
    }

    #[test]
    fn lookup_by_name_and_type() {
        let registry = ServiceRegistry::new();
        registry.register(Arc::new(Marker)).unwrap();

        assert_eq!(registry.get_by_name("marker").map(|s| s.name()), Some("marker"));
        assert!(registry.get::<Marker>().is_some());
        assert!(registry.get_by_name("missing").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = ServiceRegistry::new();
        let log = Log::default();
        registry.register(Recorded::new("gossip", &log)).unwrap();
        assert_eq!(
            registry.register(Recorded::new("gossip", &log)),
            Err(DuplicateManagedService("gossip"))
        );
        assert_eq!(registry.names(), vec!["gossip"]);
    }

    #[tokio::test]
    async fn lifecycle_runs_forward_then_reverse() {
        let log = Log::default();
        let registry = ServiceRegistry::new();
        for name in ["first", "second", "third"] {
            registry.register(Recorded::new(name, &log)).unwrap();
        }

        registry.init_all(&ctx()).await.unwrap();
        registry.shutdown_all(false).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["init:first", "init:second", "init:third", "stop:third", "stop:second", "stop:first"]
        );
    }

    #[tokio::test]
    async fn init_failure_names_the_service_and_stops() {
        let log = Log::default();
        let registry = ServiceRegistry::new();
        registry
            .register(Arc::new(Recorded {
                fail_init: true,
                ..Arc::into_inner(Recorded::new("broken", &log)).unwrap()
            }))
            .unwrap();
        registry.register(Recorded::new("after", &log)).unwrap();

        let error = registry.init_all(&ctx()).await.unwrap_err();
        assert!(error.to_string().contains("broken"));
        assert_eq!(*log.lock(), vec!["init:broken"]);
    }

    #[tokio::test]
    async fn shutdown_continues_past_failures() {
        let log = Log::default();
        let registry = ServiceRegistry::new();
        registry.register(Recorded::new("first", &log)).unwrap();
        registry
            .register(Arc::new(Recorded {
                fail_shutdown: true,
                ..Arc::into_inner(Recorded::new("second", &log)).unwrap()
            }))
            .unwrap();

        assert!(registry.shutdown_all(true).await.is_err());
        assert_eq!(*log.lock(), vec!["stop:second", "stop:first"]);
    }
}
