//! Pluggable extensions applied after the core registrations.
//!
//! A [`Subsystem`] may add RPC services, lifecycle-managed services and
//! metrics through a [`Composition`], then extend the protected router. Its
//! routes always sit inside the core authentication layer.

use std::sync::Arc;

use axum::Router;
use streamgate_core::StreamId;

use crate::config::NodeConfig;
use crate::observability::MetricCatalog;
use crate::rpc::{RpcRegistry, RpcService, ServiceDeps};
use crate::service::{ManagedService, ServiceRegistry};
use crate::traits::ReadIndex;

pub trait Subsystem<S: StreamId>: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Register services. Called once, in configured order.
    ///
    /// # Errors
    ///
    /// Any error aborts node startup.
    fn register(&self, composition: &mut Composition<'_, S>) -> anyhow::Result<()>;

    /// Add routes or middleware to the protected router. Called after every
    /// subsystem has registered, in the same order.
    ///
    /// # Errors
    ///
    /// Any error aborts node startup.
    fn configure_routes(&self, router: Router) -> anyhow::Result<Router> {
        Ok(router)
    }
}

/// Registration surface handed to each subsystem.
pub struct Composition<'a, S: StreamId> {
    pub(crate) config: &'a NodeConfig,
    pub(crate) deps: &'a ServiceDeps<S>,
    pub(crate) read_index: &'a Arc<dyn ReadIndex<S>>,
    pub(crate) rpc: &'a mut RpcRegistry,
    pub(crate) services: &'a ServiceRegistry,
    pub(crate) metrics: &'a mut MetricCatalog,
}

impl<S: StreamId> Composition<'_, S> {
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        self.config
    }

    /// Bridge and authorizer for building RPC services.
    #[must_use]
    pub fn deps(&self) -> &ServiceDeps<S> {
        self.deps
    }

    #[must_use]
    pub fn read_index(&self) -> Arc<dyn ReadIndex<S>> {
        Arc::clone(self.read_index)
    }

    /// # Errors
    ///
    /// Fails if a service with the same name is already registered.
    pub fn add_rpc_service(&mut self, service: Arc<dyn RpcService>) -> anyhow::Result<()> {
        Ok(self.rpc.register(service)?)
    }

    /// # Errors
    ///
    /// Fails if a managed service with the same name is already registered.
    pub fn add_managed_service<T: ManagedService>(&self, service: Arc<T>) -> anyhow::Result<()> {
        Ok(self.services.register(service)?)
    }

    /// The catalog installed once every subsystem has registered.
    pub fn metrics(&mut self) -> &mut MetricCatalog {
        self.metrics
    }
}
