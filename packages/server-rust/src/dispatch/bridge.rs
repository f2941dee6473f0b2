//! The single choke point between protocol surfaces and the internal core.
//!
//! Both the structured-RPC services and the legacy HTTP pipeline reach the
//! core only through [`DispatchBridge`]. Every call requires an
//! [`Authorized`] grant, so nothing unauthenticated or unauthorized can be
//! published.

use std::sync::Arc;
use std::time::Duration;

use streamgate_core::{Command, CoreReply, InternalMessage, StreamId};
use tower::ServiceExt;

use super::bus::BusService;
use super::pipeline::{build_dispatch_pipeline, DispatchPipeline};
use super::request::{Dispatch, DispatchConfig, DispatchError, DispatchMode};
use crate::network::readiness::ReadinessController;
use crate::security::Authorized;
use crate::traits::MessageBus;

pub struct DispatchBridge<S: StreamId> {
    pipeline: DispatchPipeline<S>,
    config: DispatchConfig,
    readiness: Arc<ReadinessController>,
}

impl<S: StreamId> DispatchBridge<S> {
    #[must_use]
    pub fn new(
        bus: Arc<dyn MessageBus<S>>,
        config: DispatchConfig,
        readiness: Arc<ReadinessController>,
    ) -> Self {
        let pipeline = build_dispatch_pipeline(BusService::new(bus), &config);
        Self {
            pipeline,
            config,
            readiness,
        }
    }

    /// Publish `command` under the granted principal and await its reply.
    ///
    /// A domain failure from the core is returned as `Ok(CoreReply::Failure)`.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError` when the bus is unavailable, the pipeline is
    /// overloaded, or no reply arrives within the timeout.
    pub async fn dispatch(
        &self,
        grant: Authorized,
        command: Command<S>,
    ) -> Result<CoreReply, DispatchError> {
        let timeout = self.timeout_for(&command);
        self.send(grant, command, DispatchMode::AwaitReply, timeout)
            .await
    }

    /// Publish `command` without waiting for any reply.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError` when the bus refuses the message.
    pub async fn publish(&self, grant: Authorized, command: Command<S>) -> Result<(), DispatchError> {
        let timeout = self.config.default_timeout;
        self.send(grant, command, DispatchMode::FireAndForget, timeout)
            .await
            .map(|_| ())
    }

    fn timeout_for(&self, command: &Command<S>) -> Duration {
        use streamgate_core::messages::StreamCommand;
        match command {
            Command::Streams(StreamCommand::Append { .. } | StreamCommand::Delete { .. }) => {
                self.config.write_timeout
            }
            _ => self.config.default_timeout,
        }
    }

    async fn send(
        &self,
        grant: Authorized,
        command: Command<S>,
        mode: DispatchMode,
        timeout: Duration,
    ) -> Result<CoreReply, DispatchError> {
        let _in_flight = self.readiness.in_flight_guard();
        let message = InternalMessage::new(grant.into_principal(), command);
        tracing::debug!(
            correlation_id = %message.correlation_id,
            command = message.command.name(),
            principal = %message.principal.id,
            "dispatching to core"
        );
        self.pipeline
            .clone()
            .oneshot(Dispatch::new(message, mode, timeout))
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
