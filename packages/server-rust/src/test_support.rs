//! Test doubles shared by unit tests across the crate.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use streamgate_core::messages::OperationsCommand;
use streamgate_core::{
    Command, CoreReply, InternalMessage, LifecycleEvent, Principal, RequestContext, StreamName,
    TransportChannel, TransportKind,
};
use tokio::sync::broadcast;
use tower::Service;

use crate::dispatch::{Dispatch, DispatchBridge, DispatchConfig, DispatchError, ReplyEnvelope};
use crate::network::readiness::ReadinessController;
use crate::rpc::{RpcCall, ServiceDeps};
use crate::security::providers::PolicyAuthorizationProvider;
use crate::security::Authorizer;
use crate::traits::{BusError, MessageBus, ReadIndex};

/// How [`RecordingBus`] treats a published message.
pub(crate) enum BusBehaviour {
    /// Answer every envelope with this reply.
    Reply(CoreReply),
    /// Keep envelopes unanswered until the test takes them.
    Hold,
    /// Drop envelopes without answering.
    Drop,
    /// Refuse every publication.
    Reject(BusError),
}

/// In-memory bus that records everything published to it.
pub(crate) struct RecordingBus {
    behaviour: BusBehaviour,
    published: Mutex<Vec<InternalMessage<StreamName>>>,
    pending: Mutex<Vec<ReplyEnvelope>>,
    lifecycle: broadcast::Sender<LifecycleEvent>,
}

impl RecordingBus {
    pub(crate) fn new(behaviour: BusBehaviour) -> Arc<Self> {
        let (lifecycle, _) = broadcast::channel(16);
        Arc::new(Self {
            behaviour,
            published: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            lifecycle,
        })
    }

    pub(crate) fn published(&self) -> Vec<InternalMessage<StreamName>> {
        self.published.lock().clone()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub(crate) fn take_pending(&self) -> Vec<ReplyEnvelope> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        let _ = self.lifecycle.send(event);
    }
}

impl MessageBus<StreamName> for RecordingBus {
    fn publish(
        &self,
        message: InternalMessage<StreamName>,
        reply_to: Option<ReplyEnvelope>,
    ) -> Result<(), BusError> {
        if let BusBehaviour::Reject(e) = &self.behaviour {
            return Err(e.clone());
        }
        self.published.lock().push(message);
        if let Some(envelope) = reply_to {
            match &self.behaviour {
                BusBehaviour::Reply(reply) => {
                    envelope.reply(reply.clone());
                }
                BusBehaviour::Hold => self.pending.lock().push(envelope),
                BusBehaviour::Drop | BusBehaviour::Reject(_) => drop(envelope),
            }
        }
        Ok(())
    }

    fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.subscribe()
    }
}

/// Read index over a fixed map of last event numbers.
#[derive(Default)]
pub(crate) struct StaticReadIndex(pub HashMap<StreamName, u64>);

impl StaticReadIndex {
    pub(crate) fn with(stream: &str, last: u64) -> Arc<Self> {
        let mut map = HashMap::new();
        map.insert(stream.parse().unwrap(), last);
        Arc::new(Self(map))
    }
}

impl ReadIndex<StreamName> for StaticReadIndex {
    fn last_event_number(&self, stream: &StreamName) -> Option<u64> {
        self.0.get(stream).copied()
    }
}

/// Answers every dispatch with an empty success after a delay.
#[derive(Clone)]
pub(crate) struct DelayedService {
    delay: Duration,
}

impl DelayedService {
    pub(crate) fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
        }
    }
}

impl Service<Dispatch<StreamName>> for DelayedService {
    type Response = CoreReply;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<CoreReply, DispatchError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _dispatch: Dispatch<StreamName>) -> Self::Future {
        let delay = self.delay;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok(CoreReply::Success(serde_json::Value::Null))
        })
    }
}

pub(crate) fn shutdown_dispatch(timeout: Duration) -> Dispatch<StreamName> {
    let message = InternalMessage::new(
        Principal::system(),
        Command::Operations(OperationsCommand::Shutdown),
    );
    Dispatch::new(message, crate::dispatch::DispatchMode::AwaitReply, timeout)
}

/// Service dependencies over `bus` with the default role policy.
pub(crate) fn deps(bus: Arc<RecordingBus>) -> ServiceDeps<StreamName> {
    let bridge = DispatchBridge::new(
        bus,
        DispatchConfig::default(),
        Arc::new(ReadinessController::new()),
    );
    ServiceDeps::new(
        Arc::new(bridge),
        Arc::new(Authorizer::new(Arc::new(PolicyAuthorizationProvider))),
    )
}

pub(crate) fn admin() -> Principal {
    Principal::authenticated("admin", [streamgate_core::roles::ADMINS.to_string()])
}

pub(crate) fn user(id: &str) -> Principal {
    Principal::authenticated(id, Vec::new())
}

/// An RPC call over the public channel.
pub(crate) fn rpc_call(method: &str, principal: Principal, payload: serde_json::Value) -> RpcCall {
    rpc_call_on(TransportChannel::Public, method, principal, payload)
}

pub(crate) fn rpc_call_on(
    channel: TransportChannel,
    method: &str,
    principal: Principal,
    payload: serde_json::Value,
) -> RpcCall {
    let context = RequestContext::new("test", TransportKind::Rpc, channel, format!("/rpc/test/{method}"))
        .with_principal(principal);
    RpcCall {
        context,
        method: method.to_string(),
        payload: Bytes::from(serde_json::to_vec(&payload).unwrap()),
    }
}
