//! `elections` service. Every method is fire-and-forget: the message is
//! published once and the caller gets an empty success immediately.

use async_trait::async_trait;
use streamgate_core::messages::{ElectionCommand, ElectionEnvelope, ElectionKind};
use streamgate_core::operations::node;
use streamgate_core::{Command, CoreReply, Operation, StreamId};

use crate::rpc::descriptor::ServiceDescriptor;
use crate::rpc::service::{RpcCall, RpcService, ServiceDeps};
use crate::rpc::status::RpcError;

pub const NAME: &str = "elections";

pub struct ElectionsService<S: StreamId> {
    deps: ServiceDeps<S>,
    descriptor: ServiceDescriptor,
}

impl<S: StreamId> ElectionsService<S> {
    #[must_use]
    pub fn new(deps: ServiceDeps<S>, max_message_size: usize) -> Self {
        let descriptor = ElectionKind::ALL
            .into_iter()
            .fold(ServiceDescriptor::new(NAME, max_message_size), |d, kind| {
                d.method(kind.method(), node::ELECTIONS)
            });
        Self { deps, descriptor }
    }
}

#[async_trait]
impl<S: StreamId> RpcService for ElectionsService<S> {
    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    async fn call(&self, call: RpcCall) -> Result<CoreReply, RpcError> {
        let Some(kind) = ElectionKind::from_method(&call.method) else {
            return Err(call.unimplemented(NAME));
        };
        let envelope: ElectionEnvelope = call.decode()?;
        let command = Command::Elections(ElectionCommand { kind, envelope });
        self.deps
            .publish(&call, Operation::new(node::ELECTIONS), command)
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use streamgate_core::{Principal, StreamName};

    use super::*;
    use crate::test_support::{deps, rpc_call, BusBehaviour, RecordingBus};

    #[tokio::test]
    async fn publishes_once_without_waiting() {
        // Hold would block an awaiting dispatch forever.
        let bus = RecordingBus::new(BusBehaviour::Hold);
        let svc: ElectionsService<StreamName> = ElectionsService::new(deps(bus.clone()), 1024);
        let body = json!({
            "serverId": "00000000-0000-0000-0000-000000000002",
            "serverAddress": "10.0.0.2:1112",
            "view": 4,
        });

        let reply = svc.call(rpc_call("Prepare", Principal::system(), body)).await.unwrap();
        assert_eq!(reply, CoreReply::empty());
        assert_eq!(bus.pending_count(), 0);

        let published = bus.published();
        assert_eq!(published.len(), 1);
        match &published[0].command {
            Command::Elections(cmd) => {
                assert_eq!(cmd.kind, ElectionKind::Prepare);
                assert_eq!(cmd.envelope.view, 4);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test]
    async fn every_election_kind_is_described() {
        let bus = RecordingBus::new(BusBehaviour::Hold);
        let svc: ElectionsService<StreamName> = ElectionsService::new(deps(bus), 1024);
        assert_eq!(svc.descriptor().methods.len(), ElectionKind::ALL.len());
    }
}
