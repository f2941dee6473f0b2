//! `gossip` (peer protocol) and `client-gossip` services.
//!
//! Both read cluster membership, but under different operations: peers need
//! `$system` for the internal view while any caller may read the client view.

use async_trait::async_trait;
use streamgate_core::messages::{GossipCommand, GossipRequest};
use streamgate_core::operations::node;
use streamgate_core::{Command, CoreReply, Operation, StreamId};

use crate::rpc::descriptor::ServiceDescriptor;
use crate::rpc::service::{RpcCall, RpcService, ServiceDeps};
use crate::rpc::status::RpcError;

pub const NAME: &str = "gossip";
pub const CLIENT_NAME: &str = "client-gossip";

pub struct GossipService<S: StreamId> {
    deps: ServiceDeps<S>,
    descriptor: ServiceDescriptor,
}

impl<S: StreamId> GossipService<S> {
    #[must_use]
    pub fn new(deps: ServiceDeps<S>, max_message_size: usize) -> Self {
        let descriptor = ServiceDescriptor::new(NAME, max_message_size)
            .method("Update", node::GOSSIP_UPDATE)
            .method("Read", node::GOSSIP_READ);
        Self { deps, descriptor }
    }
}

#[async_trait]
impl<S: StreamId> RpcService for GossipService<S> {
    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    async fn call(&self, call: RpcCall) -> Result<CoreReply, RpcError> {
        let (op, command) = match call.method.as_str() {
            "Update" => {
                let req: GossipRequest = call.decode()?;
                if req.server.is_empty() {
                    return Err(RpcError::invalid("server must not be empty"));
                }
                (node::GOSSIP_UPDATE, GossipCommand::Update(req))
            }
            "Read" => (node::GOSSIP_READ, GossipCommand::Read),
            _ => return Err(call.unimplemented(NAME)),
        };
        self.deps
            .execute(&call, Operation::new(op), Command::Gossip(command))
            .await
    }
}

pub struct ClientGossipService<S: StreamId> {
    deps: ServiceDeps<S>,
    descriptor: ServiceDescriptor,
}

impl<S: StreamId> ClientGossipService<S> {
    #[must_use]
    pub fn new(deps: ServiceDeps<S>, max_message_size: usize) -> Self {
        let descriptor =
            ServiceDescriptor::new(CLIENT_NAME, max_message_size).method("Read", node::GOSSIP_CLIENT_READ);
        Self { deps, descriptor }
    }
}

#[async_trait]
impl<S: StreamId> RpcService for ClientGossipService<S> {
    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    async fn call(&self, call: RpcCall) -> Result<CoreReply, RpcError> {
        if call.method != "Read" {
            return Err(call.unimplemented(CLIENT_NAME));
        }
        self.deps
            .execute(
                &call,
                Operation::new(node::GOSSIP_CLIENT_READ),
                Command::Gossip(GossipCommand::ClientRead),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use streamgate_core::{Principal, StreamName};

    use super::*;
    use crate::test_support::{deps, rpc_call, user, BusBehaviour, RecordingBus};

    #[tokio::test]
    async fn internal_gossip_requires_system_role() {
        let bus = RecordingBus::new(BusBehaviour::Reply(CoreReply::Success(json!({"members": []}))));
        let svc: GossipService<StreamName> = GossipService::new(deps(bus.clone()), 1024);

        let err = svc.call(rpc_call("Read", user("ouro"), json!({}))).await.unwrap_err();
        assert_eq!(err.status_name(), "permission-denied");

        let update = json!({"server": "10.0.0.2:1112", "info": {"members": []}});
        svc.call(rpc_call("Update", Principal::system(), update)).await.unwrap();
        assert!(matches!(
            bus.published()[0].command,
            Command::Gossip(GossipCommand::Update(_))
        ));
    }

    #[tokio::test]
    async fn client_gossip_is_open_to_anonymous_callers() {
        let bus = RecordingBus::new(BusBehaviour::Reply(CoreReply::Success(json!({"members": []}))));
        let svc: ClientGossipService<StreamName> = ClientGossipService::new(deps(bus.clone()), 1024);

        let reply = svc
            .call(rpc_call("Read", Principal::anonymous(), json!({})))
            .await
            .unwrap();
        assert!(reply.is_success());
        assert_eq!(
            bus.published()[0].command,
            Command::Gossip(GossipCommand::ClientRead)
        );
    }
}
