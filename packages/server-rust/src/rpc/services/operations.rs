//! `operations` service: node maintenance commands.

use async_trait::async_trait;
use serde::Deserialize;
use streamgate_core::messages::OperationsCommand;
use streamgate_core::operations::{node, subscriptions};
use streamgate_core::{Command, CoreReply, Operation, StreamId};

use crate::rpc::descriptor::ServiceDescriptor;
use crate::rpc::service::{RpcCall, RpcService, ServiceDeps};
use crate::rpc::status::RpcError;

pub const NAME: &str = "operations";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ScavengeRequest {
    threads: u32,
    start_from_chunk: u32,
}

impl Default for ScavengeRequest {
    fn default() -> Self {
        Self {
            threads: 1,
            start_from_chunk: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopScavengeRequest {
    scavenge_id: String,
}

#[derive(Debug, Deserialize)]
struct PriorityRequest {
    priority: i32,
}

pub struct OperationsService<S: StreamId> {
    deps: ServiceDeps<S>,
    descriptor: ServiceDescriptor,
}

impl<S: StreamId> OperationsService<S> {
    #[must_use]
    pub fn new(deps: ServiceDeps<S>, max_message_size: usize) -> Self {
        let descriptor = ServiceDescriptor::new(NAME, max_message_size)
            .method("StartScavenge", node::SCAVENGE_START)
            .method("StopScavenge", node::SCAVENGE_STOP)
            .method("Shutdown", node::SHUTDOWN)
            .method("MergeIndexes", node::MERGE_INDEXES)
            .method("ResignNode", node::RESIGN)
            .method("SetNodePriority", node::SET_PRIORITY)
            .method("RestartPersistentSubscriptions", subscriptions::RESTART);
        Self { deps, descriptor }
    }
}

#[async_trait]
impl<S: StreamId> RpcService for OperationsService<S> {
    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    async fn call(&self, call: RpcCall) -> Result<CoreReply, RpcError> {
        let Some(method) = self.descriptor.find(&call.method).copied() else {
            return Err(call.unimplemented(NAME));
        };
        let command = match method.name {
            "StartScavenge" => {
                let req: ScavengeRequest = call.decode()?;
                if req.threads == 0 {
                    return Err(RpcError::invalid("threads must be positive"));
                }
                OperationsCommand::StartScavenge {
                    threads: req.threads,
                    start_from_chunk: req.start_from_chunk,
                }
            }
            "StopScavenge" => {
                let req: StopScavengeRequest = call.decode()?;
                if req.scavenge_id.is_empty() {
                    return Err(RpcError::invalid("scavengeId must not be empty"));
                }
                OperationsCommand::StopScavenge {
                    scavenge_id: req.scavenge_id,
                }
            }
            "SetNodePriority" => {
                let req: PriorityRequest = call.decode()?;
                OperationsCommand::SetNodePriority {
                    priority: req.priority,
                }
            }
            "Shutdown" => OperationsCommand::Shutdown,
            "MergeIndexes" => OperationsCommand::MergeIndexes,
            "ResignNode" => OperationsCommand::ResignNode,
            _ => OperationsCommand::RestartPersistentSubscriptions,
        };
        self.deps
            .execute(&call, Operation::new(method.operation), Command::Operations(command))
            .await
    }
}
