//! `redaction` service.
//!
//! Only reachable over the local channel. The channel check runs before
//! authorization, so a remote caller learns nothing about its permissions.

use async_trait::async_trait;
use serde::Deserialize;
use streamgate_core::messages::RedactionCommand;
use streamgate_core::operation::STREAM_ID;
use streamgate_core::operations::node;
use streamgate_core::{Command, CoreReply, Operation, StreamId};

use crate::rpc::descriptor::ServiceDescriptor;
use crate::rpc::service::{RpcCall, RpcService, ServiceDeps};
use crate::rpc::status::RpcError;

pub const NAME: &str = "redaction";

#[derive(Debug, Deserialize)]
#[serde(bound = "S: StreamId")]
struct PositionsRequest<S> {
    stream: S,
    revisions: Vec<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchChunkRequest {
    target_chunk: String,
    input_chunk: String,
}

/// A chunk file name: non-empty, no directory components.
fn chunk_name(field: &str, name: String) -> Result<String, RpcError> {
    if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
        return Err(RpcError::invalid(format!("{field} must be a bare file name")));
    }
    Ok(name)
}

pub struct RedactionService<S: StreamId> {
    deps: ServiceDeps<S>,
    descriptor: ServiceDescriptor,
}

impl<S: StreamId> RedactionService<S> {
    #[must_use]
    pub fn new(deps: ServiceDeps<S>, max_message_size: usize) -> Self {
        let descriptor = ServiceDescriptor::new(NAME, max_message_size)
            .method("GetEventPositions", node::REDACTION)
            .method("SwitchChunk", node::REDACTION);
        Self { deps, descriptor }
    }
}

#[async_trait]
impl<S: StreamId> RpcService for RedactionService<S> {
    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    async fn call(&self, call: RpcCall) -> Result<CoreReply, RpcError> {
        if !call.context.channel.is_local() {
            return Err(RpcError::invalid("redaction is only available over the local channel"));
        }
        let (op, command) = match call.method.as_str() {
            "GetEventPositions" => {
                let req: PositionsRequest<S> = call.decode()?;
                if req.revisions.is_empty() {
                    return Err(RpcError::invalid("revisions must not be empty"));
                }
                let op = Operation::new(node::REDACTION).with_parameter(STREAM_ID, &req.stream);
                let command = RedactionCommand::GetEventPositions {
                    stream: req.stream,
                    revisions: req.revisions,
                };
                (op, command)
            }
            "SwitchChunk" => {
                let req: SwitchChunkRequest = call.decode()?;
                let command = RedactionCommand::SwitchChunk {
                    target_chunk: chunk_name("targetChunk", req.target_chunk)?,
                    input_chunk: chunk_name("inputChunk", req.input_chunk)?,
                };
                (Operation::new(node::REDACTION), command)
            }
            _ => return Err(call.unimplemented(NAME)),
        };
        self.deps.execute(&call, op, Command::Redaction(command)).await
    }
}
