//! `streams` service: read, append, delete and tombstone.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use streamgate_core::messages::{
    ExpectedRevision, ProposedEvent, ReadDirection, StreamCommand, StreamPosition,
};
use streamgate_core::operation::STREAM_ID;
use streamgate_core::{operations, Command, CoreReply, Operation, OperationDefinition, StreamId};

use crate::rpc::descriptor::ServiceDescriptor;
use crate::rpc::service::{RpcCall, RpcService, ServiceDeps};
use crate::rpc::status::RpcError;
use crate::traits::ReadIndex;

pub const NAME: &str = "streams";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound = "S: StreamId")]
struct ReadRequest<S> {
    stream: S,
    #[serde(default)]
    from: Option<StreamPosition>,
    #[serde(default)]
    direction: ReadDirection,
    max_count: u64,
    #[serde(default)]
    resolve_links: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound = "S: StreamId")]
struct AppendRequest<S> {
    stream: S,
    #[serde(default)]
    expected: ExpectedRevision,
    events: Vec<ProposedEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound = "S: StreamId")]
struct DeleteRequest<S> {
    stream: S,
    #[serde(default)]
    expected: ExpectedRevision,
}

pub struct StreamsService<S: StreamId> {
    deps: ServiceDeps<S>,
    read_index: Arc<dyn ReadIndex<S>>,
    descriptor: ServiceDescriptor,
}

impl<S: StreamId> StreamsService<S> {
    /// `max_append_size` bounds the request body, and so the largest append.
    #[must_use]
    pub fn new(deps: ServiceDeps<S>, read_index: Arc<dyn ReadIndex<S>>, max_append_size: usize) -> Self {
        use operations::streams::{DELETE, READ, WRITE};
        let descriptor = ServiceDescriptor::new(NAME, max_append_size)
            .method("Read", READ)
            .method("Append", WRITE)
            .method("Delete", DELETE)
            .method("Tombstone", DELETE);
        Self {
            deps,
            read_index,
            descriptor,
        }
    }

    /// Backward reads from the end start at the last committed event.
    fn start_position(&self, stream: &S, from: Option<StreamPosition>, direction: ReadDirection) -> StreamPosition {
        match (direction, from) {
            (ReadDirection::Forwards, None) => StreamPosition::Start,
            (ReadDirection::Backwards, None | Some(StreamPosition::End)) => self
                .read_index
                .last_event_number(stream)
                .map_or(StreamPosition::End, StreamPosition::Revision),
            (_, Some(position)) => position,
        }
    }

    async fn delete(&self, call: &RpcCall, hard: bool) -> Result<CoreReply, RpcError> {
        let req: DeleteRequest<S> = call.decode()?;
        let op = stream_operation(operations::streams::DELETE, &req.stream);
        let command = StreamCommand::Delete {
            stream: req.stream,
            expected: req.expected,
            hard,
        };
        self.deps.execute(call, op, Command::Streams(command)).await
    }
}

fn stream_operation<S: StreamId>(definition: OperationDefinition, stream: &S) -> Operation {
    Operation::new(definition).with_parameter(STREAM_ID, stream)
}

#[async_trait]
impl<S: StreamId> RpcService for StreamsService<S> {
    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    async fn call(&self, call: RpcCall) -> Result<CoreReply, RpcError> {
        match call.method.as_str() {
            "Read" => {
                let req: ReadRequest<S> = call.decode()?;
                if req.max_count == 0 {
                    return Err(RpcError::invalid("maxCount must be positive"));
                }
                let op = stream_operation(operations::streams::READ, &req.stream);
                // The read index is only consulted for callers allowed to read.
                let grant = self.deps.authorize(&call, op).await?;
                let from = self.start_position(&req.stream, req.from, req.direction);
                let command = StreamCommand::Read {
                    stream: req.stream,
                    from,
                    direction: req.direction,
                    max_count: req.max_count,
                    resolve_links: req.resolve_links,
                };
                Ok(self.deps.bridge.dispatch(grant, Command::Streams(command)).await?)
            }
            "Append" => {
                let req: AppendRequest<S> = call.decode()?;
                if req.events.is_empty() {
                    return Err(RpcError::invalid("append requires at least one event"));
                }
                if req.events.iter().any(|e| e.event_type.is_empty()) {
                    return Err(RpcError::invalid("eventType must not be empty"));
                }
                let op = stream_operation(operations::streams::WRITE, &req.stream);
                let command = StreamCommand::Append {
                    stream: req.stream,
                    expected: req.expected,
                    events: req.events,
                };
                self.deps.execute(&call, op, Command::Streams(command)).await
            }
            "Delete" => self.delete(&call, false).await,
            "Tombstone" => self.delete(&call, true).await,
            _ => Err(call.unimplemented(NAME)),
        }
    }
}
