//! `persistent-subscriptions` service.

use async_trait::async_trait;
use serde::Deserialize;
use streamgate_core::messages::{SubscriptionCommand, SubscriptionSettings};
use streamgate_core::operation::STREAM_ID;
use streamgate_core::operations::subscriptions::{CREATE, DELETE, REPLAY_PARKED, STATISTICS, UPDATE};
use streamgate_core::{Command, CoreReply, Operation, OperationDefinition, StreamId};

use crate::rpc::descriptor::ServiceDescriptor;
use crate::rpc::service::{RpcCall, RpcService, ServiceDeps};
use crate::rpc::status::RpcError;

pub const NAME: &str = "persistent-subscriptions";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound = "S: StreamId")]
struct GroupRequest<S> {
    stream: S,
    group: String,
    #[serde(default)]
    settings: SubscriptionSettings,
    #[serde(default)]
    stop_at: Option<u64>,
}

impl<S: StreamId> GroupRequest<S> {
    fn operation(&self, definition: OperationDefinition) -> Operation {
        Operation::new(definition).with_parameter(STREAM_ID, &self.stream)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound = "S: StreamId")]
struct ListRequest<S> {
    #[serde(default)]
    stream: Option<S>,
}

pub struct SubscriptionsService<S: StreamId> {
    deps: ServiceDeps<S>,
    descriptor: ServiceDescriptor,
}

impl<S: StreamId> SubscriptionsService<S> {
    #[must_use]
    pub fn new(deps: ServiceDeps<S>, max_message_size: usize) -> Self {
        let descriptor = ServiceDescriptor::new(NAME, max_message_size)
            .method("Create", CREATE)
            .method("Update", UPDATE)
            .method("Delete", DELETE)
            .method("GetInfo", STATISTICS)
            .method("List", STATISTICS)
            .method("ReplayParked", REPLAY_PARKED);
        Self { deps, descriptor }
    }

    fn group_request(call: &RpcCall) -> Result<GroupRequest<S>, RpcError> {
        let req: GroupRequest<S> = call.decode()?;
        if req.group.trim().is_empty() {
            return Err(RpcError::invalid("group must not be empty"));
        }
        Ok(req)
    }
}

#[async_trait]
impl<S: StreamId> RpcService for SubscriptionsService<S> {
    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    async fn call(&self, call: RpcCall) -> Result<CoreReply, RpcError> {
        let Some(method) = self.descriptor.find(&call.method).copied() else {
            return Err(call.unimplemented(NAME));
        };
        let (op, command) = if method.name == "List" {
            let req: ListRequest<S> = call.decode()?;
            let mut op = Operation::new(method.operation);
            if let Some(stream) = &req.stream {
                op = op.with_parameter(STREAM_ID, stream);
            }
            (op, SubscriptionCommand::List { stream: req.stream })
        } else {
            let req = Self::group_request(&call)?;
            let op = req.operation(method.operation);
            let GroupRequest {
                stream,
                group,
                settings,
                stop_at,
            } = req;
            let command = match method.name {
                "Create" => SubscriptionCommand::Create {
                    stream,
                    group,
                    settings,
                },
                "Update" => SubscriptionCommand::Update {
                    stream,
                    group,
                    settings,
                },
                "Delete" => SubscriptionCommand::Delete { stream, group },
                "GetInfo" => SubscriptionCommand::GetInfo { stream, group },
                _ => SubscriptionCommand::ReplayParked {
                    stream,
                    group,
                    stop_at,
                },
            };
            (op, command)
        };
        self.deps
            .execute(&call, op, Command::Subscriptions(command))
            .await
    }
}
