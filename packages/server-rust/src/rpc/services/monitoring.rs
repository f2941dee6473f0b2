//! `monitoring` service.

use async_trait::async_trait;
use serde::Deserialize;
use streamgate_core::messages::MonitoringCommand;
use streamgate_core::operations::node;
use streamgate_core::{Command, CoreReply, Operation, StreamId};

use crate::rpc::descriptor::ServiceDescriptor;
use crate::rpc::service::{RpcCall, RpcService, ServiceDeps};
use crate::rpc::status::RpcError;

pub const NAME: &str = "monitoring";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StatsRequest {
    use_metadata: bool,
}

pub struct MonitoringService<S: StreamId> {
    deps: ServiceDeps<S>,
    descriptor: ServiceDescriptor,
}

impl<S: StreamId> MonitoringService<S> {
    #[must_use]
    pub fn new(deps: ServiceDeps<S>, max_message_size: usize) -> Self {
        let descriptor =
            ServiceDescriptor::new(NAME, max_message_size).method("Stats", node::STATISTICS_READ);
        Self { deps, descriptor }
    }
}

#[async_trait]
impl<S: StreamId> RpcService for MonitoringService<S> {
    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    async fn call(&self, call: RpcCall) -> Result<CoreReply, RpcError> {
        if call.method != "Stats" {
            return Err(call.unimplemented(NAME));
        }
        let req: StatsRequest = call.decode()?;
        let command = Command::Monitoring(MonitoringCommand::Stats {
            use_metadata: req.use_metadata,
        });
        self.deps
            .execute(&call, Operation::new(node::STATISTICS_READ), command)
            .await
    }
}
