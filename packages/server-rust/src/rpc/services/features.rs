//! `server-features` service.
//!
//! Answers from the descriptors registered before it, so subsystem services
//! are listed too. Nothing is published to the core.

use async_trait::async_trait;
use serde_json::json;
use streamgate_core::operations::node;
use streamgate_core::{CoreReply, Operation, StreamId};

use crate::rpc::descriptor::ServiceDescriptor;
use crate::rpc::service::{RpcCall, RpcService, ServiceDeps};
use crate::rpc::status::RpcError;

pub const NAME: &str = "server-features";

pub struct FeaturesService<S: StreamId> {
    deps: ServiceDeps<S>,
    descriptor: ServiceDescriptor,
    supported: serde_json::Value,
}

impl<S: StreamId> FeaturesService<S> {
    /// `registered` are the descriptors of every other service on the node.
    #[must_use]
    pub fn new(deps: ServiceDeps<S>, registered: &[ServiceDescriptor], max_message_size: usize) -> Self {
        let descriptor = ServiceDescriptor::new(NAME, max_message_size)
            .method("GetSupportedMethods", node::INFORMATION_READ);
        let services: Vec<_> = registered
            .iter()
            .chain(std::iter::once(&descriptor))
            .map(ServiceDescriptor::summary)
            .collect();
        let supported = json!({
            "serverVersion": env!("CARGO_PKG_VERSION"),
            "services": services,
        });
        Self {
            deps,
            descriptor,
            supported,
        }
    }
}

#[async_trait]
impl<S: StreamId> RpcService for FeaturesService<S> {
    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    async fn call(&self, call: RpcCall) -> Result<CoreReply, RpcError> {
        if call.method != "GetSupportedMethods" {
            return Err(call.unimplemented(NAME));
        }
        self.deps
            .authorize(&call, Operation::new(node::INFORMATION_READ))
            .await?;
        Ok(CoreReply::Success(self.supported.clone()))
    }
}

#[cfg(test)]
mod tests {
    use streamgate_core::{Principal, StreamName};

    use super::*;
    use crate::test_support::{deps, rpc_call, BusBehaviour, RecordingBus};

    #[tokio::test]
    async fn lists_registered_services_without_publishing() {
        let bus = RecordingBus::new(BusBehaviour::Hold);
        let registered = vec![ServiceDescriptor::new("projections", 1024)
            .method("Create", node::INFORMATION_READ)];
        let svc: FeaturesService<StreamName> = FeaturesService::new(deps(bus.clone()), &registered, 1024);

        let reply = svc
            .call(rpc_call("GetSupportedMethods", Principal::anonymous(), json!({})))
            .await
            .unwrap();
        let CoreReply::Success(value) = reply else {
            panic!("expected success");
        };
        assert_eq!(value["services"][0]["service"], "projections");
        assert_eq!(value["services"][0]["methods"][0], "Create");
        assert_eq!(value["services"][1]["service"], NAME);
        assert!(bus.published().is_empty());
    }
}
