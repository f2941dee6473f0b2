//! The node's built-in RPC services.

pub mod elections;
pub mod features;
pub mod gossip;
pub mod monitoring;
pub mod operations;
pub mod redaction;
pub mod streams;
pub mod subscriptions;
pub mod users;

pub use elections::ElectionsService;
pub use features::FeaturesService;
pub use gossip::{ClientGossipService, GossipService};
pub use monitoring::MonitoringService;
pub use operations::OperationsService;
pub use redaction::RedactionService;
pub use streams::StreamsService;
pub use subscriptions::SubscriptionsService;
pub use users::UsersService;

use std::sync::Arc;

use streamgate_core::StreamId;

use super::service::{RpcService, ServiceDeps};
use super::RpcConfig;
use crate::traits::ReadIndex;

/// Every built-in service except `server-features`, which is added last so
/// it can describe services registered by subsystems.
#[must_use]
pub fn core_services<S: StreamId>(
    deps: &ServiceDeps<S>,
    read_index: Arc<dyn ReadIndex<S>>,
    config: &RpcConfig,
) -> Vec<Arc<dyn RpcService>> {
    let size = config.max_receive_message_size;
    vec![
        Arc::new(StreamsService::new(deps.clone(), read_index, config.max_append_size)),
        Arc::new(SubscriptionsService::new(deps.clone(), size)),
        Arc::new(UsersService::new(deps.clone(), size)),
        Arc::new(OperationsService::new(deps.clone(), size)),
        Arc::new(GossipService::new(deps.clone(), size)),
        Arc::new(ClientGossipService::new(deps.clone(), size)),
        Arc::new(ElectionsService::new(deps.clone(), size)),
        Arc::new(MonitoringService::new(deps.clone(), size)),
        Arc::new(RedactionService::new(deps.clone(), size)),
    ]
}
