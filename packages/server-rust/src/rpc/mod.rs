//! Structured-RPC surface.
//!
//! Services are JSON-over-HTTP: `POST /rpc/{service}/{method}`. The registry
//! owns routing and per-service body limits; services own validation and hand
//! authorized commands to the dispatch bridge.

pub mod descriptor;
pub mod registry;
pub mod service;
pub mod services;
pub mod status;

pub use descriptor::{MethodDescriptor, ServiceDescriptor};
pub use registry::{DuplicateService, RpcRegistry};
pub use service::{RpcCall, RpcService, ServiceDeps};
pub use status::{RpcError, RPC_STATUS_HEADER};

/// Transport limits for RPC requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcConfig {
    /// Body limit for every service except `streams`.
    pub max_receive_message_size: usize,
    /// Body limit for `streams`, and so the largest append.
    pub max_append_size: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_receive_message_size: 4 * 1024 * 1024,
            max_append_size: 1024 * 1024,
        }
    }
}
