//! Streamgate server: the network-facing layer of a Streamgate node.
//!
//! Serves a structured-RPC surface, a legacy HTTP surface and a health probe
//! on one endpoint, authenticates and authorizes every request, and bridges
//! accepted requests onto the core's internal message bus.

pub mod cluster;
pub mod config;
pub mod dispatch;
pub mod legacy;
pub mod network;
pub mod node;
pub mod observability;
pub mod rpc;
pub mod security;
pub mod service;
pub mod subsystem;
pub mod telemetry;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, NodeConfig, NodeOptions};
pub use dispatch::{DispatchBridge, DispatchConfig, DispatchError};
pub use node::{Node, NodeBuilder, StartupError};
pub use subsystem::{Composition, Subsystem};
pub use traits::{BusError, MessageBus, ReadIndex};
