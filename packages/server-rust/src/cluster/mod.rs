//! Cluster topology and the node's own outbound gossip.
//!
//! Membership and elections are decided by the core; this module only
//! carries the deployment topology and pushes gossip to seed peers.

pub mod discovery;
pub mod peer_client;
pub mod topology;

pub use discovery::{GossipRound, GossipSeedDiscovery, GossipTask};
pub use peer_client::{PeerClient, PeerError, PeerRequest, RetryingPeerClient};
pub use topology::ClusterConfig;
