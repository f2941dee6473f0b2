//! Cluster gossip and leader-election payloads.
//!
//! Field names are camelCase on the wire so peers running other builds can
//! exchange gossip without a shared schema crate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Gossip
// ---------------------------------------------------------------------------

/// Role a node currently plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeRole {
    Initializing,
    DiscoverLeader,
    Unknown,
    PreLeader,
    Leader,
    Follower,
    ReadOnlyReplica,
    ShuttingDown,
    Shutdown,
}

/// One member as seen by the gossiping node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub instance_id: Uuid,
    /// `host:port` of the member's internal (cluster) endpoint.
    pub internal_address: String,
    /// `host:port` clients should use to reach the member.
    pub advertised_address: String,
    pub role: NodeRole,
    pub is_alive: bool,
    #[serde(default)]
    pub writer_checkpoint: i64,
}

/// A full membership view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub members: Vec<MemberInfo>,
}

/// A gossip round pushed from one node to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GossipRequest {
    /// `host:port` of the sender's internal endpoint.
    pub server: String,
    pub info: ClusterInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GossipCommand {
    /// A peer pushed its view; the reply is this node's merged view.
    Update(GossipRequest),
    /// Full internal view, for peers.
    Read,
    /// Client-facing view (advertised endpoints only).
    ClientRead,
}

impl GossipCommand {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Update(_) => "gossip.update",
            Self::Read => "gossip.read",
            Self::ClientRead => "gossip.client-read",
        }
    }
}

// ---------------------------------------------------------------------------
// Elections
// ---------------------------------------------------------------------------

/// Election protocol message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElectionKind {
    ViewChange,
    ViewChangeProof,
    Prepare,
    PrepareOk,
    Proposal,
    Accept,
    LeaderIsResigning,
    LeaderIsResigningOk,
}

impl ElectionKind {
    pub const ALL: [ElectionKind; 8] = [
        Self::ViewChange,
        Self::ViewChangeProof,
        Self::Prepare,
        Self::PrepareOk,
        Self::Proposal,
        Self::Accept,
        Self::LeaderIsResigning,
        Self::LeaderIsResigningOk,
    ];

    /// RPC method name for this message kind.
    #[must_use]
    pub fn method(self) -> &'static str {
        match self {
            Self::ViewChange => "ViewChange",
            Self::ViewChangeProof => "ViewChangeProof",
            Self::Prepare => "Prepare",
            Self::PrepareOk => "PrepareOk",
            Self::Proposal => "Proposal",
            Self::Accept => "Accept",
            Self::LeaderIsResigning => "LeaderIsResigning",
            Self::LeaderIsResigningOk => "LeaderIsResigningOk",
        }
    }

    #[must_use]
    pub fn from_method(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.method() == method)
    }
}

/// Header common to every election message; the rest of the message is
/// opaque to the dispatch layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionEnvelope {
    pub server_id: Uuid,
    pub server_address: String,
    #[serde(default)]
    pub view: i32,
    #[serde(default)]
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElectionCommand {
    pub kind: ElectionKind,
    pub envelope: ElectionEnvelope,
}
