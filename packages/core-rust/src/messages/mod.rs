//! Internal messages exchanged between the dispatch layer and the core.
//!
//! Every accepted external request becomes exactly one [`InternalMessage`].

pub mod admin;
pub mod cluster;
pub mod reply;
pub mod streams;

pub use admin::{
    MonitoringCommand, OperationsCommand, RedactionCommand, SubscriptionCommand,
    SubscriptionSettings, UserCommand,
};
pub use cluster::{
    ClusterInfo, ElectionCommand, ElectionEnvelope, ElectionKind, GossipCommand, GossipRequest,
    MemberInfo, NodeRole,
};
pub use reply::{CoreReply, DomainFailure, FailureCode};
pub use streams::{ExpectedRevision, ProposedEvent, ReadDirection, StreamCommand, StreamPosition};

use uuid::Uuid;

use crate::stream_id::StreamId;
use crate::types::Principal;

/// A command addressed to the internal core, grouped by domain.
#[derive(Debug, Clone, PartialEq)]
pub enum Command<S: StreamId> {
    Streams(StreamCommand<S>),
    Subscriptions(SubscriptionCommand<S>),
    Users(UserCommand),
    Operations(OperationsCommand),
    Gossip(GossipCommand),
    Elections(ElectionCommand),
    Monitoring(MonitoringCommand),
    Redaction(RedactionCommand<S>),
}

impl<S: StreamId> Command<S> {
    /// Stable, low-cardinality name used in logs and metric labels.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Streams(c) => c.name(),
            Self::Subscriptions(c) => c.name(),
            Self::Users(c) => c.name(),
            Self::Operations(c) => c.name(),
            Self::Gossip(c) => c.name(),
            Self::Elections(_) => "elections",
            Self::Monitoring(_) => "monitoring.stats",
            Self::Redaction(c) => c.name(),
        }
    }
}

/// One message on the internal bus, correlated with its reply by id.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalMessage<S: StreamId> {
    pub correlation_id: Uuid,
    /// Identity the command executes under.
    pub principal: Principal,
    pub command: Command<S>,
}

impl<S: StreamId> InternalMessage<S> {
    #[must_use]
    pub fn new(principal: Principal, command: Command<S>) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            principal,
            command,
        }
    }
}
