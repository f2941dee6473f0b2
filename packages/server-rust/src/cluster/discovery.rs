//! Gossip seed discovery.
//!
//! Every interval the node reads its own membership view from the core,
//! stamps its own entry with the client-facing address, pushes it to each
//! seed through the retrying [`PeerClient`], and publishes each seed's answer
//! back onto the bus as a `Gossip::Update`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use streamgate_core::messages::{ClusterInfo, GossipCommand, GossipRequest};
use streamgate_core::operations::node;
use streamgate_core::{Command, CoreReply, Operation, StreamId};
use tower::ServiceExt;
use tracing::{debug, info, warn};

use super::peer_client::{PeerRequest, RetryingPeerClient};
use super::topology::ClusterConfig;
use crate::dispatch::DispatchBridge;
use crate::observability::catalog::GOSSIP_ROUND_SECONDS;
use crate::security::Authorized;
use crate::service::{BackgroundRunnable, BackgroundWorker, ManagedService, ServiceContext};

pub const NAME: &str = "gossip-seed-discovery";

#[derive(Debug)]
pub enum GossipTask {
    /// Push immediately instead of waiting for the next tick.
    PushNow,
}

/// One node's gossip round: read the local view, push it to every seed.
pub struct GossipRound<S: StreamId> {
    bridge: Arc<DispatchBridge<S>>,
    client: RetryingPeerClient,
    server: String,
    /// Client-facing `host:port` of this node.
    advertised: String,
    peers: Vec<String>,
}

impl<S: StreamId> Clone for GossipRound<S> {
    fn clone(&self) -> Self {
        Self {
            bridge: Arc::clone(&self.bridge),
            client: self.client.clone(),
            server: self.server.clone(),
            advertised: self.advertised.clone(),
            peers: self.peers.clone(),
        }
    }
}

impl<S: StreamId> GossipRound<S> {
    #[must_use]
    pub fn new(
        bridge: Arc<DispatchBridge<S>>,
        client: RetryingPeerClient,
        server: String,
        advertised: String,
        peers: Vec<String>,
    ) -> Self {
        Self {
            bridge,
            client,
            server,
            advertised,
            peers,
        }
    }

    async fn local_view(&self) -> Option<ClusterInfo> {
        let grant = Authorized::system(Operation::new(node::GOSSIP_READ));
        match self.bridge.dispatch(grant, Command::Gossip(GossipCommand::Read)).await {
            Ok(CoreReply::Success(value)) => serde_json::from_value(value)
                .inspect_err(|error| warn!(%error, "unreadable gossip view from core"))
                .ok(),
            Ok(CoreReply::Failure(failure)) => {
                warn!(code = failure.code.as_str(), message = %failure.message, "core refused gossip read");
                None
            }
            Err(error) => {
                warn!(%error, "gossip read dispatch failed");
                None
            }
        }
    }

    /// Run one round. Returns how many peers answered.
    pub async fn push_all(&self) -> usize {
        let started = Instant::now();
        let Some(mut info) = self.local_view().await else {
            return 0;
        };
        // The core only knows internal endpoints.
        for member in info.members.iter_mut().filter(|m| m.internal_address == self.server) {
            member.advertised_address.clone_from(&self.advertised);
        }
        let request = GossipRequest {
            server: self.server.clone(),
            info,
        };

        let mut answered = 0;
        for peer in &self.peers {
            if self.push_to(peer, &request).await {
                answered += 1;
            }
        }

        metrics::histogram!(GOSSIP_ROUND_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(answered, peers = self.peers.len(), "gossip round complete");
        answered
    }

    async fn push_to(&self, peer: &str, request: &GossipRequest) -> bool {
        let call = match PeerRequest::update(peer, request) {
            Ok(call) => call,
            Err(error) => {
                warn!(peer, %error, "cannot build gossip request");
                return false;
            }
        };
        let view = match self.client.clone().oneshot(call).await {
            Ok(view) => view,
            Err(error) => {
                warn!(peer, %error, "gossip push failed");
                return false;
            }
        };
        let info: ClusterInfo = match serde_json::from_value(view) {
            Ok(info) => info,
            Err(error) => {
                warn!(peer, %error, "peer answered with an unreadable view");
                return false;
            }
        };

        let learned = GossipRequest {
            server: peer.to_string(),
            info,
        };
        let grant = Authorized::system(Operation::new(node::GOSSIP_UPDATE));
        if let Err(error) = self
            .bridge
            .publish(grant, Command::Gossip(GossipCommand::Update(learned)))
            .await
        {
            warn!(peer, %error, "cannot publish learned gossip");
            return false;
        }
        true
    }
}

#[async_trait]
impl<S: StreamId> BackgroundRunnable for GossipRound<S> {
    type Task = GossipTask;

    async fn run(&mut self, task: GossipTask) {
        match task {
            GossipTask::PushNow => {
                self.push_all().await;
            }
        }
    }

    async fn on_tick(&mut self) {
        self.push_all().await;
    }
}

/// Managed service running [`GossipRound`] on a [`BackgroundWorker`].
pub struct GossipSeedDiscovery<S: StreamId> {
    round: GossipRound<S>,
    worker: tokio::sync::Mutex<Option<BackgroundWorker<GossipRound<S>>>>,
}

impl<S: StreamId> GossipSeedDiscovery<S> {
    /// `None` unless the topology has an internal address and peers.
    #[must_use]
    pub fn from_topology(
        topology: &ClusterConfig,
        advertised: String,
        bridge: Arc<DispatchBridge<S>>,
        client: RetryingPeerClient,
    ) -> Option<Self> {
        if !topology.gossip_enabled() {
            return None;
        }
        let server = topology.internal_address.clone()?;
        let peers = topology.peers().into_iter().map(str::to_string).collect();
        Some(Self {
            round: GossipRound::new(bridge, client, server, advertised, peers),
            worker: tokio::sync::Mutex::new(None),
        })
    }

    /// Ask the running worker for an immediate round.
    ///
    /// # Errors
    ///
    /// Returns an error if the service has not been started.
    pub async fn trigger(&self) -> anyhow::Result<()> {
        match self.worker.lock().await.as_ref() {
            Some(worker) => worker.submit(GossipTask::PushNow).await,
            None => anyhow::bail!("{NAME} is not running"),
        }
    }
}

#[async_trait]
impl<S: StreamId> ManagedService for GossipSeedDiscovery<S> {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        let interval = ctx.config.cluster.gossip_interval;
        let mut worker = self.worker.lock().await;
        if worker.is_none() {
            info!(peers = ?self.round.peers, interval_ms = interval.as_millis(), "starting seed gossip");
            *worker = Some(BackgroundWorker::start(self.round.clone(), interval));
        }
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        if let Some(mut worker) = self.worker.lock().await.take() {
            worker.stop().await;
        }
        Ok(())
    }
}
