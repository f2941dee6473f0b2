//! Cluster deployment topology.

use std::time::Duration;

/// How this node presents itself to peers and clients, and which peers it
/// gossips with.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// `host:port` peers use to reach this node's internal endpoint.
    pub internal_address: Option<String>,
    /// Host clients should use when it differs from the bind host.
    pub advertised_host: Option<String>,
    /// HTTP port clients should use when it differs from the bind port.
    pub advertised_http_port: Option<u16>,
    /// `host:port` of every seed peer.
    pub gossip_seeds: Vec<String>,
    pub gossip_interval: Duration,
    /// Per-attempt timeout for a peer call.
    pub peer_timeout: Duration,
    /// Re-attempts after a transient peer failure.
    pub peer_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            internal_address: None,
            advertised_host: None,
            advertised_http_port: None,
            gossip_seeds: Vec::new(),
            gossip_interval: Duration::from_secs(2),
            peer_timeout: Duration::from_millis(2_500),
            peer_retries: 3,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

impl ClusterConfig {
    /// Seed gossip runs only when this node has an internal address and at
    /// least one seed other than itself.
    #[must_use]
    pub fn gossip_enabled(&self) -> bool {
        self.internal_address.is_some() && !self.peers().is_empty()
    }

    /// Seeds excluding this node's own internal address.
    #[must_use]
    pub fn peers(&self) -> Vec<&str> {
        self.gossip_seeds
            .iter()
            .map(String::as_str)
            .filter(|seed| Some(*seed) != self.internal_address.as_deref())
            .collect()
    }

    /// The client-facing `host:port`, falling back to the bind values.
    #[must_use]
    pub fn advertised_address(&self, bind_host: &str, bind_port: u16) -> String {
        let host = self.advertised_host.as_deref().unwrap_or(bind_host);
        let port = self.advertised_http_port.unwrap_or(bind_port);
        format!("{host}:{port}")
    }
}
