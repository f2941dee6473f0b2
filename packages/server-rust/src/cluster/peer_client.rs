//! Outbound calls to peers' `gossip` RPC service.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::Value;
use streamgate_core::messages::GossipRequest;
use tower::retry::Retry;
use tower::{Layer, Service};

use crate::observability::retry::{retry_layer, Transient, TransientRetryPolicy};
use crate::rpc::services::gossip;
use crate::security::NODE_ACCOUNT;

/// One call to a peer's gossip service.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRequest {
    /// `host:port` of the peer's internal endpoint.
    pub peer: String,
    pub method: &'static str,
    pub body: Value,
}

impl PeerRequest {
    /// Push this node's view to `peer`.
    ///
    /// # Errors
    ///
    /// Returns `PeerError::Encode` if the request cannot be serialized.
    pub fn update(peer: impl Into<String>, request: &GossipRequest) -> Result<Self, PeerError> {
        Ok(Self {
            peer: peer.into(),
            method: "Update",
            body: serde_json::to_value(request).map_err(|e| PeerError::Encode(e.to_string()))?,
        })
    }

    #[must_use]
    pub fn read(peer: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            method: "Read",
            body: Value::Object(serde_json::Map::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    #[error("cannot connect: {0}")]
    Connect(String),
    #[error("peer call timed out")]
    Timeout,
    #[error("peer answered {0}")]
    Status(u16),
    #[error("cannot encode request: {0}")]
    Encode(String),
    #[error("cannot decode response: {0}")]
    Decode(String),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for PeerError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect(error.to_string())
        } else if let Some(status) = error.status() {
            Self::Status(status.as_u16())
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Other(error.to_string())
        }
    }
}

impl Transient for PeerError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout | Self::Status(502..=504))
    }
}

/// `tower::Service` over `reqwest`, authenticating as the node account.
#[derive(Debug, Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    node_password: Option<String>,
    timeout: Duration,
    scheme: &'static str,
}

/// A [`PeerClient`] that re-attempts transient failures.
pub type RetryingPeerClient = Retry<TransientRetryPolicy, PeerClient>;

impl PeerClient {
    #[must_use]
    pub fn new(timeout: Duration, node_password: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            node_password,
            timeout,
            scheme: "http",
        }
    }

    /// Talk HTTPS to peers. Peers share this node's listener config, so a node
    /// serving TLS reaches its seeds over TLS too.
    #[must_use]
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.scheme = if tls { "https" } else { "http" };
        self
    }

    fn url(&self, request: &PeerRequest) -> String {
        format!("{}://{}/rpc/{}/{}", self.scheme, request.peer, gossip::NAME, request.method)
    }

    #[must_use]
    pub fn with_retry(self, max_retries: u32, base_backoff: Duration) -> RetryingPeerClient {
        retry_layer(max_retries, base_backoff).layer(self)
    }
}

impl Service<PeerRequest> for PeerClient {
    type Response = Value;
    type Error = PeerError;
    type Future = Pin<Box<dyn Future<Output = Result<Value, PeerError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: PeerRequest) -> Self::Future {
        let mut builder = self
            .http
            .post(self.url(&request))
            .timeout(self.timeout)
            .json(&request.body);
        if let Some(password) = &self.node_password {
            builder = builder.basic_auth(NODE_ACCOUNT, Some(password));
        }

        Box::pin(async move {
            let response = builder.send().await?;
            let status = response.status();
            if !status.is_success() {
                tracing::debug!(peer = %request.peer, method = request.method, %status, "peer call rejected");
                return Err(PeerError::Status(status.as_u16()));
            }
            Ok(response.json::<Value>().await?)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;

    /// Serves `/rpc/gossip/Read`, answering `status` for the first `failures` calls.
    async fn peer(failures: u32, status: StatusCode) -> (String, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/rpc/gossip/Read",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < failures {
                        status.into_response()
                    } else {
                        Json(json!({"members": []})).into_response()
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (addr.to_string(), hits)
    }

    #[test]
    fn only_connectivity_failures_are_transient() {
        assert!(PeerError::Connect("refused".into()).is_transient());
        assert!(PeerError::Timeout.is_transient());
        assert!(PeerError::Status(503).is_transient());
        assert!(!PeerError::Status(403).is_transient());
        assert!(!PeerError::Status(500).is_transient());
        assert!(!PeerError::Decode("eof".into()).is_transient());
    }

    #[test]
    fn requests_target_the_gossip_service() {
        let client = PeerClient::new(Duration::from_secs(1), None);
        assert_eq!(
            client.url(&PeerRequest::read("10.0.0.2:1112")),
            "http://10.0.0.2:1112/rpc/gossip/Read"
        );
    }

    #[test]
    fn tls_nodes_call_peers_over_https() {
        let client = PeerClient::new(Duration::from_secs(1), None).with_tls(true);
        assert_eq!(
            client.url(&PeerRequest::read("10.0.0.2:1112")),
            "https://10.0.0.2:1112/rpc/gossip/Read"
        );
    }

    #[tokio::test]
    async fn unavailable_peer_is_retried() {
        let (addr, hits) = peer(1, StatusCode::SERVICE_UNAVAILABLE).await;
        let client = PeerClient::new(Duration::from_secs(2), None).with_retry(2, Duration::from_millis(1));

        let view = client.oneshot(PeerRequest::read(addr)).await.unwrap();
        assert_eq!(view, json!({"members": []}));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let (addr, hits) = peer(1, StatusCode::FORBIDDEN).await;
        let client = PeerClient::new(Duration::from_secs(2), None).with_retry(2, Duration::from_millis(1));

        let error = client.oneshot(PeerRequest::read(addr)).await.unwrap_err();
        assert_eq!(error, PeerError::Status(403));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
