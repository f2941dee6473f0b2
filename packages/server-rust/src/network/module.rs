//! Listener lifecycle with deferred startup.
//!
//! `new()` takes the fully composed router, `start()` binds the public TCP
//! listener and the optional local Unix socket, and `serve()` accepts
//! connections on both until shutdown is signalled.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{Extension, Router};
use streamgate_core::TransportChannel;
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::sync::watch;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::readiness::ReadinessController;

/// Addresses actually bound by [`NetworkModule::start`].
#[derive(Debug, Clone)]
pub struct BoundAddresses {
    pub public: SocketAddr,
    pub local: Option<PathBuf>,
}

/// Owns the listeners and serves the composed router on them.
///
/// Requests accepted on the TCP listener carry `TransportChannel::Public`;
/// requests accepted on the Unix socket carry `TransportChannel::Local`.
pub struct NetworkModule {
    config: NetworkConfig,
    router: Router,
    readiness: Arc<ReadinessController>,
    public: Option<TcpListener>,
    #[cfg(unix)]
    local: Option<UnixListener>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig, router: Router, readiness: Arc<ReadinessController>) -> Self {
        Self {
            config,
            router,
            readiness,
            public: None,
            #[cfg(unix)]
            local: None,
        }
    }

    /// The router as served on the given channel.
    #[must_use]
    pub fn router_for(&self, channel: TransportChannel) -> Router {
        self.router.clone().layer(Extension(channel))
    }

    /// Binds the configured listeners.
    ///
    /// # Errors
    ///
    /// Returns an error if an address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<BoundAddresses> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let public = listener.local_addr()?;
        info!(%public, "public listener bound");
        self.public = Some(listener);

        let local = match self.config.local_socket.clone() {
            Some(path) => {
                self.bind_local(&path)?;
                Some(path)
            }
            None => None,
        };

        Ok(BoundAddresses { public, local })
    }

    #[cfg(unix)]
    fn bind_local(&mut self, path: &Path) -> anyhow::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => warn!(path = %path.display(), "removed stale local socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.local = Some(UnixListener::bind(path)?);
        info!(path = %path.display(), "local listener bound");
        Ok(())
    }

    #[cfg(not(unix))]
    fn bind_local(&mut self, path: &Path) -> anyhow::Result<()> {
        anyhow::bail!(
            "local socket {} requested but Unix sockets are unavailable on this platform",
            path.display()
        )
    }

    /// Serves until `shutdown` completes, then waits for in-flight
    /// dispatches to drain.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or a listener fails.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let public_router = self.router_for(TransportChannel::Public);
        #[cfg(unix)]
        let local_router = self.router_for(TransportChannel::Local);

        let listener = self
            .public
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;

        let readiness = Arc::clone(&self.readiness);
        tokio::spawn(async move {
            shutdown.await;
            info!("shutdown requested, closing listeners");
            readiness.trigger_shutdown();
        });

        #[cfg(unix)]
        let local_task = self.local.map(|uds| {
            let stopped = stopped(self.readiness.shutdown_receiver());
            tokio::spawn(async move {
                info!("serving local channel");
                axum::serve(uds, local_router)
                    .with_graceful_shutdown(stopped)
                    .await
            })
        });

        let stopped_public = stopped(self.readiness.shutdown_receiver());
        if let Some(ref tls) = self.config.tls {
            serve_tls(listener, public_router, tls, stopped_public).await?;
        } else {
            info!("serving plain HTTP");
            axum::serve(listener, public_router)
                .with_graceful_shutdown(stopped_public)
                .await?;
        }

        #[cfg(unix)]
        {
            if let Some(task) = local_task {
                task.await??;
            }
        }

        drain(&self.readiness, &self.config).await;
        Ok(())
    }
}

/// Completes once the readiness controller signals shutdown.
fn stopped(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// Serves TLS using `axum-server` with rustls on the pre-bound listener.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    stopped: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS certificates: {e}"))?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        stopped.await;
        shutdown_handle.graceful_shutdown(None);
    });

    info!(%addr, "serving TLS");

    axum_server::from_tcp_rustls(std_listener, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

async fn drain(readiness: &ReadinessController, config: &NetworkConfig) {
    let remaining = readiness.in_flight_count();
    if remaining > 0 {
        info!(remaining, "waiting for in-flight dispatches");
    }
    if readiness.wait_for_drain(config.drain_timeout).await {
        info!("all dispatches drained");
    } else {
        warn!("drain timeout expired with dispatches still in flight");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::routing::get;

    use super::*;

    fn test_config() -> NetworkConfig {
        NetworkConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..NetworkConfig::default()
        }
    }

    fn channel_echo() -> Router {
        Router::new().route(
            "/channel",
            get(|Extension(channel): Extension<TransportChannel>| async move {
                format!("{channel:?}")
            }),
        )
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = NetworkModule::new(test_config(), channel_echo(), Arc::default());
        let bound = module.start().await.unwrap();
        assert!(bound.public.port() > 0);
        assert!(bound.local.is_none());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let module = NetworkModule::new(test_config(), channel_echo(), Arc::default());
        let err = module.serve(std::future::ready(())).await.unwrap_err();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn public_requests_are_tagged_public() {
        let mut module = NetworkModule::new(test_config(), channel_echo(), Arc::default());
        let bound = module.start().await.unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async move {
            let _ = rx.await;
        }));

        let body = reqwest::get(format!("http://{}/channel", bound.public))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "Public");

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn start_binds_local_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.sock");
        let config = NetworkConfig {
            local_socket: Some(path.clone()),
            ..test_config()
        };

        let mut module = NetworkModule::new(config, channel_echo(), Arc::default());
        let bound = module.start().await.unwrap();
        assert_eq!(bound.local, Some(path.clone()));
        assert!(path.exists());
    }
}
