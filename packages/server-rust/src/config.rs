//! Node configuration: command-line and environment options, validated into
//! typed per-module configs.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::cluster::ClusterConfig;
use crate::dispatch::DispatchConfig;
use crate::network::{NetworkConfig, TlsConfig};
use crate::rpc::RpcConfig;
use crate::security::{AuthenticationKind, AuthorizationKind, SecurityConfig};
use crate::telemetry::{LogFormat, TelemetryConfig};

/// Everything a node needs to start.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub security: SecurityConfig,
    pub dispatch: DispatchConfig,
    pub rpc: RpcConfig,
    pub cluster: ClusterConfig,
    pub telemetry: TelemetryConfig,
    /// Install the Prometheus recorder as the process-wide recorder.
    pub install_metrics: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            security: SecurityConfig::default(),
            dispatch: DispatchConfig::default(),
            rpc: RpcConfig::default(),
            cluster: ClusterConfig::default(),
            telemetry: TelemetryConfig::default(),
            install_metrics: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("--tls-cert and --tls-key must be given together")]
    IncompleteTls,
    #[error("jwt authentication requires --jwt-secret")]
    MissingJwtSecret,
    #[error("gossip seeds require --internal-address")]
    MissingInternalAddress,
    #[error("gossip seeds under internal authentication require --node-password")]
    MissingNodePassword,
    #[error("--request-timeout-ms ({request_ms}) must exceed the {name} ({dispatch_ms})")]
    RequestTimeoutTooShort {
        name: &'static str,
        request_ms: u64,
        dispatch_ms: u64,
    },
    #[error("'{0}' is not a host:port address")]
    InvalidAddress(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone, Parser)]
#[command(name = "streamgate", about = "Streamgate node", version)]
pub struct NodeOptions {
    /// Bind address of the public listener.
    #[arg(long, env = "STREAMGATE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "STREAMGATE_PORT", default_value_t = 2113)]
    pub port: u16,

    /// Unix socket for the trusted local channel.
    #[arg(long, env = "STREAMGATE_LOCAL_SOCKET")]
    pub local_socket: Option<PathBuf>,

    #[arg(long, env = "STREAMGATE_TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    #[arg(long, env = "STREAMGATE_TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    #[arg(long, env = "STREAMGATE_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "STREAMGATE_REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    pub request_timeout_ms: u64,

    /// How long shutdown waits for in-flight dispatches.
    #[arg(long, env = "STREAMGATE_DRAIN_TIMEOUT_MS", default_value_t = 10_000)]
    pub drain_timeout_ms: u64,

    /// Reply timeout for reads and administrative commands.
    #[arg(long, env = "STREAMGATE_READ_TIMEOUT_MS", default_value_t = 10_000)]
    pub read_timeout_ms: u64,

    /// Reply timeout for appends and deletes.
    #[arg(long, env = "STREAMGATE_WRITE_TIMEOUT_MS", default_value_t = 2_000)]
    pub write_timeout_ms: u64,

    #[arg(long, env = "STREAMGATE_MAX_CONCURRENT_DISPATCHES", default_value_t = 5_000)]
    pub max_concurrent_dispatches: u32,

    #[arg(long, env = "STREAMGATE_MAX_APPEND_SIZE", default_value_t = 1024 * 1024)]
    pub max_append_size: usize,

    #[arg(long, env = "STREAMGATE_MAX_RECEIVE_MESSAGE_SIZE", default_value_t = 4 * 1024 * 1024)]
    pub max_receive_message_size: usize,

    #[arg(long, env = "STREAMGATE_AUTHENTICATION", value_enum, default_value_t = AuthenticationKind::Internal)]
    pub authentication: AuthenticationKind,

    #[arg(long, env = "STREAMGATE_AUTHORIZATION", value_enum, default_value_t = AuthorizationKind::Policy)]
    pub authorization: AuthorizationKind,

    /// Admit requests without credentials as the anonymous principal.
    #[arg(long, env = "STREAMGATE_ALLOW_ANONYMOUS")]
    pub allow_anonymous: bool,

    #[arg(long, env = "STREAMGATE_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    #[arg(long, env = "STREAMGATE_ADMIN_PASSWORD", default_value = "changeit", hide_env_values = true)]
    pub admin_password: String,

    #[arg(long, env = "STREAMGATE_OPS_PASSWORD", default_value = "changeit", hide_env_values = true)]
    pub ops_password: String,

    /// Password of the `$node` account used for peer gossip.
    #[arg(long, env = "STREAMGATE_NODE_PASSWORD", hide_env_values = true)]
    pub node_password: Option<String>,

    /// `host:port` peers use to reach this node.
    #[arg(long, env = "STREAMGATE_INTERNAL_ADDRESS")]
    pub internal_address: Option<String>,

    #[arg(long, env = "STREAMGATE_GOSSIP_SEEDS", value_delimiter = ',')]
    pub gossip_seeds: Vec<String>,

    #[arg(long, env = "STREAMGATE_ADVERTISED_HOST")]
    pub advertised_host: Option<String>,

    #[arg(long, env = "STREAMGATE_ADVERTISED_HTTP_PORT")]
    pub advertised_http_port: Option<u16>,

    #[arg(long, env = "STREAMGATE_GOSSIP_INTERVAL_MS", default_value_t = 2_000)]
    pub gossip_interval_ms: u64,

    #[arg(long, env = "STREAMGATE_PEER_TIMEOUT_MS", default_value_t = 2_500)]
    pub peer_timeout_ms: u64,

    /// Re-attempts of a peer call after a transient failure.
    #[arg(long, env = "STREAMGATE_PEER_RETRIES", default_value_t = 3)]
    pub peer_retries: u32,

    #[arg(long, env = "STREAMGATE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[arg(long, env = "STREAMGATE_LOG", default_value = "info")]
    pub log_filter: String,

    /// Do not install the Prometheus recorder; `/metrics` answers 503.
    #[arg(long, env = "STREAMGATE_NO_METRICS")]
    pub no_metrics: bool,
}

fn millis(name: &'static str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero(name));
    }
    Ok(Duration::from_millis(value))
}

fn check_address(address: &str) -> Result<(), ConfigError> {
    let valid = address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidAddress(address.to_string()))
    }
}

impl NodeOptions {
    /// Validate into a [`NodeConfig`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for contradictory or out-of-range options.
    pub fn into_config(self) -> Result<NodeConfig, ConfigError> {
        let tls = match (self.tls_cert, self.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig { cert_path, key_path }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTls),
        };
        if self.authentication == AuthenticationKind::Jwt && self.jwt_secret.is_none() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if self.max_concurrent_dispatches == 0 {
            return Err(ConfigError::Zero("max-concurrent-dispatches"));
        }
        if self.max_append_size == 0 {
            return Err(ConfigError::Zero("max-append-size"));
        }
        if self.max_receive_message_size == 0 {
            return Err(ConfigError::Zero("max-receive-message-size"));
        }

        let gossip_seeds: Vec<String> = self
            .gossip_seeds
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for seed in &gossip_seeds {
            check_address(seed)?;
        }
        if let Some(address) = &self.internal_address {
            check_address(address)?;
        } else if !gossip_seeds.is_empty() {
            return Err(ConfigError::MissingInternalAddress);
        }
        // Peers authenticate seed pushes as the node account.
        let has_peers = gossip_seeds
            .iter()
            .any(|seed| Some(seed) != self.internal_address.as_ref());
        if has_peers && self.authentication == AuthenticationKind::Internal && self.node_password.is_none() {
            return Err(ConfigError::MissingNodePassword);
        }
        // The outer request timeout answers 408; it must not preempt the
        // dispatch timeout's 503.
        for (name, dispatch_ms) in [
            ("read-timeout-ms", self.read_timeout_ms),
            ("write-timeout-ms", self.write_timeout_ms),
        ] {
            if self.request_timeout_ms <= dispatch_ms {
                return Err(ConfigError::RequestTimeoutTooShort {
                    name,
                    request_ms: self.request_timeout_ms,
                    dispatch_ms,
                });
            }
        }

        Ok(NodeConfig {
            network: NetworkConfig {
                host: self.host,
                port: self.port,
                local_socket: self.local_socket,
                tls,
                cors_origins: self.cors_origins,
                request_timeout: millis("request-timeout-ms", self.request_timeout_ms)?,
                drain_timeout: Duration::from_millis(self.drain_timeout_ms),
            },
            security: SecurityConfig {
                authentication: self.authentication,
                authorization: self.authorization,
                allow_anonymous: self.allow_anonymous,
                jwt_secret: self.jwt_secret,
                default_admin_password: self.admin_password,
                default_ops_password: self.ops_password,
                node_password: self.node_password,
                ..SecurityConfig::default()
            },
            dispatch: DispatchConfig {
                max_concurrent_dispatches: self.max_concurrent_dispatches,
                default_timeout: millis("read-timeout-ms", self.read_timeout_ms)?,
                write_timeout: millis("write-timeout-ms", self.write_timeout_ms)?,
            },
            rpc: RpcConfig {
                max_receive_message_size: self.max_receive_message_size,
                max_append_size: self.max_append_size,
            },
            cluster: ClusterConfig {
                internal_address: self.internal_address,
                advertised_host: self.advertised_host,
                advertised_http_port: self.advertised_http_port,
                gossip_seeds,
                gossip_interval: millis("gossip-interval-ms", self.gossip_interval_ms)?,
                peer_timeout: millis("peer-timeout-ms", self.peer_timeout_ms)?,
                peer_retries: self.peer_retries,
                ..ClusterConfig::default()
            },
            telemetry: TelemetryConfig {
                format: self.log_format,
                filter: self.log_filter,
            },
            install_metrics: !self.no_metrics,
        })
    }
}
