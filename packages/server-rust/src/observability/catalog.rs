//! Every metric the node emits, with its unit and bucket boundaries.
//!
//! Names are kebab-case; the Prometheus exporter renders them with
//! underscores.

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

use super::buckets::{classify, MetricUnit};

pub const DISPATCH_LATENCY: &str = "streamgate-dispatch-latency";
pub const DISPATCHES_TOTAL: &str = "streamgate-dispatches-total";
pub const RPC_CALL_SECONDS: &str = "streamgate-rpc-call-seconds";
pub const NODE_READY: &str = "streamgate-node-ready";
pub const PEER_CALL_RETRIES: &str = "streamgate-peer-call-retries";
pub const GOSSIP_ROUND_SECONDS: &str = "streamgate-gossip-round-seconds";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// One registered metric. `buckets` is fixed at registration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    pub name: &'static str,
    pub kind: MetricKind,
    pub unit: MetricUnit,
    pub description: &'static str,
    pub buckets: Option<&'static [f64]>,
}

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("invalid bucket configuration: {0}")]
    Build(#[from] BuildError),
    #[error("a global metrics recorder is already installed")]
    AlreadyInstalled,
}

#[derive(Debug, Clone, Default)]
pub struct MetricCatalog {
    metrics: Vec<MetricSpec>,
}

impl MetricCatalog {
    /// The metrics emitted by the dispatch bridge, the RPC registry,
    /// readiness and the peer client.
    #[must_use]
    pub fn standard() -> Self {
        let mut catalog = Self::default();
        catalog
            .register(
                DISPATCH_LATENCY,
                MetricKind::Histogram,
                MetricUnit::Seconds,
                "Time from publish to reply for internal dispatches",
            )
            .register(
                DISPATCHES_TOTAL,
                MetricKind::Counter,
                MetricUnit::Count,
                "Internal dispatches by command and outcome",
            )
            .register(
                RPC_CALL_SECONDS,
                MetricKind::Histogram,
                MetricUnit::Seconds,
                "Structured RPC call duration by service, method and status",
            )
            .register(
                NODE_READY,
                MetricKind::Gauge,
                MetricUnit::Count,
                "1 while the node accepts traffic",
            )
            .register(
                PEER_CALL_RETRIES,
                MetricKind::Counter,
                MetricUnit::Count,
                "Outbound peer calls re-attempted after a transient failure",
            )
            .register(
                GOSSIP_ROUND_SECONDS,
                MetricKind::Histogram,
                MetricUnit::Seconds,
                "Duration of one gossip push to all seeds",
            );
        catalog
    }

    /// Register a metric, classifying its buckets. Re-registering a name
    /// replaces the earlier entry.
    pub fn register(
        &mut self,
        name: &'static str,
        kind: MetricKind,
        unit: MetricUnit,
        description: &'static str,
    ) -> &mut Self {
        let buckets = match kind {
            MetricKind::Histogram => classify(name, unit),
            MetricKind::Counter | MetricKind::Gauge => None,
        };
        let spec = MetricSpec {
            name,
            kind,
            unit,
            description,
            buckets,
        };
        match self.metrics.iter_mut().find(|m| m.name == name) {
            Some(existing) => *existing = spec,
            None => self.metrics.push(spec),
        }
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetricSpec> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricSpec> {
        self.metrics.iter()
    }

    /// A Prometheus builder with per-metric histogram buckets applied.
    ///
    /// # Errors
    ///
    /// Returns `BuildError` if a bucket set is empty.
    pub fn builder(&self) -> Result<PrometheusBuilder, BuildError> {
        let mut builder = PrometheusBuilder::new();
        for spec in &self.metrics {
            if let Some(buckets) = spec.buckets {
                builder = builder.set_buckets_for_metric(Matcher::Full(spec.name.to_string()), buckets)?;
            }
        }
        Ok(builder)
    }

    /// Publish descriptions and units to the current recorder.
    pub fn describe(&self) {
        for spec in &self.metrics {
            let unit = spec.unit.as_metrics_unit();
            match spec.kind {
                MetricKind::Counter => metrics::describe_counter!(spec.name, unit, spec.description),
                MetricKind::Gauge => metrics::describe_gauge!(spec.name, unit, spec.description),
                MetricKind::Histogram => {
                    metrics::describe_histogram!(spec.name, unit, spec.description);
                }
            }
        }
    }

    /// Install the catalog's recorder as the process-wide recorder.
    ///
    /// # Errors
    ///
    /// Returns `InstallError` if the buckets are invalid or a recorder is
    /// already installed.
    pub fn install(&self) -> Result<PrometheusHandle, InstallError> {
        let recorder = self.builder()?.build_recorder();
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder).map_err(|_| InstallError::AlreadyInstalled)?;
        self.describe();
        tracing::info!(metrics = self.metrics.len(), "prometheus recorder installed");
        Ok(handle)
    }
}
