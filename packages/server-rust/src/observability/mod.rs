//! Metric registration, histogram bucket classification and the retry
//! interceptor for outbound calls.

pub mod buckets;
pub mod catalog;
pub mod retry;

pub use buckets::{classify, MetricUnit, LATENCY_BUCKETS, SECONDS_BUCKETS};
pub use catalog::{InstallError, MetricCatalog, MetricKind, MetricSpec};
pub use retry::{retry_layer, Transient, TransientRetryPolicy};
