//! Tower middleware wrapped around the bus service.
//!
//! - [`load_shed`]: semaphore-based concurrency limiting
//! - [`timeout`]: per-dispatch reply timeout
//! - [`metrics`]: latency histogram and tracing span per dispatch

pub mod load_shed;
pub mod metrics;
pub mod timeout;

pub use load_shed::LoadShedLayer;
pub use metrics::MetricsLayer;
pub use timeout::TimeoutLayer;
