//! Histogram bucket classification.
//!
//! A metric's boundaries depend only on its name and unit and are chosen once,
//! when the metric is registered with the catalog.

/// Unit a metric is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricUnit {
    Seconds,
    Bytes,
    Count,
}

impl MetricUnit {
    #[must_use]
    pub fn as_metrics_unit(self) -> metrics::Unit {
        match self {
            Self::Seconds => metrics::Unit::Seconds,
            Self::Bytes => metrics::Unit::Bytes,
            Self::Count => metrics::Unit::Count,
        }
    }
}

/// Millisecond-to-second boundaries for request latencies.
pub const LATENCY_BUCKETS: [f64; 8] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

/// Microsecond-to-second boundaries for every other duration.
pub const SECONDS_BUCKETS: [f64; 8] = [0.000_001, 0.000_01, 0.000_1, 0.001, 0.01, 0.1, 1.0, 10.0];

const LATENCY_SUFFIX: &str = "-latency";
const SECONDS_SUFFIX: &str = "-seconds";

/// Bucket boundaries for a metric, or `None` to keep the exporter default.
#[must_use]
pub fn classify(name: &str, unit: MetricUnit) -> Option<&'static [f64]> {
    if unit != MetricUnit::Seconds {
        return None;
    }
    let stem = name.strip_suffix(SECONDS_SUFFIX).unwrap_or(name);
    if stem.ends_with(LATENCY_SUFFIX) {
        Some(&LATENCY_BUCKETS)
    } else {
        Some(&SECONDS_BUCKETS)
    }
}
