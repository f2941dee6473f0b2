//! Pipeline composition: wraps the bus service with the dispatch middleware.

use streamgate_core::{CoreReply, StreamId};
use tower::util::BoxCloneSyncService;
use tower::ServiceBuilder;

use super::bus::BusService;
use super::middleware::{LoadShedLayer, MetricsLayer, TimeoutLayer};
use super::request::{Dispatch, DispatchConfig, DispatchError};

/// Type-erased dispatch pipeline, cheap to clone per request.
pub type DispatchPipeline<S> = BoxCloneSyncService<Dispatch<S>, CoreReply, DispatchError>;

/// Build the dispatch pipeline around a `BusService`.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- time every dispatch, including sheds and timeouts
/// 2. `LoadShedLayer` -- reject when overloaded before publishing anything
/// 3. `TimeoutLayer` -- bound the wait for the correlated reply
#[must_use]
pub fn build_dispatch_pipeline<S: StreamId>(
    bus: BusService<S>,
    config: &DispatchConfig,
) -> DispatchPipeline<S> {
    let stack = ServiceBuilder::new()
        .layer(MetricsLayer)
        .layer(LoadShedLayer::new(config.max_concurrent_dispatches))
        .layer(TimeoutLayer)
        .service(bus);
    BoxCloneSyncService::new(stack)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
