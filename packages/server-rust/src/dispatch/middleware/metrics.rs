//! Dispatch instrumentation.
//!
//! Each dispatch runs inside a `dispatch` span and records its latency into
//! the `streamgate-dispatch-latency` histogram, labelled by command and outcome.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use streamgate_core::{CoreReply, StreamId};
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::dispatch::request::{Dispatch, DispatchError};
use crate::observability::catalog::{DISPATCHES_TOTAL, DISPATCH_LATENCY};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Records dispatch duration and outcome in a tracing span and in `metrics`.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

fn outcome(result: &Result<CoreReply, DispatchError>) -> &'static str {
    match result {
        Ok(CoreReply::Success(_)) => "ok",
        Ok(CoreReply::Failure(_)) => "domain-failure",
        Err(DispatchError::Timeout { .. }) => "timeout",
        Err(DispatchError::Overloaded) => "overloaded",
        Err(DispatchError::Bus(_) | DispatchError::ReplyDropped { .. }) => "unavailable",
    }
}

impl<S, Id> Service<Dispatch<Id>> for MetricsService<S>
where
    Id: StreamId,
    S: Service<Dispatch<Id>, Response = CoreReply, Error = DispatchError> + Send,
    S::Future: Send + 'static,
{
    type Response = CoreReply;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<CoreReply, DispatchError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, dispatch: Dispatch<Id>) -> Self::Future {
        let command = dispatch.command_name();
        let correlation_id = dispatch.correlation_id();

        let span = info_span!(
            "dispatch",
            command = command,
            correlation_id = %correlation_id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(dispatch);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();
                let outcome = outcome(&result);

                let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);
                tracing::debug!(command, duration_ms, outcome, "dispatch complete");

                metrics::histogram!(DISPATCH_LATENCY, "command" => command, "outcome" => outcome)
                    .record(elapsed.as_secs_f64());
                metrics::counter!(DISPATCHES_TOTAL, "command" => command, "outcome" => outcome)
                    .increment(1);

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
