//! Reply timeout for dispatches.
//!
//! A dispatch whose reply does not arrive within `Dispatch::timeout` fails with
//! `DispatchError::Timeout`. Dropping the inner future drops the reply
//! receiver, so a late reply from the core is discarded.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use streamgate_core::{CoreReply, StreamId};
use tower::{Layer, Service};

use crate::dispatch::request::{Dispatch, DispatchError};

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer enforcing the per-dispatch reply timeout.
#[derive(Debug, Clone)]
pub struct TimeoutLayer;

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService { inner }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
}

impl<S, Id> Service<Dispatch<Id>> for TimeoutService<S>
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
        let duration = dispatch.timeout;
        let fut = self.inner.call(dispatch);
        Box::pin(async move {
            match tokio::time::timeout(duration, fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(DispatchError::Timeout {
                    timeout_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                }),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tower::ServiceExt;

    use super::*;
    use crate::test_support::{shutdown_dispatch, DelayedService};

    #[tokio::test]
    async fn completes_within_timeout() {
        let svc = TimeoutLayer.layer(DelayedService::new(10));
        let reply = svc
            .oneshot(shutdown_dispatch(Duration::from_millis(1000)))
            .await
            .unwrap();
        assert!(reply.is_success());
    }

    #[tokio::test]
    async fn exceeds_timeout_returns_error() {
        let svc = TimeoutLayer.layer(DelayedService::new(200));
        let err = svc
            .oneshot(shutdown_dispatch(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::Timeout { timeout_ms: 50 });
    }
}
