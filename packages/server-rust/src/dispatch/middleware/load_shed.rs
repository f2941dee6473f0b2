//! Load shedding for dispatches.
//!
//! When `max_concurrent_dispatches` are already in flight, new dispatches are
//! rejected with `DispatchError::Overloaded` instead of queueing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use streamgate_core::{CoreReply, StreamId};
use tokio::sync::Semaphore;
use tower::{Layer, Service};

use crate::dispatch::request::{Dispatch, DispatchError};

// ---------------------------------------------------------------------------
// LoadShedLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadShedLayer {
    semaphore: Arc<Semaphore>,
}

impl LoadShedLayer {
    #[must_use]
    pub fn new(max_concurrent: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent as usize)),
        }
    }
}

impl<S> Layer<S> for LoadShedLayer {
    type Service = LoadShedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadShedService {
            inner,
            semaphore: Arc::clone(&self.semaphore),
        }
    }
}

// ---------------------------------------------------------------------------
// LoadShedService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadShedService<S> {
    inner: S,
    semaphore: Arc<Semaphore>,
}

impl<S, Id> Service<Dispatch<Id>> for LoadShedService<S>
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
        let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
            tracing::warn!(command = dispatch.command_name(), "shedding dispatch");
            return Box::pin(async { Err(DispatchError::Overloaded) });
        };

        let fut = self.inner.call(dispatch);
        Box::pin(async move {
            let result = fut.await;
            drop(permit);
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
