//! Innermost dispatch service: publishes onto the internal bus and awaits
//! the correlated reply.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use streamgate_core::{CoreReply, StreamId};
use tokio::sync::oneshot;
use tower::Service;
use uuid::Uuid;

use super::request::{Dispatch, DispatchError, DispatchMode};
use crate::traits::MessageBus;

// ---------------------------------------------------------------------------
// ReplyEnvelope
// ---------------------------------------------------------------------------

/// Single-use reply channel handed to the core with a message.
///
/// If the waiting caller already gave up (timeout or cancellation) the reply
/// is discarded.
#[derive(Debug)]
pub struct ReplyEnvelope {
    correlation_id: Uuid,
    tx: oneshot::Sender<CoreReply>,
}

impl ReplyEnvelope {
    /// Create an envelope and the receiver the caller awaits.
    #[must_use]
    pub fn channel(correlation_id: Uuid) -> (Self, oneshot::Receiver<CoreReply>) {
        let (tx, rx) = oneshot::channel();
        (Self { correlation_id, tx }, rx)
    }

    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Deliver the reply. Returns `false` if nobody is waiting any more.
    pub fn reply(self, reply: CoreReply) -> bool {
        let delivered = self.tx.send(reply).is_ok();
        if !delivered {
            tracing::debug!(
                correlation_id = %self.correlation_id,
                "discarding reply, caller no longer waiting"
            );
        }
        delivered
    }
}

// ---------------------------------------------------------------------------
// BusService
// ---------------------------------------------------------------------------

/// Tower service that hands each [`Dispatch`] to the [`MessageBus`].
pub struct BusService<S: StreamId> {
    bus: Arc<dyn MessageBus<S>>,
}

impl<S: StreamId> BusService<S> {
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus<S>>) -> Self {
        Self { bus }
    }
}

impl<S: StreamId> Clone for BusService<S> {
    fn clone(&self) -> Self {
        Self {
            bus: Arc::clone(&self.bus),
        }
    }
}

impl<S: StreamId> Service<Dispatch<S>> for BusService<S> {
    type Response = CoreReply;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<CoreReply, DispatchError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dispatch: Dispatch<S>) -> Self::Future {
        let correlation_id = dispatch.correlation_id();
        match dispatch.mode {
            DispatchMode::FireAndForget => {
                let published = self.bus.publish(dispatch.message, None);
                Box::pin(async move {
                    published?;
                    Ok(CoreReply::empty())
                })
            }
            DispatchMode::AwaitReply => {
                let (envelope, rx) = ReplyEnvelope::channel(correlation_id);
                let published = self.bus.publish(dispatch.message, Some(envelope));
                Box::pin(async move {
                    published?;
                    rx.await
                        .map_err(|_| DispatchError::ReplyDropped { correlation_id })
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
