use streamgate_core::{InternalMessage, LifecycleEvent, StreamId};
use tokio::sync::broadcast;

use crate::dispatch::ReplyEnvelope;

/// Errors returned by the internal message bus when it refuses a publication.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("internal bus is closed")]
    Closed,
    #[error("internal bus queue is full")]
    Full,
}

/// Publish side of the internal asynchronous message bus.
///
/// The storage/consensus core owns ordering and serialization of messages;
/// the dispatch layer only publishes. When `reply_to` is `Some`, the core
/// answers through the envelope exactly once (or drops it).
pub trait MessageBus<S: StreamId>: Send + Sync + 'static {
    /// Publish one message, optionally with an envelope for the correlated reply.
    ///
    /// # Errors
    ///
    /// Returns `BusError` if the bus cannot accept the message.
    fn publish(
        &self,
        message: InternalMessage<S>,
        reply_to: Option<ReplyEnvelope>,
    ) -> Result<(), BusError>;

    /// Subscribe to the core's lifecycle events (system ready, shutting down).
    fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent>;
}

/// Read-only snapshot view of committed data.
pub trait ReadIndex<S: StreamId>: Send + Sync + 'static {
    /// Last committed event number of the stream, or `None` if it does not exist.
    fn last_event_number(&self, stream: &S) -> Option<u64>;
}
