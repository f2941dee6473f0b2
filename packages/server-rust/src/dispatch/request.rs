//! The unit of work flowing through the dispatch pipeline.

use std::time::Duration;

use streamgate_core::{InternalMessage, StreamId};
use uuid::Uuid;

use crate::traits::BusError;

/// Whether the caller waits for the correlated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Publish with a reply envelope and await the single reply.
    AwaitReply,
    /// Publish without an envelope; success means "accepted by the bus".
    FireAndForget,
}

/// One internal message on its way to the bus.
#[derive(Debug, Clone)]
pub struct Dispatch<S: StreamId> {
    pub message: InternalMessage<S>,
    pub mode: DispatchMode,
    /// How long the caller waits for the reply before giving up.
    pub timeout: Duration,
}

impl<S: StreamId> Dispatch<S> {
    #[must_use]
    pub fn new(message: InternalMessage<S>, mode: DispatchMode, timeout: Duration) -> Self {
        Self {
            message,
            mode,
            timeout,
        }
    }

    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        self.message.correlation_id
    }

    #[must_use]
    pub fn command_name(&self) -> &'static str {
        self.message.command.name()
    }
}

/// Transport-level dispatch failures.
///
/// Every variant surfaces to callers as "service unavailable"; domain
/// failures travel inside a successful `CoreReply` instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("no reply from the core within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("server overloaded, try again later")]
    Overloaded,

    #[error("message bus rejected the request: {0}")]
    Bus(#[from] BusError),

    #[error("the core dropped the reply for {correlation_id}")]
    ReplyDropped { correlation_id: Uuid },
}

/// Tuning for the dispatch pipeline.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Requests beyond this many concurrent dispatches are shed.
    pub max_concurrent_dispatches: u32,
    /// Reply timeout for reads and administrative commands.
    pub default_timeout: Duration,
    /// Reply timeout for appends and deletes.
    pub write_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_dispatches: 5_000,
            default_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(2),
        }
    }
}
