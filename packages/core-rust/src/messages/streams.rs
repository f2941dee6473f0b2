//! Stream read/write commands and their payload types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stream_id::StreamId;

// ---------------------------------------------------------------------------
// Positions and revisions
// ---------------------------------------------------------------------------

/// Direction of a stream read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ReadDirection {
    #[default]
    Forwards,
    Backwards,
}

/// Where a read starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamPosition {
    Start,
    End,
    Revision(u64),
}

/// Optimistic-concurrency expectation for writes and deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExpectedRevision {
    #[default]
    Any,
    NoStream,
    StreamExists,
    Exact(u64),
}

impl ExpectedRevision {
    /// Parses the legacy numeric header form: `-2` any, `-1` no stream,
    /// `-4` stream exists, non-negative exact.
    #[must_use]
    pub fn from_legacy(value: i64) -> Option<Self> {
        match value {
            -2 => Some(Self::Any),
            -1 => Some(Self::NoStream),
            -4 => Some(Self::StreamExists),
            v if v >= 0 => u64::try_from(v).ok().map(Self::Exact),
            _ => None,
        }
    }
}

/// An event proposed for append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedEvent {
    pub event_id: Uuid,
    pub event_type: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn default_content_type() -> String {
    "application/json".to_string()
}

// ---------------------------------------------------------------------------
// StreamCommand
// ---------------------------------------------------------------------------

/// Commands addressed to the storage engine's stream front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamCommand<S: StreamId> {
    Read {
        stream: S,
        from: StreamPosition,
        direction: ReadDirection,
        max_count: u64,
        resolve_links: bool,
    },
    ReadEvent {
        stream: S,
        event_number: u64,
        resolve_links: bool,
    },
    Append {
        stream: S,
        expected: ExpectedRevision,
        events: Vec<ProposedEvent>,
    },
    Delete {
        stream: S,
        expected: ExpectedRevision,
        hard: bool,
    },
}

impl<S: StreamId> StreamCommand<S> {
    #[must_use]
    pub fn stream(&self) -> &S {
        match self {
            Self::Read { stream, .. }
            | Self::ReadEvent { stream, .. }
            | Self::Append { stream, .. }
            | Self::Delete { stream, .. } => stream,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read { .. } => "streams.read",
            Self::ReadEvent { .. } => "streams.read-event",
            Self::Append { .. } => "streams.append",
            Self::Delete { hard: false, .. } => "streams.delete",
            Self::Delete { hard: true, .. } => "streams.tombstone",
        }
    }
}
