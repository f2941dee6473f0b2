//! Administrative commands: users, node operations, persistent subscriptions,
//! monitoring, and redaction.

use serde::{Deserialize, Serialize};

use super::streams::StreamPosition;
use crate::stream_id::StreamId;

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Create {
        login: String,
        full_name: String,
        groups: Vec<String>,
        password: String,
    },
    Update {
        login: String,
        full_name: String,
        groups: Vec<String>,
    },
    Delete {
        login: String,
    },
    Enable {
        login: String,
    },
    Disable {
        login: String,
    },
    /// Details of one user, or all users when `login` is `None`.
    Details {
        login: Option<String>,
    },
    ChangePassword {
        login: String,
        current_password: String,
        new_password: String,
    },
    ResetPassword {
        login: String,
        new_password: String,
    },
}

impl UserCommand {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "users.create",
            Self::Update { .. } => "users.update",
            Self::Delete { .. } => "users.delete",
            Self::Enable { .. } => "users.enable",
            Self::Disable { .. } => "users.disable",
            Self::Details { .. } => "users.details",
            Self::ChangePassword { .. } => "users.change-password",
            Self::ResetPassword { .. } => "users.reset-password",
        }
    }
}

// ---------------------------------------------------------------------------
// Node operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationsCommand {
    StartScavenge {
        threads: u32,
        start_from_chunk: u32,
    },
    StopScavenge {
        scavenge_id: String,
    },
    Shutdown,
    MergeIndexes,
    ResignNode,
    SetNodePriority {
        priority: i32,
    },
    RestartPersistentSubscriptions,
}

impl OperationsCommand {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartScavenge { .. } => "operations.start-scavenge",
            Self::StopScavenge { .. } => "operations.stop-scavenge",
            Self::Shutdown => "operations.shutdown",
            Self::MergeIndexes => "operations.merge-indexes",
            Self::ResignNode => "operations.resign-node",
            Self::SetNodePriority { .. } => "operations.set-node-priority",
            Self::RestartPersistentSubscriptions => "operations.restart-subscriptions",
        }
    }
}

// ---------------------------------------------------------------------------
// Persistent subscriptions
// ---------------------------------------------------------------------------

/// Consumer group settings for a persistent subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionSettings {
    pub resolve_links: bool,
    pub start_from: StreamPosition,
    pub message_timeout_ms: u64,
    pub max_retry_count: u32,
    pub live_buffer_size: u32,
    pub checkpoint_after_ms: u64,
    pub consumer_strategy: String,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            resolve_links: false,
            start_from: StreamPosition::End,
            message_timeout_ms: 30_000,
            max_retry_count: 10,
            live_buffer_size: 500,
            checkpoint_after_ms: 2_000,
            consumer_strategy: "RoundRobin".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionCommand<S: StreamId> {
    Create {
        stream: S,
        group: String,
        settings: SubscriptionSettings,
    },
    Update {
        stream: S,
        group: String,
        settings: SubscriptionSettings,
    },
    Delete {
        stream: S,
        group: String,
    },
    GetInfo {
        stream: S,
        group: String,
    },
    /// All subscriptions, or those on one stream.
    List {
        stream: Option<S>,
    },
    ReplayParked {
        stream: S,
        group: String,
        stop_at: Option<u64>,
    },
}

impl<S: StreamId> SubscriptionCommand<S> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "subscriptions.create",
            Self::Update { .. } => "subscriptions.update",
            Self::Delete { .. } => "subscriptions.delete",
            Self::GetInfo { .. } => "subscriptions.get-info",
            Self::List { .. } => "subscriptions.list",
            Self::ReplayParked { .. } => "subscriptions.replay-parked",
        }
    }
}

// ---------------------------------------------------------------------------
// Monitoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitoringCommand {
    Stats { use_metadata: bool },
}

// ---------------------------------------------------------------------------
// Redaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedactionCommand<S: StreamId> {
    GetEventPositions { stream: S, revisions: Vec<u64> },
    SwitchChunk { target_chunk: String, input_chunk: String },
}

impl<S: StreamId> RedactionCommand<S> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetEventPositions { .. } => "redaction.get-event-positions",
            Self::SwitchChunk { .. } => "redaction.switch-chunk",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_settings_fill_defaults() {
        let settings: SubscriptionSettings =
            serde_json::from_value(serde_json::json!({ "maxRetryCount": 3 })).unwrap();
        assert_eq!(settings.max_retry_count, 3);
        assert_eq!(settings.start_from, StreamPosition::End);
        assert_eq!(settings.consumer_strategy, "RoundRobin");
    }
}
