//! Operation descriptors: what a request wants to do, as seen by authorization.
//!
//! An [`Operation`] is produced by route resolution (static for RPC methods,
//! dynamic for legacy routes) and is the only input, besides the principal,
//! to an authorization decision.

use std::fmt;

/// A resource/action pair naming one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationDefinition {
    pub resource: &'static str,
    pub action: &'static str,
}

impl OperationDefinition {
    #[must_use]
    pub const fn new(resource: &'static str, action: &'static str) -> Self {
        Self { resource, action }
    }
}

impl fmt::Display for OperationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

/// A resolved operation: a definition plus parameters (e.g. the stream id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operation {
    pub definition: OperationDefinition,
    pub parameters: Vec<(&'static str, String)>,
}

impl Operation {
    #[must_use]
    pub fn new(definition: OperationDefinition) -> Self {
        Self {
            definition,
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, name: &'static str, value: impl ToString) -> Self {
        self.parameters.push((name, value.to_string()));
        self
    }

    #[must_use]
    pub fn resource(&self) -> &'static str {
        self.definition.resource
    }

    #[must_use]
    pub fn action(&self) -> &'static str {
        self.definition.action
    }

    /// Returns the first parameter with the given name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.definition)?;
        for (name, value) in &self.parameters {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}

/// Parameter name carrying the target stream.
pub const STREAM_ID: &str = "streamId";
/// Parameter name carrying a target user login.
pub const USER_LOGIN: &str = "login";

/// Every operation the node authorizes.
pub mod operations {
    use super::OperationDefinition as Def;

    pub mod streams {
        use super::Def;
        pub const READ: Def = Def::new("streams", "read");
        pub const WRITE: Def = Def::new("streams", "write");
        pub const DELETE: Def = Def::new("streams", "delete");
        pub const METADATA_READ: Def = Def::new("streams", "metadata-read");
    }

    pub mod subscriptions {
        use super::Def;
        pub const CREATE: Def = Def::new("subscriptions", "create");
        pub const UPDATE: Def = Def::new("subscriptions", "update");
        pub const DELETE: Def = Def::new("subscriptions", "delete");
        pub const STATISTICS: Def = Def::new("subscriptions", "statistics");
        pub const REPLAY_PARKED: Def = Def::new("subscriptions", "replay-parked");
        pub const RESTART: Def = Def::new("subscriptions", "restart");
    }

    pub mod users {
        use super::Def;
        pub const LIST: Def = Def::new("users", "list");
        pub const READ: Def = Def::new("users", "read");
        pub const CREATE: Def = Def::new("users", "create");
        pub const UPDATE: Def = Def::new("users", "update");
        pub const DELETE: Def = Def::new("users", "delete");
        pub const ENABLE: Def = Def::new("users", "enable");
        pub const DISABLE: Def = Def::new("users", "disable");
        pub const CHANGE_PASSWORD: Def = Def::new("users", "change-password");
        pub const RESET_PASSWORD: Def = Def::new("users", "reset-password");
    }

    pub mod node {
        use super::Def;
        pub const SHUTDOWN: Def = Def::new("node", "shutdown");
        pub const SCAVENGE_START: Def = Def::new("node", "scavenge:start");
        pub const SCAVENGE_STOP: Def = Def::new("node", "scavenge:stop");
        pub const MERGE_INDEXES: Def = Def::new("node", "merge-indexes");
        pub const RESIGN: Def = Def::new("node", "resign");
        pub const SET_PRIORITY: Def = Def::new("node", "set-priority");
        pub const STATISTICS_READ: Def = Def::new("node", "statistics:read");
        pub const INFORMATION_READ: Def = Def::new("node", "information:read");
        pub const GOSSIP_READ: Def = Def::new("node", "gossip:read");
        pub const GOSSIP_UPDATE: Def = Def::new("node", "gossip:update");
        pub const GOSSIP_CLIENT_READ: Def = Def::new("node", "gossip:client-read");
        pub const ELECTIONS: Def = Def::new("node", "elections");
        pub const REDACTION: Def = Def::new("node", "redaction");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_parameters() {
        let op = Operation::new(operations::streams::WRITE).with_parameter(STREAM_ID, "orders");
        assert_eq!(op.to_string(), "streams:write streamId=orders");
    }

    #[test]
    fn parameter_lookup() {
        let op = Operation::new(operations::users::READ).with_parameter(USER_LOGIN, "admin");
        assert_eq!(op.parameter(USER_LOGIN), Some("admin"));
        assert_eq!(op.parameter(STREAM_ID), None);
        assert_eq!(op.resource(), "users");
        assert_eq!(op.action(), "read");
    }
}
