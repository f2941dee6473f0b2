//! Role-based authorization policy.

use async_trait::async_trait;
use streamgate_core::operation::{STREAM_ID, USER_LOGIN};
use streamgate_core::{operations, roles, Operation, OperationDefinition, Principal};

use crate::security::authorization::AuthorizationProvider;

/// Who may perform an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    Anyone,
    Authenticated,
    /// Authenticated, and either the principal named by the `login`
    /// parameter or an administrator.
    SelfOrAdmin,
    AnyRole(&'static [&'static str]),
}

const ADMINS: &[&str] = &[roles::ADMINS];
const OPERATORS: &[&str] = &[roles::ADMINS, roles::OPS];
const CLUSTER: &[&str] = &[roles::SYSTEM];

fn requirement(operation: &Operation) -> Requirement {
    use operations::{node, streams, subscriptions, users};

    let def: OperationDefinition = operation.definition;
    if def.resource == "streams" {
        let system_stream = operation
            .parameter(STREAM_ID)
            .is_some_and(|s| s.starts_with('$'));
        return match def {
            streams::READ | streams::METADATA_READ if !system_stream => Requirement::Authenticated,
            streams::WRITE | streams::DELETE if !system_stream => Requirement::Authenticated,
            _ => Requirement::AnyRole(ADMINS),
        };
    }

    match def {
        subscriptions::STATISTICS => Requirement::Authenticated,
        subscriptions::CREATE
        | subscriptions::UPDATE
        | subscriptions::DELETE
        | subscriptions::REPLAY_PARKED
        | subscriptions::RESTART => Requirement::AnyRole(OPERATORS),

        users::READ | users::CHANGE_PASSWORD => Requirement::SelfOrAdmin,

        node::INFORMATION_READ | node::GOSSIP_CLIENT_READ => Requirement::Anyone,
        node::STATISTICS_READ => Requirement::Authenticated,
        node::GOSSIP_READ | node::GOSSIP_UPDATE | node::ELECTIONS => Requirement::AnyRole(CLUSTER),
        node::SHUTDOWN
        | node::SCAVENGE_START
        | node::SCAVENGE_STOP
        | node::MERGE_INDEXES
        | node::RESIGN
        | node::SET_PRIORITY => Requirement::AnyRole(OPERATORS),

        _ => Requirement::AnyRole(ADMINS),
    }
}

/// Default policy keyed on the well-known roles.
///
/// Administrators may do anything; other principals are checked against a
/// fixed table. Operations without an entry are admin-only.
#[derive(Debug, Default)]
pub struct PolicyAuthorizationProvider;

#[async_trait]
impl AuthorizationProvider for PolicyAuthorizationProvider {
    fn name(&self) -> &'static str {
        "policy"
    }

    async fn check_access(&self, principal: &Principal, operation: &Operation) -> bool {
        if principal.has_role(roles::ADMINS) {
            return true;
        }
        let authenticated = principal.has_role(roles::AUTHENTICATED);
        match requirement(operation) {
            Requirement::Anyone => true,
            Requirement::Authenticated => authenticated,
            Requirement::SelfOrAdmin => {
                authenticated && operation.parameter(USER_LOGIN) == Some(principal.id.as_str())
            }
            Requirement::AnyRole(allowed) => allowed.iter().any(|role| principal.has_role(role)),
        }
    }
}

/// Allows everything. Paired with insecure authentication.
#[derive(Debug, Default)]
pub struct PassthroughAuthorizationProvider;

#[async_trait]
impl AuthorizationProvider for PassthroughAuthorizationProvider {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    async fn check_access(&self, _principal: &Principal, _operation: &Operation) -> bool {
        true
    }
}
