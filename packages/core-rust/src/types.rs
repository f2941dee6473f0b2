use serde::{Deserialize, Serialize};

/// Well-known role names.
pub mod roles {
    /// Full administrative access.
    pub const ADMINS: &str = "$admins";
    /// Operational access (scavenges, shutdowns, subscription management).
    pub const OPS: &str = "$ops";
    /// Cluster-internal traffic (gossip, elections).
    pub const SYSTEM: &str = "$system";
    /// Every successfully authenticated principal carries this role.
    pub const AUTHENTICATED: &str = "$authenticated";
}

const ANONYMOUS_ID: &str = "$anonymous";
const SYSTEM_ID: &str = "$system";

/// Authenticated caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier for the authenticated entity.
    pub id: String,
    /// Roles assigned to this principal for authorization checks.
    pub roles: Vec<String>,
}

impl Principal {
    /// Creates an authenticated principal. The `$authenticated` role is added
    /// if it is not already present.
    #[must_use]
    pub fn authenticated(id: impl Into<String>, roles: impl IntoIterator<Item = String>) -> Self {
        let mut roles: Vec<String> = roles.into_iter().collect();
        if !roles.iter().any(|r| r == roles::AUTHENTICATED) {
            roles.push(roles::AUTHENTICATED.to_string());
        }
        Self {
            id: id.into(),
            roles,
        }
    }

    /// The identity attached to callers that present no credentials.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            id: ANONYMOUS_ID.to_string(),
            roles: Vec::new(),
        }
    }

    /// The node's own identity, used for cluster-internal traffic.
    #[must_use]
    pub fn system() -> Self {
        Self::authenticated(
            SYSTEM_ID,
            [roles::SYSTEM.to_string(), roles::ADMINS.to_string()],
        )
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.id == ANONYMOUS_ID
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticated_adds_marker_role_once() {
        let p = Principal::authenticated(
            "ouro",
            ["$authenticated".to_string(), "$ops".to_string()],
        );
        assert_eq!(p.roles.iter().filter(|r| *r == "$authenticated").count(), 1);
        assert!(p.has_role(roles::OPS));
    }

    #[test]
    fn anonymous_has_no_roles() {
        let p = Principal::anonymous();
        assert!(p.is_anonymous());
        assert!(!p.has_role(roles::AUTHENTICATED));
    }

    #[test]
    fn system_is_admin() {
        let p = Principal::system();
        assert!(p.has_role(roles::SYSTEM));
        assert!(p.has_role(roles::ADMINS));
        assert!(!p.is_anonymous());
    }
}
