//! Security middleware chain: authentication, then authorization.
//!
//! Both the structured-RPC surface and the legacy HTTP pipeline use the same
//! [`Authenticator`] and [`Authorizer`], so every surface enforces identical
//! rules.

pub mod authentication;
pub mod authorization;
pub mod credentials;
pub mod middleware;
pub mod providers;

pub use authentication::{AuthenticationError, AuthenticationProvider, Authenticator};
pub use authorization::{AccessDenied, AuthorizationProvider, Authorized, Authorizer};
pub use credentials::Credentials;

use std::sync::Arc;

use streamgate_core::roles;

use providers::{
    InsecureAuthenticationProvider, InternalAuthenticationProvider, JwtAuthenticationProvider,
    PassthroughAuthorizationProvider, PolicyAuthorizationProvider,
};

/// Which authentication backend the node uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AuthenticationKind {
    #[default]
    Internal,
    Jwt,
    Insecure,
}

/// Which authorization backend the node uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AuthorizationKind {
    #[default]
    Policy,
    Passthrough,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub authentication: AuthenticationKind,
    pub authorization: AuthorizationKind,
    /// Admit callers without credentials as the anonymous principal.
    pub allow_anonymous: bool,
    /// HS256 secret, required for `AuthenticationKind::Jwt`.
    pub jwt_secret: Option<String>,
    pub default_admin_password: String,
    pub default_ops_password: String,
    /// Password of the `$node` account peers use for cluster traffic.
    pub node_password: Option<String>,
    pub credential_cache_capacity: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            authentication: AuthenticationKind::Internal,
            authorization: AuthorizationKind::Policy,
            allow_anonymous: false,
            jwt_secret: None,
            default_admin_password: "changeit".to_string(),
            default_ops_password: "changeit".to_string(),
            node_password: None,
            credential_cache_capacity: 1_024,
        }
    }
}

/// Login of the account peers authenticate as.
pub const NODE_ACCOUNT: &str = "$node";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityConfigError {
    #[error("jwt authentication requires a secret")]
    MissingJwtSecret,
}

/// Build the configured authentication backend.
///
/// # Errors
///
/// Returns `SecurityConfigError` when the selected backend lacks required settings.
pub fn authentication_provider(
    config: &SecurityConfig,
) -> Result<Arc<dyn AuthenticationProvider>, SecurityConfigError> {
    Ok(match config.authentication {
        AuthenticationKind::Internal => {
            let provider = InternalAuthenticationProvider::new(config.credential_cache_capacity);
            provider.upsert_user(
                "admin",
                &config.default_admin_password,
                vec![roles::ADMINS.to_string()],
            );
            provider.upsert_user(
                "ops",
                &config.default_ops_password,
                vec![roles::OPS.to_string()],
            );
            if let Some(password) = &config.node_password {
                provider.upsert_user(NODE_ACCOUNT, password, vec![roles::SYSTEM.to_string()]);
            }
            Arc::new(provider)
        }
        AuthenticationKind::Jwt => {
            let secret = config
                .jwt_secret
                .as_deref()
                .ok_or(SecurityConfigError::MissingJwtSecret)?;
            Arc::new(JwtAuthenticationProvider::new(secret.as_bytes()))
        }
        AuthenticationKind::Insecure => Arc::new(InsecureAuthenticationProvider),
    })
}

#[must_use]
pub fn authorization_provider(config: &SecurityConfig) -> Arc<dyn AuthorizationProvider> {
    match config.authorization {
        AuthorizationKind::Policy => Arc::new(PolicyAuthorizationProvider),
        AuthorizationKind::Passthrough => Arc::new(PassthroughAuthorizationProvider),
    }
}
