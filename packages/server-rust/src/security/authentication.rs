//! Authentication: credentials in, [`Principal`] out.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use streamgate_core::Principal;

use super::credentials::Credentials;

/// Why a request could not be authenticated. Always answered with 401.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthenticationError {
    #[error("no credentials supplied")]
    MissingCredentials,

    #[error("malformed authorization header: {0}")]
    MalformedHeader(String),

    #[error("unsupported authorization scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

impl IntoResponse for AuthenticationError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"streamgate\"")],
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Pluggable authentication backend.
#[async_trait]
pub trait AuthenticationProvider: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Verify `credentials` and resolve the caller's principal.
    async fn authenticate(&self, credentials: Credentials)
        -> Result<Principal, AuthenticationError>;

    /// Identity for callers presenting no credentials, if this backend grants one.
    fn unauthenticated_principal(&self) -> Option<Principal> {
        None
    }
}

/// Front of the security chain, shared by every protocol surface.
pub struct Authenticator {
    provider: Arc<dyn AuthenticationProvider>,
    allow_anonymous: bool,
}

impl Authenticator {
    #[must_use]
    pub fn new(provider: Arc<dyn AuthenticationProvider>, allow_anonymous: bool) -> Self {
        Self {
            provider,
            allow_anonymous,
        }
    }

    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Resolve the principal for a request's headers.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationError` when credentials are malformed or
    /// rejected, or absent while anonymous access is disabled.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthenticationError> {
        match Credentials::from_headers(headers)? {
            Some(credentials) => self.provider.authenticate(credentials).await,
            None => self
                .provider
                .unauthenticated_principal()
                .or_else(|| self.allow_anonymous.then(Principal::anonymous))
                .ok_or(AuthenticationError::MissingCredentials),
        }
    }
}
