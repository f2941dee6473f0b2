use async_trait::async_trait;
use streamgate_core::Principal;

use crate::security::authentication::{AuthenticationError, AuthenticationProvider};
use crate::security::credentials::Credentials;

/// Development mode: every caller, with or without credentials, runs as the
/// system principal.
#[derive(Debug, Default)]
pub struct InsecureAuthenticationProvider;

#[async_trait]
impl AuthenticationProvider for InsecureAuthenticationProvider {
    fn name(&self) -> &'static str {
        "insecure"
    }

    async fn authenticate(&self, _credentials: Credentials) -> Result<Principal, AuthenticationError> {
        Ok(Principal::system())
    }

    fn unauthenticated_principal(&self) -> Option<Principal> {
        Some(Principal::system())
    }
}
