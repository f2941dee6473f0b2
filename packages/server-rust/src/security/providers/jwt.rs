//! HS256 bearer-token authentication.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use streamgate_core::Principal;

use crate::security::authentication::{AuthenticationError, AuthenticationProvider};
use crate::security::credentials::Credentials;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    roles: Vec<String>,
}

/// Verifies `Bearer` tokens signed with a shared secret.
///
/// The token's `sub` becomes the principal id and its `roles` claim the
/// principal's roles. `exp` is required.
pub struct JwtAuthenticationProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticationProvider {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

#[async_trait]
impl AuthenticationProvider for JwtAuthenticationProvider {
    fn name(&self) -> &'static str {
        "jwt"
    }

    async fn authenticate(&self, credentials: Credentials) -> Result<Principal, AuthenticationError> {
        let Credentials::Bearer(token) = credentials else {
            return Err(AuthenticationError::UnsupportedScheme("Basic".into()));
        };
        let data = decode::<Claims>(&token, &self.key, &self.validation)
            .map_err(|e| AuthenticationError::InvalidToken(e.to_string()))?;
        Ok(Principal::authenticated(data.claims.sub, data.claims.roles))
    }
}
