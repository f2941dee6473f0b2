//! Credential extraction from the `Authorization` header.

use std::fmt;

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::authentication::AuthenticationError;

/// Credentials presented by a caller.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

impl Credentials {
    /// Parse the `Authorization` header, if present.
    ///
    /// Returns `Ok(None)` when the header is absent.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationError::MalformedHeader` for undecodable values
    /// and `AuthenticationError::UnsupportedScheme` for unknown schemes.
    pub fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, AuthenticationError> {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return Ok(None);
        };
        let value = value
            .to_str()
            .map_err(|_| AuthenticationError::MalformedHeader("non-ascii value".into()))?;

        let (scheme, rest) = value
            .split_once(' ')
            .ok_or_else(|| AuthenticationError::MalformedHeader("missing scheme".into()))?;
        let rest = rest.trim();

        if scheme.eq_ignore_ascii_case("basic") {
            Self::parse_basic(rest).map(Some)
        } else if scheme.eq_ignore_ascii_case("bearer") {
            if rest.is_empty() {
                return Err(AuthenticationError::MalformedHeader("empty bearer token".into()));
            }
            Ok(Some(Self::Bearer(rest.to_string())))
        } else {
            Err(AuthenticationError::UnsupportedScheme(scheme.to_string()))
        }
    }

    fn parse_basic(encoded: &str) -> Result<Self, AuthenticationError> {
        let decoded = STANDARD
            .decode(encoded)
            .map_err(|_| AuthenticationError::MalformedHeader("invalid base64".into()))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AuthenticationError::MalformedHeader("invalid utf-8".into()))?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| AuthenticationError::MalformedHeader("missing ':' separator".into()))?;
        if username.is_empty() {
            return Err(AuthenticationError::MalformedHeader("empty username".into()));
        }
        Ok(Self::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Encode a `Basic` header value.
    #[must_use]
    pub fn basic_header(username: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
    }
}
