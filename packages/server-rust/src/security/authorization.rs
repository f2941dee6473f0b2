//! Authorization: `(principal, operation)` in, allow or deny out.
//!
//! [`Authorizer::authorize`] is the only way to obtain an [`Authorized`]
//! grant, and the dispatch bridge accepts nothing else. A request can
//! therefore only reach the core after both authentication and
//! authorization succeeded.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use streamgate_core::{Operation, Principal};

/// Pluggable authorization backend.
#[async_trait]
pub trait AuthorizationProvider: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn check_access(&self, principal: &Principal, operation: &Operation) -> bool;
}

/// Proof that `principal` may perform `operation`.
///
/// Not `Clone`: a grant is consumed by exactly one dispatch.
#[derive(Debug)]
pub struct Authorized {
    principal: Principal,
    operation: Operation,
}

impl Authorized {
    /// Grant for traffic the node originates itself (seed gossip).
    pub(crate) fn system(operation: Operation) -> Self {
        Self {
            principal: Principal::system(),
            operation,
        }
    }

    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    #[must_use]
    pub fn into_principal(self) -> Principal {
        self.principal
    }
}

/// The authorization provider denied the operation. Answered with 403.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("access denied to {operation} for '{principal}'")]
pub struct AccessDenied {
    pub principal: String,
    pub operation: String,
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Second stage of the security chain, shared by every protocol surface.
pub struct Authorizer {
    provider: Arc<dyn AuthorizationProvider>,
}

impl Authorizer {
    #[must_use]
    pub fn new(provider: Arc<dyn AuthorizationProvider>) -> Self {
        Self { provider }
    }

    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Check `operation` for `principal` and issue a grant.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` when the provider refuses.
    pub async fn authorize(
        &self,
        principal: &Principal,
        operation: Operation,
    ) -> Result<Authorized, AccessDenied> {
        if self.provider.check_access(principal, &operation).await {
            Ok(Authorized {
                principal: principal.clone(),
                operation,
            })
        } else {
            tracing::info!(principal = %principal.id, %operation, "access denied");
            Err(AccessDenied {
                principal: principal.id.clone(),
                operation: operation.to_string(),
            })
        }
    }
}
