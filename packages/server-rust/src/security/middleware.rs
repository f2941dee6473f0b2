//! Authentication middleware for the protected router.
//!
//! Runs before routing into RPC or legacy handlers. On success the resolved
//! [`Principal`] is attached to the request extensions; on failure the
//! request is answered with 401 and never reaches a handler.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use streamgate_core::Principal;

use super::authentication::Authenticator;

pub async fn authenticate(
    State(authenticator): State<Arc<Authenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticator.authenticate(request.headers()).await {
        Ok(principal) => {
            tracing::trace!(principal = %principal.id, path = request.uri().path(), "authenticated");
            request.extensions_mut().insert::<Principal>(principal);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, path = request.uri().path(), "authentication rejected");
            e.into_response()
        }
    }
}
