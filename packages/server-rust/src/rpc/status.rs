//! RPC status codes and reply encoding.
//!
//! Every RPC response carries an `rpc-status` header. Successful replies use
//! `ok`; domain failures from the core use the failure code (for example
//! `wrong-expected-version`); transport-level errors use the [`RpcError`]
//! status name.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use streamgate_core::CoreReply;

use crate::dispatch::DispatchError;
use crate::security::AccessDenied;

pub const RPC_STATUS_HEADER: &str = "rpc-status";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("no authenticated principal on the call")]
    Unauthenticated,

    #[error(transparent)]
    PermissionDenied(#[from] AccessDenied),

    #[error("method {service}/{method} is not implemented")]
    Unimplemented { service: String, method: String },

    #[error("{0}")]
    Unavailable(String),

    #[error("request body exceeds {limit} bytes")]
    ResourceExhausted { limit: usize },

    #[error("{0}")]
    Internal(String),
}

impl RpcError {
    #[must_use]
    pub fn status_name(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid-argument",
            Self::Unauthenticated => "unauthenticated",
            Self::PermissionDenied(_) => "permission-denied",
            Self::Unimplemented { .. } => "unimplemented",
            Self::Unavailable(_) => "unavailable",
            Self::ResourceExhausted { .. } => "resource-exhausted",
            Self::Internal(_) => "internal",
        }
    }

    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::Unimplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ResourceExhausted { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<DispatchError> for RpcError {
    fn from(e: DispatchError) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        (
            self.http_status(),
            [(RPC_STATUS_HEADER, self.status_name())],
            Json(json!({ "status": self.status_name(), "message": self.to_string() })),
        )
            .into_response()
    }
}

/// Encode a reply from the core.
pub(crate) fn reply_response(reply: CoreReply) -> Response {
    match reply {
        CoreReply::Success(payload) => {
            (StatusCode::OK, [(RPC_STATUS_HEADER, "ok")], Json(payload)).into_response()
        }
        CoreReply::Failure(failure) => {
            let status = StatusCode::from_u16(failure.code.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, [(RPC_STATUS_HEADER, failure.code.as_str())], Json(failure)).into_response()
        }
    }
}
