//! Terminal failures of the legacy pipeline.

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::dispatch::DispatchError;

/// Route resolution failed. Nothing was authorized or published.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no route for {path}")]
    NotFound { path: String },

    #[error("method not allowed")]
    MethodNotAllowed { allowed: Vec<Method> },

    #[error("invalid {name}: {message}")]
    BadParameter { name: &'static str, message: String },

    #[error("unsupported content type '{0}'")]
    UnsupportedMediaType(String),

    #[error("none of '{0}' can be produced")]
    NotAcceptable(String),
}

impl ResolveError {
    pub(crate) fn bad(name: &'static str, message: impl Into<String>) -> Self {
        Self::BadParameter {
            name,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadParameter { .. } => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
        }
    }
}

impl IntoResponse for ResolveError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(json!({ "error": self.to_string() }))).into_response();
        if let Self::MethodNotAllowed { allowed } = &self {
            let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }
        response
    }
}

/// Failure after authorization, while executing the resolved action.
#[derive(Debug, thiserror::Error)]
pub enum LegacyError {
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("metrics recorder is not installed")]
    MetricsDisabled,

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for LegacyError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Dispatch(_) | Self::MetricsDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self, "legacy request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
