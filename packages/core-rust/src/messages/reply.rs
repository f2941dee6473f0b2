//! Replies produced by the internal core.
//!
//! The dispatch layer never builds a [`DomainFailure`] itself; it forwards
//! whatever the core returned.

use serde::{Deserialize, Serialize};

/// Failure categories the core reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCode {
    StreamNotFound,
    StreamDeleted,
    WrongExpectedVersion,
    NotLeader,
    AccessDenied,
    InvalidRequest,
    Other,
}

impl FailureCode {
    /// Wire name, identical to the serialized form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StreamNotFound => "stream-not-found",
            Self::StreamDeleted => "stream-deleted",
            Self::WrongExpectedVersion => "wrong-expected-version",
            Self::NotLeader => "not-leader",
            Self::AccessDenied => "access-denied",
            Self::InvalidRequest => "invalid-request",
            Self::Other => "other",
        }
    }

    /// HTTP status the core requests for this failure.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::StreamNotFound => 404,
            Self::StreamDeleted => 410,
            Self::WrongExpectedVersion => 409,
            Self::NotLeader => 421,
            Self::AccessDenied => 403,
            Self::InvalidRequest => 400,
            Self::Other => 500,
        }
    }
}

/// A domain-specific failure, passed to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainFailure {
    pub code: FailureCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl DomainFailure {
    #[must_use]
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }
}

/// The correlated result of one internal message.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreReply {
    Success(serde_json::Value),
    Failure(DomainFailure),
}

impl CoreReply {
    /// An empty success, used for fire-and-forget publications.
    #[must_use]
    pub fn empty() -> Self {
        Self::Success(serde_json::Value::Null)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_serializes_without_null_details() {
        let failure = DomainFailure::new(FailureCode::WrongExpectedVersion, "expected 3, was 5");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["code"], "wrong-expected-version");
        assert_eq!(json["code"], failure.code.as_str());
        assert!(json.get("details").is_none());
    }

    #[test]
    fn failure_statuses() {
        assert_eq!(FailureCode::StreamNotFound.http_status(), 404);
        assert_eq!(FailureCode::StreamDeleted.http_status(), 410);
        assert_eq!(FailureCode::Other.http_status(), 500);
    }
}
