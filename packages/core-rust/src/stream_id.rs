//! Stream identifier capability.
//!
//! The dispatch layer never inspects stream identifiers beyond comparing,
//! ordering, hashing, printing, parsing, and serializing them. Any type with
//! that capability set is a [`StreamId`]; the node is instantiated once with a
//! concrete identifier type rather than duplicating code per type.

use std::fmt::{self, Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Capability set required of a stream identifier.
///
/// Implemented automatically for every type that satisfies the bounds, so
/// `StreamName`, `u64`, or an engine-specific numeric id can all be used.
pub trait StreamId:
    Clone
    + Eq
    + Ord
    + Hash
    + Debug
    + Display
    + FromStr
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Returns `true` for system streams (by convention, names starting with `$`).
    fn is_system(&self) -> bool {
        self.to_string().starts_with('$')
    }
}

impl<T> StreamId for T where
    T: Clone
        + Eq
        + Ord
        + Hash
        + Debug
        + Display
        + FromStr
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Errors from parsing a [`StreamName`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamNameError {
    #[error("stream name must not be empty")]
    Empty,
    #[error("stream name must not contain control characters")]
    ControlCharacter,
}

/// Default stream identifier: a validated UTF-8 stream name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamName(String);

impl StreamName {
    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StreamName {
    type Err = StreamNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl TryFrom<String> for StreamName {
    type Error = StreamNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(StreamNameError::Empty);
        }
        if value.chars().any(char::is_control) {
            return Err(StreamNameError::ControlCharacter);
        }
        Ok(Self(value))
    }
}

impl From<StreamName> for String {
    fn from(name: StreamName) -> Self {
        name.0
    }
}

impl Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
