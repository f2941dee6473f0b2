//! Request and response codecs for the legacy surface.
//!
//! JSON is the default. `MsgPack` payloads use `rmp_serde::to_vec_named()` so
//! field names survive, matching the JSON shape.

use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Json,
    MsgPack,
    /// Plain text, only used for the metrics scrape.
    Text,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("msgpack encode: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),
    #[error("msgpack decode: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
    #[error("text bodies cannot be decoded")]
    TextDecode,
}

impl Codec {
    pub const DATA: &'static [Codec] = &[Codec::Json, Codec::MsgPack];
    pub const TEXT: &'static [Codec] = &[Codec::Text];

    #[must_use]
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::MsgPack => "application/msgpack",
            Self::Text => "text/plain; version=0.0.4",
        }
    }

    /// Parse a `Content-Type`-style value, ignoring parameters. Structured
    /// `+json` types are JSON.
    #[must_use]
    pub fn from_media_type(value: &str) -> Option<Self> {
        let essence = value.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/json" => Some(Self::Json),
            "application/msgpack" | "application/x-msgpack" => Some(Self::MsgPack),
            "text/plain" => Some(Self::Text),
            other if other.starts_with("application/") && other.ends_with("+json") => Some(Self::Json),
            _ => None,
        }
    }

    /// Pick the response codec for an `Accept` header.
    ///
    /// A missing header or a wildcard selects the first supported codec.
    /// Entries with `q=0` are skipped; otherwise header order wins.
    #[must_use]
    pub fn negotiate(accept: Option<&str>, supported: &[Codec]) -> Option<Self> {
        let default = supported.first().copied();
        let Some(accept) = accept.map(str::trim).filter(|a| !a.is_empty()) else {
            return default;
        };
        for entry in accept.split(',') {
            let mut parts = entry.split(';');
            let media = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
            let refused = parts.any(|p| {
                let p = p.trim();
                p.strip_prefix("q=")
                    .and_then(|q| q.parse::<f32>().ok())
                    .is_some_and(|q| q <= 0.0)
            });
            if refused {
                continue;
            }
            let chosen = match media.as_str() {
                "*/*" => default,
                m if m.ends_with("/*") => {
                    let prefix = &m[..m.len() - 1];
                    supported
                        .iter()
                        .copied()
                        .find(|c| c.media_type().starts_with(prefix))
                }
                m => Self::from_media_type(m).filter(|c| supported.contains(c)),
            };
            if chosen.is_some() {
                return chosen;
            }
        }
        None
    }

    /// # Errors
    ///
    /// Returns `CodecError` if `value` cannot be represented in this codec.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::Json => Ok(serde_json::to_vec(value)?),
            Self::MsgPack => Ok(rmp_serde::to_vec_named(value)?),
            Self::Text => match serde_json::to_value(value)? {
                serde_json::Value::String(s) => Ok(s.into_bytes()),
                other => Ok(other.to_string().into_bytes()),
            },
        }
    }

    /// # Errors
    ///
    /// Returns `CodecError` if `bytes` is not a valid `T` in this codec.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Self::Json => Ok(serde_json::from_slice(bytes)?),
            Self::MsgPack => Ok(rmp_serde::from_slice(bytes)?),
            Self::Text => Err(CodecError::TextDecode),
        }
    }
}
