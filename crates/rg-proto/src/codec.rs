//! Payload encoding/decoding
//!
//! Framing (length prefixes) is the transport's concern; a codec only turns
//! one frame body into bytes and back.
//! - Bincode: compact binary, the default on the wire
//! - JSON: human-readable, debugging

use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Serialization codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Codec {
    /// Compact binary encoding
    #[default]
    Bincode,
    /// JSON encoding (human-readable)
    Json,
}

impl Codec {
    /// Encode a message
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes, CodecError> {
        let data = match self {
            Self::Bincode => {
                bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))?
            }
            Self::Json => serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))?,
        };
        Ok(Bytes::from(data))
    }

    /// Decode a message
    pub fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError> {
        match self {
            Self::Bincode => {
                bincode::deserialize(data).map_err(|e| CodecError::Decode(e.to_string()))
            }
            Self::Json => {
                serde_json::from_slice(data).map_err(|e| CodecError::Decode(e.to_string()))
            }
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bincode => "bincode",
            Self::Json => "json",
        }
    }
}

/// Codec errors
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Decoding failed: {0}")]
    Decode(String),
}
