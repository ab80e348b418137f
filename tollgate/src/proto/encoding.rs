//! Base64 helpers for header payloads.

use std::fmt::{self, Display, Formatter};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Bytes that hold base64 text.
///
/// Wraps the encoded form so encoded and raw data cannot be confused at call
/// sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Encodes raw bytes into base64 text bytes.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        Self(b64.encode(input.as_ref()).into_bytes())
    }

    /// Decodes the base64 text back to raw bytes.
    ///
    /// Leading and trailing ASCII whitespace is tolerated, as header values
    /// in the wild occasionally carry it.
    ///
    /// # Errors
    ///
    /// Returns an error if the contents are not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(self.0.trim_ascii())
    }

    /// Serializes a value to JSON and encodes it as base64 text.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::encode(serde_json::to_vec(value)?))
    }

    /// Decodes base64 text and parses the contents as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeJsonError`] distinguishing base64 failures from JSON
    /// parse failures.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, DecodeJsonError> {
        let bytes = self.decode().map_err(DecodeJsonError::Base64)?;
        serde_json::from_slice(&bytes).map_err(DecodeJsonError::Json)
    }
}

/// Error decoding base64-wrapped JSON.
#[derive(Debug, thiserror::Error)]
pub enum DecodeJsonError {
    /// The outer base64 layer was invalid.
    #[error("invalid base64: {0}")]
    Base64(#[source] base64::DecodeError),
    /// The inner JSON did not parse.
    #[error("invalid JSON: {0}")]
    Json(#[source] serde_json::Error),
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl Display for Base64Bytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}
