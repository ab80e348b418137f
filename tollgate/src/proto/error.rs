//! Typed failures for proof decoding.

use super::InvalidReason;

/// A caller-supplied payment proof that could not be decoded.
///
/// Surfaced to the caller as a 402 with a machine-readable reason, never as
/// a server error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProofFormatError {
    /// The header value is not valid base64.
    #[error("payment header is not valid base64")]
    NotBase64,
    /// The decoded JSON carries no transaction payload.
    #[error("payment proof carries no payload")]
    MissingPayload,
    /// The decoded bytes are not the expected JSON shape.
    #[error("payment proof is not well-formed JSON")]
    MalformedJson,
}

impl ProofFormatError {
    /// The wire string for this failure.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::NotBase64 => "not_base64",
            Self::MissingPayload => "missing_payload",
            Self::MalformedJson => "malformed_json",
        }
    }
}

impl From<ProofFormatError> for InvalidReason {
    fn from(_: ProofFormatError) -> Self {
        Self::ProofFormatError
    }
}
