//! Error types for the Solana payment path.

/// Failure talking to the RPC node.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The RPC call itself failed.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// Confirmation polling exceeded its deadline.
    #[error("transaction confirmation timed out")]
    ConfirmTimeout,
}

/// A proof payload that does not hold a usable transaction.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not valid base64.
    #[error("transaction payload is not valid base64")]
    Base64,
    /// The bytes do not deserialize to a versioned transaction.
    #[error("transaction payload does not deserialize: {0}")]
    Deserialize(String),
}
