//! Wire format types for the tollgate payment protocol.
//!
//! Defines the payment challenge ([`PaymentRequirements`]), the proof of
//! payment carried in a request header ([`PaymentProof`] and its decoded form
//! [`DecodedProof`]), and the outcome types returned by verification and
//! settlement ([`VerifyOutcome`], [`SettleOutcome`]).
//!
//! All JSON-facing types serialize in camelCase to match the facilitator
//! wire format.

pub mod encoding;
pub mod error;

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use encoding::Base64Bytes;
pub use error::ProofFormatError;

/// The only payment scheme this gateway speaks.
pub const EXACT_SCHEME: &str = "exact";

/// Protocol version carried in payment proofs and 402 challenges.
pub const X402_VERSION: u32 = 1;

/// Token asset accepted for payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    /// Mint address of the token.
    pub mint: String,
    /// Number of decimals in the token's base unit.
    pub decimals: u8,
    /// Human-readable symbol (e.g., "USDC").
    pub symbol: String,
}

/// A priced payment challenge for a specific resource.
///
/// Immutable once built. The price is resolved at build time; two builds for
/// the same resource at different times may legitimately carry different
/// amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// The payment scheme (always `"exact"`).
    pub scheme: String,
    /// The network identifier (e.g., `"solana:mainnet"`).
    pub network: String,
    /// The required payment amount in token base units.
    pub max_amount_required: u64,
    /// Canonical path of the resource being paid for.
    pub resource: String,
    /// Human-readable description of the resource.
    pub description: String,
    /// The recipient account for the payment.
    pub pay_to: String,
    /// The token asset the payment must use.
    pub asset: AssetInfo,
    /// Maximum time in seconds the challenge remains satisfiable.
    pub max_timeout_seconds: u64,
}

/// Content-derived identity of a payment proof.
///
/// SHA-256 over the raw header value; used to key settlement attempts so a
/// proof is settled at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProofKey([u8; 32]);

impl ProofKey {
    /// Derives the key from raw proof bytes.
    #[must_use]
    pub fn from_raw(raw: &[u8]) -> Self {
        let digest = Sha256::digest(raw);
        Self(digest.into())
    }
}

impl fmt::Display for ProofKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// An opaque payment proof as carried in the request header.
///
/// Holds the raw header value untouched; [`PaymentProof::decode`] parses it
/// into a [`DecodedProof`]. The raw bytes also determine the proof's
/// [`ProofKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentProof {
    raw: Vec<u8>,
}

/// Intermediate JSON shape of a decoded proof header.
///
/// `payload` is defaulted so that an empty or missing payload can be
/// distinguished from malformed JSON.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProofJson {
    x402_version: u32,
    network: String,
    scheme: String,
    #[serde(default)]
    payload: String,
}

impl PaymentProof {
    /// Wraps a raw header value.
    #[must_use]
    pub fn new(raw: impl Into<Vec<u8>>) -> Self {
        Self { raw: raw.into() }
    }

    /// Returns the raw header value.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Returns the content-derived settlement key for this proof.
    #[must_use]
    pub fn key(&self) -> ProofKey {
        ProofKey::from_raw(&self.raw)
    }

    /// Decodes the header value into its JSON fields.
    ///
    /// # Errors
    ///
    /// Returns [`ProofFormatError`] when the value is not base64, carries no
    /// payload, or is not the expected JSON shape. Never panics on caller
    /// input.
    pub fn decode(&self) -> Result<DecodedProof, ProofFormatError> {
        let bytes = Base64Bytes::from(self.raw.as_slice())
            .decode()
            .map_err(|_| ProofFormatError::NotBase64)?;
        let parsed: RawProofJson =
            serde_json::from_slice(&bytes).map_err(|_| ProofFormatError::MalformedJson)?;
        if parsed.payload.trim().is_empty() {
            return Err(ProofFormatError::MissingPayload);
        }
        Ok(DecodedProof {
            x402_version: parsed.x402_version,
            network: parsed.network,
            scheme: parsed.scheme,
            payload: parsed.payload,
        })
    }
}

/// A parsed payment proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedProof {
    /// Protocol version the payer used.
    pub x402_version: u32,
    /// Network the payment transaction targets.
    pub network: String,
    /// The payment scheme (expected: `"exact"`).
    pub scheme: String,
    /// Base64-encoded signed transaction bytes.
    pub payload: String,
}

/// Machine-readable reason a payment proof was rejected.
///
/// Closed set; every local and remote rejection maps onto one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// The proof header could not be decoded at all.
    ProofFormatError,
    /// The payload did not deserialize to a transaction.
    DeserializeFailed,
    /// The transaction carries no (or an all-zero) signature.
    NotSigned,
    /// Simulation ran and the transaction failed.
    SimulationFailed,
    /// Simulation itself could not be performed.
    SimulationError,
    /// No recognizable value-transfer instruction present.
    NoTransferInstructionFound,
    /// The transfer does not pay the required recipient account.
    RecipientMismatch,
    /// The transfer amount is below the required amount.
    AmountMismatch,
}

impl InvalidReason {
    /// The wire string for this reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProofFormatError => "proof_format_error",
            Self::DeserializeFailed => "deserialize_failed",
            Self::NotSigned => "not_signed",
            Self::SimulationFailed => "simulation_failed",
            Self::SimulationError => "simulation_error",
            Self::NoTransferInstructionFound => "no_transfer_instruction_found",
            Self::RecipientMismatch => "recipient_mismatch",
            Self::AmountMismatch => "amount_mismatch",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of verifying a payment proof against requirements.
///
/// `invalid_reason` is present iff `is_valid` is false; the constructors
/// maintain the invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    /// Whether the proof satisfies the requirements.
    pub is_valid: bool,
    /// Rejection reason; absent for valid proofs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<InvalidReason>,
}

impl VerifyOutcome {
    /// A passing verification.
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            is_valid: true,
            invalid_reason: None,
        }
    }

    /// A failed verification with the given reason.
    #[must_use]
    pub const fn invalid(reason: InvalidReason) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason),
        }
    }
}

/// Machine-readable reason a settlement did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleErrorReason {
    /// The transaction was submitted and confirmed, but failed on-chain.
    TransactionFailedOnChain,
    /// An error prevented even knowing the outcome.
    SettlementException,
}

impl SettleErrorReason {
    /// The wire string for this reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TransactionFailedOnChain => "transaction_failed_on_chain",
            Self::SettlementException => "settlement_exception",
        }
    }
}

impl fmt::Display for SettleErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of settling an accepted payment.
///
/// `transaction` is non-empty only when the payment succeeded or when the
/// transaction was submitted but failed on-chain; a settlement that never
/// reached the network leaves it empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleOutcome {
    /// Whether the transfer completed.
    pub success: bool,
    /// Transaction reference (signature), when one exists.
    #[serde(rename = "transactionRef", default)]
    pub transaction: String,
    /// Failure reason; absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<SettleErrorReason>,
    /// Network the settlement targeted.
    pub network: String,
}

impl SettleOutcome {
    /// A completed settlement.
    #[must_use]
    pub fn settled(transaction: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction: transaction.into(),
            error_reason: None,
            network: network.into(),
        }
    }

    /// A submitted transaction that failed on-chain.
    #[must_use]
    pub fn failed_on_chain(transaction: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction: transaction.into(),
            error_reason: Some(SettleErrorReason::TransactionFailedOnChain),
            network: network.into(),
        }
    }

    /// A settlement whose outcome is unknown; nothing reached the chain.
    #[must_use]
    pub fn exception(network: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction: String::new(),
            error_reason: Some(SettleErrorReason::SettlementException),
            network: network.into(),
        }
    }
}
