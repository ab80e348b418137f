//! Remote facilitator abstraction.
//!
//! A facilitator is a remote service that can build requirements, verify
//! proofs, and settle payments on the gateway's behalf. It is trusted when
//! it gives a definitive answer and treated as unavailable on transport
//! errors, 5xx responses, timeouts, or unparseable bodies — the distinction
//! is carried by [`RemoteVerdict`] so fallback decisions are exhaustive
//! matches rather than string inspection.

use crate::proto::{DecodedProof, PaymentRequirements, SettleOutcome, VerifyOutcome};

/// Outcome of a call to a remote facilitator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteVerdict<T> {
    /// The facilitator answered authoritatively.
    Definitive(T),
    /// The facilitator could not answer; the caller should fall back.
    Unavailable(String),
}

impl<T> RemoteVerdict<T> {
    /// Returns the definitive value, if any.
    pub fn into_definitive(self) -> Option<T> {
        match self {
            Self::Definitive(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }
}

/// A remote payment facilitator.
///
/// Implementations never error: unavailability is a normal, typed outcome.
#[async_trait::async_trait]
pub trait Facilitator: Send + Sync {
    /// Asks the facilitator to build payment requirements for a resource.
    async fn create_requirements(
        &self,
        price: u64,
        resource: &str,
        description: &str,
    ) -> RemoteVerdict<PaymentRequirements>;

    /// Asks the facilitator whether a proof satisfies the requirements.
    async fn verify(
        &self,
        proof: &DecodedProof,
        requirements: &PaymentRequirements,
    ) -> RemoteVerdict<VerifyOutcome>;

    /// Asks the facilitator to submit and confirm the payment.
    async fn settle(
        &self,
        proof: &DecodedProof,
        requirements: &PaymentRequirements,
    ) -> RemoteVerdict<SettleOutcome>;
}
