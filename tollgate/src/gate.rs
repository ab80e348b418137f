//! Traits and hand-off types wiring the payment gate together.
//!
//! The HTTP middleware is generic over these traits so the verification
//! strategy, challenge construction, and settlement transport can each be
//! swapped or mocked independently.

use tokio::sync::mpsc;

use crate::proto::{
    DecodedProof, PaymentProof, PaymentRequirements, ProofKey, SettleOutcome, VerifyOutcome,
};
use crate::requirements::ConfigurationError;

/// Verifies payment proofs.
///
/// Implementations never error: every failure mode maps to a typed invalid
/// outcome, so malformed caller input cannot crash a request.
#[async_trait::async_trait]
pub trait Verify: Send + Sync {
    /// Decides whether `proof` satisfies `requirements`.
    async fn verify(
        &self,
        proof: &PaymentProof,
        requirements: &PaymentRequirements,
    ) -> VerifyOutcome;
}

/// Local (chain-direct) verification, operating on an already-decoded proof.
#[async_trait::async_trait]
pub trait LocalVerify: Send + Sync {
    /// Verifies the decoded proof directly against the chain.
    async fn verify_local(
        &self,
        proof: &DecodedProof,
        requirements: &PaymentRequirements,
    ) -> VerifyOutcome;
}

/// Local (chain-direct) settlement, operating on an already-decoded proof.
#[async_trait::async_trait]
pub trait LocalSettle: Send + Sync {
    /// Submits and confirms the decoded proof's transaction.
    async fn settle_local(
        &self,
        proof: &DecodedProof,
        requirements: &PaymentRequirements,
    ) -> SettleOutcome;
}

/// Builds the payment challenge for an unpaid request.
#[async_trait::async_trait]
pub trait Challenge: Send + Sync {
    /// Produces requirements for `resource` priced at `price` base units.
    async fn challenge(
        &self,
        price: u64,
        resource: &str,
        description: &str,
    ) -> Result<PaymentRequirements, ConfigurationError>;
}

/// A settlement request handed off after the response has been written.
#[derive(Debug, Clone)]
pub struct SettlementJob {
    /// Idempotency key of the proof being settled.
    pub key: ProofKey,
    /// The accepted proof.
    pub proof: PaymentProof,
    /// The requirements the proof was verified against.
    pub requirements: PaymentRequirements,
}

/// Sending side of the settlement queue.
///
/// Submission is non-blocking; a full queue drops the job with a diagnostic
/// event rather than delaying the response path.
#[derive(Debug, Clone)]
pub struct SettlementHandle {
    jobs: mpsc::Sender<SettlementJob>,
}

impl SettlementHandle {
    /// Creates a bounded settlement queue, returning the submission handle
    /// and the receiving end for a worker to consume.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SettlementJob>) {
        let (jobs, rx) = mpsc::channel(capacity.max(1));
        (Self { jobs }, rx)
    }

    /// Enqueues a settlement job.
    ///
    /// Returns `false` if the queue is full or the worker is gone; the drop
    /// is logged with the proof key so the payment can be reconciled
    /// manually.
    pub fn submit(&self, job: SettlementJob) -> bool {
        let key = job.key;
        match self.jobs.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(proof = %key, "settlement queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!(proof = %key, "settlement worker gone, dropping job");
                false
            }
        }
    }
}
