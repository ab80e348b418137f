//! Settlement execution, guarded by an in-memory attempt ledger.
//!
//! Settlement is the only operation that moves value, so it is keyed by the
//! proof's content hash and allowed at most once: a proof must first have
//! been marked verified, and any later attempt for the same key no-ops.
//! The ledger is process-local; failures are logged with enough detail
//! (proof key, resource, amount) for manual reconciliation, and nothing
//! retries automatically.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tollgate::facilitator::{Facilitator, RemoteVerdict};
use tollgate::gate::{LocalSettle, SettlementJob};
use tollgate::proto::{ProofKey, SettleOutcome};

/// Where a proof stands in its settlement lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementState {
    /// Verification succeeded; settlement is permitted.
    Verified,
    /// A settlement attempt is running.
    InFlight,
    /// Settled; the transaction reference is kept for reconciliation.
    Settled(String),
    /// The one permitted attempt failed; manual reconciliation required.
    Failed,
}

/// Rejection of a settlement attempt before anything reaches the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SettlementGuard {
    /// The proof never passed verification.
    #[error("proof has not been verified")]
    NotVerified,
    /// The proof already has a running or finished attempt.
    #[error("proof settlement already attempted")]
    AlreadyAttempted,
}

/// In-memory ledger of settlement attempts keyed by proof hash.
#[derive(Debug, Default)]
pub struct SettlementLedger {
    entries: DashMap<ProofKey, SettlementState>,
}

impl SettlementLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a proof as verified, making it eligible for one settlement.
    ///
    /// Re-verification of an already-tracked proof does not reset its
    /// state.
    pub fn mark_verified(&self, key: ProofKey) {
        self.entries.entry(key).or_insert(SettlementState::Verified);
    }

    /// Claims the single settlement attempt for a proof.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementGuard`] if the proof was never verified or was
    /// already claimed.
    pub fn begin(&self, key: ProofKey) -> Result<(), SettlementGuard> {
        let Some(mut entry) = self.entries.get_mut(&key) else {
            return Err(SettlementGuard::NotVerified);
        };
        match *entry {
            SettlementState::Verified => {
                *entry = SettlementState::InFlight;
                Ok(())
            }
            SettlementState::InFlight
            | SettlementState::Settled(_)
            | SettlementState::Failed => Err(SettlementGuard::AlreadyAttempted),
        }
    }

    /// Records the outcome of a claimed attempt.
    pub fn record(&self, key: ProofKey, outcome: &SettleOutcome) {
        let state = if outcome.success {
            SettlementState::Settled(outcome.transaction.clone())
        } else {
            SettlementState::Failed
        };
        self.entries.insert(key, state);
    }

    /// Returns the tracked state of a proof, if any.
    #[must_use]
    pub fn state(&self, key: &ProofKey) -> Option<SettlementState> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }
}

/// Settles accepted payments, remote-first with local fallback.
#[derive(Debug)]
pub struct GatewaySettler<F, S> {
    facilitator: Arc<F>,
    local: Arc<S>,
    ledger: Arc<SettlementLedger>,
    local_timeout: Duration,
}

impl<F, S> GatewaySettler<F, S> {
    /// Wires the settler from its collaborators.
    pub fn new(
        facilitator: Arc<F>,
        local: Arc<S>,
        ledger: Arc<SettlementLedger>,
        local_timeout: Duration,
    ) -> Self {
        Self {
            facilitator,
            local,
            ledger,
            local_timeout,
        }
    }
}

impl<F, S> GatewaySettler<F, S>
where
    F: Facilitator,
    S: LocalSettle,
{
    /// Executes the settlement for a verified proof.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementGuard`] without touching the chain when the
    /// proof is unverified or already attempted.
    pub async fn settle(&self, job: &SettlementJob) -> Result<SettleOutcome, SettlementGuard> {
        self.ledger.begin(job.key)?;
        let network = job.requirements.network.clone();

        let decoded = match job.proof.decode() {
            Ok(decoded) => decoded,
            Err(err) => {
                // A verified proof decoded once already; this is corruption,
                // not caller error.
                tracing::error!(%err, proof = %job.key, "verified proof no longer decodes");
                let outcome = SettleOutcome::exception(network);
                self.ledger.record(job.key, &outcome);
                return Ok(outcome);
            }
        };

        let outcome = match self.facilitator.settle(&decoded, &job.requirements).await {
            RemoteVerdict::Definitive(outcome) => outcome,
            RemoteVerdict::Unavailable(why) => {
                tracing::info!(%why, "facilitator unavailable, settling locally");
                match tokio::time::timeout(
                    self.local_timeout,
                    self.local.settle_local(&decoded, &job.requirements),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::error!(proof = %job.key, "local settlement timed out");
                        SettleOutcome::exception(network)
                    }
                }
            }
        };

        self.ledger.record(job.key, &outcome);
        if outcome.success {
            tracing::info!(
                proof = %job.key,
                tx = %outcome.transaction,
                resource = %job.requirements.resource,
                amount = job.requirements.max_amount_required,
                "payment settled"
            );
        } else {
            tracing::error!(
                proof = %job.key,
                tx = %outcome.transaction,
                resource = %job.requirements.resource,
                amount = job.requirements.max_amount_required,
                reason = ?outcome.error_reason,
                "settlement failed, manual reconciliation required"
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockFacilitator, MockLocalSettle, job, proof};

    fn settler(
        facilitator: MockFacilitator,
        local: MockLocalSettle,
        ledger: Arc<SettlementLedger>,
    ) -> GatewaySettler<MockFacilitator, MockLocalSettle> {
        GatewaySettler::new(
            Arc::new(facilitator),
            Arc::new(local),
            ledger,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn unverified_proof_is_rejected() {
        let ledger = Arc::new(SettlementLedger::new());
        let settler = settler(
            MockFacilitator::settling(RemoteVerdict::Definitive(SettleOutcome::settled(
                "5Sig",
                "solana:devnet",
            ))),
            MockLocalSettle::settled(),
            Arc::clone(&ledger),
        );

        let job = job(b"never-verified");
        assert_eq!(
            settler.settle(&job).await.unwrap_err(),
            SettlementGuard::NotVerified
        );
        assert_eq!(settler.facilitator.settle_calls(), 0);
        assert_eq!(settler.local.calls(), 0);
    }

    #[tokio::test]
    async fn verified_proof_settles_exactly_once() {
        let ledger = Arc::new(SettlementLedger::new());
        let settler = settler(
            MockFacilitator::settling(RemoteVerdict::Definitive(SettleOutcome::settled(
                "5Sig",
                "solana:devnet",
            ))),
            MockLocalSettle::settled(),
            Arc::clone(&ledger),
        );

        let job = job(b"verified-once");
        ledger.mark_verified(job.key);

        let outcome = settler.settle(&job).await.unwrap();
        assert!(outcome.success);
        assert_eq!(
            ledger.state(&job.key),
            Some(SettlementState::Settled("5Sig".to_owned()))
        );

        // Second attempt for the same proof no-ops.
        assert_eq!(
            settler.settle(&job).await.unwrap_err(),
            SettlementGuard::AlreadyAttempted
        );
        assert_eq!(settler.facilitator.settle_calls(), 1);
    }

    #[tokio::test]
    async fn unavailable_facilitator_settles_locally() {
        let ledger = Arc::new(SettlementLedger::new());
        let settler = settler(
            MockFacilitator::settling(RemoteVerdict::Unavailable("503".to_owned())),
            MockLocalSettle::settled(),
            Arc::clone(&ledger),
        );

        let job = job(b"local-settled");
        ledger.mark_verified(job.key);

        let outcome = settler.settle(&job).await.unwrap();
        assert!(outcome.success);
        assert_eq!(settler.local.calls(), 1);
    }

    #[tokio::test]
    async fn failed_settlement_is_recorded_and_not_retried() {
        let ledger = Arc::new(SettlementLedger::new());
        let settler = settler(
            MockFacilitator::settling(RemoteVerdict::Definitive(SettleOutcome::failed_on_chain(
                "5Sig",
                "solana:devnet",
            ))),
            MockLocalSettle::settled(),
            Arc::clone(&ledger),
        );

        let job = job(b"failed-on-chain");
        ledger.mark_verified(job.key);

        let outcome = settler.settle(&job).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(ledger.state(&job.key), Some(SettlementState::Failed));
        assert_eq!(
            settler.settle(&job).await.unwrap_err(),
            SettlementGuard::AlreadyAttempted
        );
    }

    #[tokio::test]
    async fn reverification_does_not_reopen_a_settled_proof() {
        let ledger = Arc::new(SettlementLedger::new());
        let key = proof(b"re-verified").key();
        ledger.mark_verified(key);
        ledger.record(
            key,
            &SettleOutcome::settled("5Sig", "solana:devnet"),
        );
        ledger.mark_verified(key);
        assert_eq!(
            ledger.state(&key),
            Some(SettlementState::Settled("5Sig".to_owned()))
        );
        assert_eq!(ledger.begin(key), Err(SettlementGuard::AlreadyAttempted));
    }
}
