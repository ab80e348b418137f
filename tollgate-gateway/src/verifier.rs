//! Remote-first payment verification with local fallback.

use std::sync::Arc;
use std::time::Duration;

use tollgate::facilitator::{Facilitator, RemoteVerdict};
use tollgate::gate::{LocalVerify, Verify};
use tollgate::proto::{InvalidReason, PaymentProof, PaymentRequirements, VerifyOutcome};

use crate::settler::SettlementLedger;

/// Verifies proofs through the facilitator, falling back to the chain when
/// the facilitator cannot answer.
///
/// Valid outcomes mark the proof as verified in the settlement ledger, which
/// is what later entitles it to settlement. Every failure path — format
/// errors, facilitator rejections, local rejections, timeouts — yields a
/// typed invalid outcome; the caller is never handed an error.
#[derive(Debug)]
pub struct GatewayVerifier<F, L> {
    facilitator: Arc<F>,
    local: Arc<L>,
    ledger: Arc<SettlementLedger>,
    local_timeout: Duration,
}

impl<F, L> GatewayVerifier<F, L> {
    /// Wires the verifier from its collaborators.
    pub fn new(
        facilitator: Arc<F>,
        local: Arc<L>,
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

#[async_trait::async_trait]
impl<F, L> Verify for GatewayVerifier<F, L>
where
    F: Facilitator,
    L: LocalVerify,
{
    async fn verify(
        &self,
        proof: &PaymentProof,
        requirements: &PaymentRequirements,
    ) -> VerifyOutcome {
        let decoded = match proof.decode() {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::debug!(%err, proof = %proof.key(), "unusable payment proof");
                return VerifyOutcome::invalid(err.into());
            }
        };

        let outcome = match self.facilitator.verify(&decoded, requirements).await {
            RemoteVerdict::Definitive(outcome) => outcome,
            RemoteVerdict::Unavailable(why) => {
                tracing::info!(%why, "facilitator unavailable, verifying locally");
                match tokio::time::timeout(
                    self.local_timeout,
                    self.local.verify_local(&decoded, requirements),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!(proof = %proof.key(), "local verification timed out");
                        VerifyOutcome::invalid(InvalidReason::SimulationError)
                    }
                }
            }
        };

        if outcome.is_valid {
            self.ledger.mark_verified(proof.key());
        }
        outcome
    }
}
