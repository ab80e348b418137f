//! Local payment verification against a Solana node.

use solana_pubkey::Pubkey;
use tollgate::gate::LocalVerify;
use tollgate::proto::{DecodedProof, InvalidReason, PaymentRequirements, VerifyOutcome};

use crate::provider::{SimulationVerdict, SolanaProviderLike};
use crate::transfer::{decode_transaction, find_transfer, is_fully_signed, recipient_token_account};

/// Verifies proofs directly against the chain when the facilitator cannot.
///
/// Every failure path yields a typed invalid outcome; ambiguity (an
/// unreachable node, a simulation that cannot run) fails closed rather than
/// ever producing a valid verdict.
#[derive(Debug)]
pub struct ChainVerifier<P> {
    provider: P,
}

impl<P> ChainVerifier<P> {
    /// Creates a verifier over the given provider.
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl<P> LocalVerify for ChainVerifier<P>
where
    P: SolanaProviderLike,
{
    async fn verify_local(
        &self,
        proof: &DecodedProof,
        requirements: &PaymentRequirements,
    ) -> VerifyOutcome {
        let transaction = match decode_transaction(&proof.payload) {
            Ok(tx) => tx,
            Err(err) => {
                tracing::debug!(%err, "proof payload does not decode to a transaction");
                return VerifyOutcome::invalid(InvalidReason::DeserializeFailed);
            }
        };

        if !is_fully_signed(&transaction) {
            return VerifyOutcome::invalid(InvalidReason::NotSigned);
        }

        match self.provider.simulate(&transaction).await {
            Ok(SimulationVerdict::Ok) => {}
            Ok(SimulationVerdict::Failed(err)) => {
                tracing::debug!(%err, "payment transaction fails simulation");
                return VerifyOutcome::invalid(InvalidReason::SimulationFailed);
            }
            Err(err) => {
                tracing::warn!(%err, "could not simulate payment transaction");
                return VerifyOutcome::invalid(InvalidReason::SimulationError);
            }
        }

        let Ok(mint) = requirements.asset.mint.parse::<Pubkey>() else {
            tracing::error!(mint = %requirements.asset.mint, "configured mint is not a pubkey");
            return VerifyOutcome::invalid(InvalidReason::NoTransferInstructionFound);
        };
        let Some(transfer) = find_transfer(&transaction, &mint) else {
            return VerifyOutcome::invalid(InvalidReason::NoTransferInstructionFound);
        };

        let Ok(pay_to) = requirements.pay_to.parse::<Pubkey>() else {
            tracing::error!(pay_to = %requirements.pay_to, "configured recipient is not a pubkey");
            return VerifyOutcome::invalid(InvalidReason::RecipientMismatch);
        };
        let expected = recipient_token_account(&pay_to, &transfer.token_program, &mint);
        if transfer.destination != expected {
            return VerifyOutcome::invalid(InvalidReason::RecipientMismatch);
        }
        if transfer.amount < requirements.max_amount_required {
            return VerifyOutcome::invalid(InvalidReason::AmountMismatch);
        }

        VerifyOutcome::valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::testutil::{
        MockProvider, decoded_proof, payment_scene, requirements_for, transfer_tx, tx_payload,
        unsigned_transfer_tx,
    };

    #[tokio::test]
    async fn accepts_exact_payment() {
        let scene = payment_scene();
        let tx = transfer_tx(&scene, 10_000);
        let verifier = ChainVerifier::new(MockProvider::default());
        let outcome = verifier
            .verify_local(&decoded_proof(&tx_payload(&tx)), &requirements_for(&scene, 10_000))
            .await;
        assert!(outcome.is_valid, "{:?}", outcome.invalid_reason);
    }

    #[tokio::test]
    async fn accepts_overpayment() {
        let scene = payment_scene();
        let tx = transfer_tx(&scene, 15_000);
        let verifier = ChainVerifier::new(MockProvider::default());
        let outcome = verifier
            .verify_local(&decoded_proof(&tx_payload(&tx)), &requirements_for(&scene, 10_000))
            .await;
        assert!(outcome.is_valid);
    }

    #[tokio::test]
    async fn rejects_garbage_payload() {
        let scene = payment_scene();
        let verifier = ChainVerifier::new(MockProvider::default());
        let outcome = verifier
            .verify_local(&decoded_proof("AAAA"), &requirements_for(&scene, 10_000))
            .await;
        assert_eq!(outcome.invalid_reason, Some(InvalidReason::DeserializeFailed));
    }

    #[tokio::test]
    async fn rejects_unsigned_transaction() {
        let scene = payment_scene();
        let tx = unsigned_transfer_tx(&scene, 10_000);
        let verifier = ChainVerifier::new(MockProvider::default());
        let outcome = verifier
            .verify_local(&decoded_proof(&tx_payload(&tx)), &requirements_for(&scene, 10_000))
            .await;
        assert_eq!(outcome.invalid_reason, Some(InvalidReason::NotSigned));
    }

    #[tokio::test]
    async fn rejects_failing_simulation() {
        let scene = payment_scene();
        let tx = transfer_tx(&scene, 10_000);
        let provider = MockProvider {
            simulation: Ok(crate::provider::SimulationVerdict::Failed(
                "InsufficientFundsForFee".to_owned(),
            )),
            ..MockProvider::default()
        };
        let outcome = ChainVerifier::new(provider)
            .verify_local(&decoded_proof(&tx_payload(&tx)), &requirements_for(&scene, 10_000))
            .await;
        assert_eq!(outcome.invalid_reason, Some(InvalidReason::SimulationFailed));
    }

    #[tokio::test]
    async fn fails_closed_when_simulation_unavailable() {
        let scene = payment_scene();
        let tx = transfer_tx(&scene, 10_000);
        let provider = MockProvider {
            simulation: Err(ProviderError::Rpc("connection refused".to_owned())),
            ..MockProvider::default()
        };
        let outcome = ChainVerifier::new(provider)
            .verify_local(&decoded_proof(&tx_payload(&tx)), &requirements_for(&scene, 10_000))
            .await;
        assert_eq!(outcome.invalid_reason, Some(InvalidReason::SimulationError));
    }

    #[tokio::test]
    async fn rejects_transaction_without_transfer() {
        let scene = payment_scene();
        let tx = crate::testutil::no_transfer_tx(&scene);
        let outcome = ChainVerifier::new(MockProvider::default())
            .verify_local(&decoded_proof(&tx_payload(&tx)), &requirements_for(&scene, 10_000))
            .await;
        assert_eq!(
            outcome.invalid_reason,
            Some(InvalidReason::NoTransferInstructionFound)
        );
    }

    #[tokio::test]
    async fn rejects_transfer_to_other_recipient() {
        let scene = payment_scene();
        let stranger = crate::testutil::payment_scene();
        // Transfer pays the stranger's token account, not the configured one.
        let tx = crate::testutil::transfer_tx_to(&scene, &stranger.recipient, 10_000);
        let outcome = ChainVerifier::new(MockProvider::default())
            .verify_local(&decoded_proof(&tx_payload(&tx)), &requirements_for(&scene, 10_000))
            .await;
        assert_eq!(outcome.invalid_reason, Some(InvalidReason::RecipientMismatch));
    }

    #[tokio::test]
    async fn rejects_underpayment() {
        let scene = payment_scene();
        let tx = transfer_tx(&scene, 9_999);
        let outcome = ChainVerifier::new(MockProvider::default())
            .verify_local(&decoded_proof(&tx_payload(&tx)), &requirements_for(&scene, 10_000))
            .await;
        assert_eq!(outcome.invalid_reason, Some(InvalidReason::AmountMismatch));
    }

    #[tokio::test]
    async fn verdict_is_deterministic() {
        let scene = payment_scene();
        let tx = transfer_tx(&scene, 10_000);
        let verifier = ChainVerifier::new(MockProvider::default());
        let proof = decoded_proof(&tx_payload(&tx));
        let reqs = requirements_for(&scene, 10_000);
        let first = verifier.verify_local(&proof, &reqs).await;
        let second = verifier.verify_local(&proof, &reqs).await;
        assert_eq!(first, second);
    }
}
