//! Local payment settlement against a Solana node.

use tollgate::gate::LocalSettle;
use tollgate::proto::{DecodedProof, PaymentRequirements, SettleOutcome};

use crate::provider::SolanaProviderLike;
use crate::transfer::{TokenTransfer, decode_transaction, find_transfer};

/// Submits and confirms accepted payments when the facilitator cannot.
///
/// This is the only component that moves value. Callers are expected to
/// gate invocations through the settlement ledger so a proof is settled at
/// most once; the settler itself is stateless.
#[derive(Debug)]
pub struct ChainSettler<P> {
    provider: P,
}

impl<P> ChainSettler<P> {
    /// Creates a settler over the given provider.
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl<P> LocalSettle for ChainSettler<P>
where
    P: SolanaProviderLike,
{
    async fn settle_local(
        &self,
        proof: &DecodedProof,
        requirements: &PaymentRequirements,
    ) -> SettleOutcome {
        let network = requirements.network.clone();

        let transaction = match decode_transaction(&proof.payload) {
            Ok(tx) => tx,
            Err(err) => {
                tracing::error!(%err, "accepted proof no longer decodes");
                return SettleOutcome::exception(network);
            }
        };

        // Locate the paying transfer so the destination balance can be
        // sanity-checked around submission. A verified proof always has one;
        // if it cannot be found the check is skipped, not the settlement.
        let transfer: Option<TokenTransfer> = requirements
            .asset
            .mint
            .parse()
            .ok()
            .and_then(|mint| find_transfer(&transaction, &mint));
        let pre_balance = match &transfer {
            Some(t) => self
                .provider
                .token_account_balance(&t.destination)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        let signature = match self.provider.send_raw(&transaction).await {
            Ok(sig) => sig,
            Err(err) => {
                tracing::error!(%err, "payment submission failed");
                return SettleOutcome::exception(network);
            }
        };

        let confirmation = match self.provider.confirm(&signature).await {
            Ok(c) => c,
            Err(err) => {
                tracing::error!(%err, tx = %signature, "payment confirmation outcome unknown");
                return SettleOutcome::exception(network);
            }
        };
        if let Some(err) = confirmation.err {
            tracing::error!(%err, tx = %signature, "payment transaction failed on-chain");
            return SettleOutcome::failed_on_chain(signature.to_string(), network);
        }

        if let (Some(transfer), Some(pre)) = (transfer, pre_balance) {
            match self.provider.token_account_balance(&transfer.destination).await {
                Ok(Some(post)) if post.saturating_sub(pre) >= transfer.amount => {}
                Ok(_) => {
                    tracing::error!(tx = %signature, "confirmed payment moved no funds");
                    return SettleOutcome::failed_on_chain(signature.to_string(), network);
                }
                Err(err) => {
                    tracing::warn!(%err, tx = %signature, "post-settlement balance inspection failed");
                }
            }
        }

        SettleOutcome::settled(signature.to_string(), network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::Confirmation;
    use crate::testutil::{
        MockProvider, decoded_proof, payment_scene, requirements_for, transfer_tx, tx_payload,
    };
    use tollgate::proto::SettleErrorReason;

    #[tokio::test]
    async fn settles_and_reports_signature() {
        let scene = payment_scene();
        let tx = transfer_tx(&scene, 10_000);
        let provider = MockProvider::default().with_balances(vec![Some(0), Some(10_000)]);
        let outcome = ChainSettler::new(provider)
            .settle_local(&decoded_proof(&tx_payload(&tx)), &requirements_for(&scene, 10_000))
            .await;
        assert!(outcome.success);
        assert!(!outcome.transaction.is_empty());
        assert_eq!(outcome.error_reason, None);
        assert_eq!(outcome.network, "solana:devnet");
    }

    #[tokio::test]
    async fn submission_failure_is_an_exception_without_reference() {
        let scene = payment_scene();
        let tx = transfer_tx(&scene, 10_000);
        let provider = MockProvider {
            send: Err(ProviderError::Rpc("blockhash not found".to_owned())),
            ..MockProvider::default()
        };
        let outcome = ChainSettler::new(provider)
            .settle_local(&decoded_proof(&tx_payload(&tx)), &requirements_for(&scene, 10_000))
            .await;
        assert!(!outcome.success);
        assert!(outcome.transaction.is_empty());
        assert_eq!(
            outcome.error_reason,
            Some(SettleErrorReason::SettlementException)
        );
    }

    #[tokio::test]
    async fn on_chain_failure_keeps_the_reference() {
        let scene = payment_scene();
        let tx = transfer_tx(&scene, 10_000);
        let provider = MockProvider {
            confirmation: Ok(Confirmation {
                err: Some("InstructionError(0, Custom(1))".to_owned()),
            }),
            ..MockProvider::default()
        };
        let outcome = ChainSettler::new(provider)
            .settle_local(&decoded_proof(&tx_payload(&tx)), &requirements_for(&scene, 10_000))
            .await;
        assert!(!outcome.success);
        assert!(!outcome.transaction.is_empty());
        assert_eq!(
            outcome.error_reason,
            Some(SettleErrorReason::TransactionFailedOnChain)
        );
    }

    #[tokio::test]
    async fn confirmation_timeout_is_an_exception() {
        let scene = payment_scene();
        let tx = transfer_tx(&scene, 10_000);
        let provider = MockProvider {
            confirmation: Err(ProviderError::ConfirmTimeout),
            ..MockProvider::default()
        };
        let outcome = ChainSettler::new(provider)
            .settle_local(&decoded_proof(&tx_payload(&tx)), &requirements_for(&scene, 10_000))
            .await;
        assert!(!outcome.success);
        assert!(outcome.transaction.is_empty());
        assert_eq!(
            outcome.error_reason,
            Some(SettleErrorReason::SettlementException)
        );
    }

    #[tokio::test]
    async fn unmoved_balance_fails_the_settlement() {
        let scene = payment_scene();
        let tx = transfer_tx(&scene, 10_000);
        let provider = MockProvider::default().with_balances(vec![Some(500), Some(500)]);
        let outcome = ChainSettler::new(provider)
            .settle_local(&decoded_proof(&tx_payload(&tx)), &requirements_for(&scene, 10_000))
            .await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.error_reason,
            Some(SettleErrorReason::TransactionFailedOnChain)
        );
    }
}
