//! RPC node abstraction for the Solana payment path.
//!
//! [`SolanaProviderLike`] is the seam between payment logic and the node:
//! verification needs simulation, settlement needs submission, confirmation
//! polling, and token-account balance reads. [`RpcProvider`] is the real
//! implementation over the nonblocking [`solana_client`] RPC client.

use std::time::Duration;

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSimulateTransactionConfig;
use solana_commitment_config::CommitmentConfig;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use spl_token_2022::extension::StateWithExtensions;
use spl_token_2022::state::Account as TokenAccount;
use tokio::time::Instant;

use crate::error::ProviderError;

/// Result of simulating a transaction against a read node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationVerdict {
    /// The transaction would execute successfully.
    Ok,
    /// The transaction would fail, with the node's error rendering.
    Failed(String),
}

/// A confirmed transaction's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// The on-chain error, if the transaction landed but failed.
    pub err: Option<String>,
}

/// RPC operations the payment path depends on.
#[async_trait::async_trait]
pub trait SolanaProviderLike: Send + Sync {
    /// Simulates the transaction without submitting it.
    async fn simulate(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<SimulationVerdict, ProviderError>;

    /// Submits the raw signed transaction.
    async fn send_raw(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, ProviderError>;

    /// Waits until the transaction is confirmed and reports its status.
    async fn confirm(&self, signature: &Signature) -> Result<Confirmation, ProviderError>;

    /// Reads the balance of a token account, `None` if the account does not
    /// exist.
    async fn token_account_balance(&self, account: &Pubkey) -> Result<Option<u64>, ProviderError>;
}

/// Provider backed by a real Solana RPC endpoint.
pub struct RpcProvider {
    client: RpcClient,
    commitment: CommitmentConfig,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl std::fmt::Debug for RpcProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcProvider")
            .field("commitment", &self.commitment)
            .field("confirm_timeout", &self.confirm_timeout)
            .finish_non_exhaustive()
    }
}

impl RpcProvider {
    /// Creates a provider for the given RPC URL with confirmed commitment.
    #[must_use]
    pub fn new(rpc_url: impl Into<String>, confirm_timeout: Duration) -> Self {
        Self {
            client: RpcClient::new(rpc_url.into()),
            commitment: CommitmentConfig::confirmed(),
            confirm_timeout,
            poll_interval: Duration::from_millis(500),
        }
    }
}

#[async_trait::async_trait]
impl SolanaProviderLike for RpcProvider {
    async fn simulate(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<SimulationVerdict, ProviderError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(self.commitment),
            ..Default::default()
        };
        let response = self
            .client
            .simulate_transaction_with_config(transaction, config)
            .await
            .map_err(|e| ProviderError::Rpc(e.to_string()))?;
        Ok(match response.value.err {
            None => SimulationVerdict::Ok,
            Some(err) => SimulationVerdict::Failed(format!("{err:?}")),
        })
    }

    async fn send_raw(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, ProviderError> {
        self.client
            .send_transaction(transaction)
            .await
            .map_err(|e| ProviderError::Rpc(e.to_string()))
    }

    async fn confirm(&self, signature: &Signature) -> Result<Confirmation, ProviderError> {
        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            let status = self
                .client
                .get_signature_status_with_commitment(signature, self.commitment)
                .await
                .map_err(|e| ProviderError::Rpc(e.to_string()))?;
            if let Some(result) = status {
                return Ok(Confirmation {
                    err: result.err().map(|err| format!("{err:?}")),
                });
            }
            if Instant::now() >= deadline {
                return Err(ProviderError::ConfirmTimeout);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn token_account_balance(&self, account: &Pubkey) -> Result<Option<u64>, ProviderError> {
        let response = self
            .client
            .get_account_with_commitment(account, self.commitment)
            .await
            .map_err(|e| ProviderError::Rpc(e.to_string()))?;
        let Some(account) = response.value else {
            return Ok(None);
        };
        // Token-2022 state parsing handles classic token accounts as well.
        let state = StateWithExtensions::<TokenAccount>::unpack(&account.data)
            .map_err(|e| ProviderError::Rpc(format!("not a token account: {e}")))?;
        Ok(Some(state.base.amount))
    }
}
