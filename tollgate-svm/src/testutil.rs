//! Shared fixtures for the verification and settlement tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use solana_hash::Hash;
use solana_instruction::{AccountMeta, Instruction};
use solana_keypair::Keypair;
use solana_message::{Message, VersionedMessage};
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;
use tollgate::proto::{
    AssetInfo, Base64Bytes, DecodedProof, EXACT_SCHEME, PaymentRequirements, X402_VERSION,
};

use crate::error::ProviderError;
use crate::provider::{Confirmation, SimulationVerdict, SolanaProviderLike};
use crate::transfer::recipient_token_account;

/// Keys for one payer/mint/recipient constellation.
pub struct PaymentScene {
    pub payer: Keypair,
    pub mint: Pubkey,
    pub recipient: Pubkey,
}

pub fn payment_scene() -> PaymentScene {
    PaymentScene {
        payer: Keypair::new(),
        mint: Pubkey::new_unique(),
        recipient: Pubkey::new_unique(),
    }
}

/// A signed transaction paying `amount` of the scene's mint to the scene's
/// recipient.
pub fn transfer_tx(scene: &PaymentScene, amount: u64) -> VersionedTransaction {
    transfer_tx_to(scene, &scene.recipient, amount)
}

/// A signed transaction paying `amount` to `recipient_owner`'s token account.
pub fn transfer_tx_to(
    scene: &PaymentScene,
    recipient_owner: &Pubkey,
    amount: u64,
) -> VersionedTransaction {
    let message = transfer_message(scene, recipient_owner, amount);
    VersionedTransaction::try_new(VersionedMessage::Legacy(message), &[&scene.payer]).unwrap()
}

/// Like [`transfer_tx`], but with the signature slot left zeroed.
pub fn unsigned_transfer_tx(scene: &PaymentScene, amount: u64) -> VersionedTransaction {
    let message = transfer_message(scene, &scene.recipient, amount);
    VersionedTransaction {
        signatures: vec![Signature::default()],
        message: VersionedMessage::Legacy(message),
    }
}

/// A signed transaction with no value-transfer instruction at all.
pub fn no_transfer_tx(scene: &PaymentScene) -> VersionedTransaction {
    let noop = Instruction {
        program_id: Pubkey::new_unique(),
        accounts: vec![AccountMeta::new_readonly(scene.payer.pubkey(), true)],
        data: vec![0xde, 0xad],
    };
    let message = Message::new_with_blockhash(&[noop], Some(&scene.payer.pubkey()), &Hash::default());
    VersionedTransaction::try_new(VersionedMessage::Legacy(message), &[&scene.payer]).unwrap()
}

fn transfer_message(scene: &PaymentScene, recipient_owner: &Pubkey, amount: u64) -> Message {
    let source = recipient_token_account(&scene.payer.pubkey(), &spl_token::ID, &scene.mint);
    let destination = recipient_token_account(recipient_owner, &spl_token::ID, &scene.mint);
    let transfer = spl_token::instruction::transfer_checked(
        &spl_token::ID,
        &source,
        &scene.mint,
        &destination,
        &scene.payer.pubkey(),
        &[],
        amount,
        6,
    )
    .unwrap();
    Message::new_with_blockhash(&[transfer], Some(&scene.payer.pubkey()), &Hash::default())
}

/// Serializes a transaction the way proofs carry it.
pub fn tx_payload(transaction: &VersionedTransaction) -> String {
    Base64Bytes::encode(bincode::serialize(transaction).unwrap()).to_string()
}

pub fn decoded_proof(payload: &str) -> DecodedProof {
    DecodedProof {
        x402_version: X402_VERSION,
        network: "solana:devnet".to_owned(),
        scheme: EXACT_SCHEME.to_owned(),
        payload: payload.to_owned(),
    }
}

pub fn requirements_for(scene: &PaymentScene, amount: u64) -> PaymentRequirements {
    PaymentRequirements {
        scheme: EXACT_SCHEME.to_owned(),
        network: "solana:devnet".to_owned(),
        max_amount_required: amount,
        resource: "/data/address/abc".to_owned(),
        description: "address data".to_owned(),
        pay_to: scene.recipient.to_string(),
        asset: AssetInfo {
            mint: scene.mint.to_string(),
            decimals: 6,
            symbol: "USDC".to_owned(),
        },
        max_timeout_seconds: 60,
    }
}

/// Scriptable provider double.
///
/// Balance reads pop from `balances` front-to-back; an exhausted queue reads
/// as an existing, empty account.
pub struct MockProvider {
    pub simulation: Result<SimulationVerdict, ProviderError>,
    pub send: Result<Signature, ProviderError>,
    pub confirmation: Result<Confirmation, ProviderError>,
    pub balances: Mutex<VecDeque<Option<u64>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            simulation: Ok(SimulationVerdict::Ok),
            send: Ok(Signature::from([7u8; 64])),
            confirmation: Ok(Confirmation { err: None }),
            balances: Mutex::new(VecDeque::new()),
        }
    }
}

impl MockProvider {
    pub fn with_balances(mut self, balances: Vec<Option<u64>>) -> Self {
        self.balances = Mutex::new(balances.into());
        self
    }
}

#[async_trait::async_trait]
impl SolanaProviderLike for MockProvider {
    async fn simulate(
        &self,
        _transaction: &VersionedTransaction,
    ) -> Result<SimulationVerdict, ProviderError> {
        self.simulation.clone()
    }

    async fn send_raw(
        &self,
        _transaction: &VersionedTransaction,
    ) -> Result<Signature, ProviderError> {
        self.send.clone()
    }

    async fn confirm(&self, _signature: &Signature) -> Result<Confirmation, ProviderError> {
        self.confirmation.clone()
    }

    async fn token_account_balance(
        &self,
        _account: &Pubkey,
    ) -> Result<Option<u64>, ProviderError> {
        Ok(self.balances.lock().unwrap().pop_front().unwrap_or(Some(0)))
    }
}
