//! Transaction decoding and transfer-instruction scanning.
//!
//! A payment proof's payload is a base64-encoded, bincode-serialized
//! [`VersionedTransaction`]. The value-transfer shape recognized here is an
//! SPL Token `TransferChecked` (classic or Token-2022) moving the expected
//! mint.

use solana_message::compiled_instruction::CompiledInstruction;
use solana_pubkey::{Pubkey, pubkey};
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use tollgate::proto::Base64Bytes;

use crate::error::DecodeError;

/// Associated Token Account program.
pub const ATA_PROGRAM_ID: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Decodes a proof payload into a versioned transaction.
///
/// # Errors
///
/// Returns [`DecodeError`] when the payload is not base64 or the bytes are
/// not a serialized transaction.
pub fn decode_transaction(payload: &str) -> Result<VersionedTransaction, DecodeError> {
    let bytes = Base64Bytes::from(payload.as_bytes())
        .decode()
        .map_err(|_| DecodeError::Base64)?;
    bincode::deserialize(&bytes).map_err(|e| DecodeError::Deserialize(e.to_string()))
}

/// Whether every required signature is present and non-zero.
#[must_use]
pub fn is_fully_signed(transaction: &VersionedTransaction) -> bool {
    let required = transaction.message.header().num_required_signatures as usize;
    if required == 0 || transaction.signatures.len() < required {
        return false;
    }
    let unsigned = Signature::default();
    transaction.signatures[..required]
        .iter()
        .all(|sig| *sig != unsigned)
}

/// A `TransferChecked` instruction found in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTransfer {
    /// Transfer amount in token base units.
    pub amount: u64,
    /// Source token account.
    pub source: Pubkey,
    /// Token mint.
    pub mint: Pubkey,
    /// Destination token account.
    pub destination: Pubkey,
    /// Transfer authority (the payer).
    pub authority: Pubkey,
    /// Owning token program (classic or Token-2022).
    pub token_program: Pubkey,
}

/// Scans the transaction's instructions for a `TransferChecked` of
/// `expected_mint`.
///
/// Transfers of other mints are skipped rather than rejected, so a
/// transaction bundling unrelated instructions still verifies against the
/// one that pays.
#[must_use]
pub fn find_transfer(
    transaction: &VersionedTransaction,
    expected_mint: &Pubkey,
) -> Option<TokenTransfer> {
    let keys = transaction.message.static_account_keys();
    for instruction in transaction.message.instructions() {
        let program = *instruction.program_id(keys);
        let Some(amount) = transfer_checked_amount(&program, &instruction.data) else {
            continue;
        };
        let (Some(source), Some(mint), Some(destination), Some(authority)) = (
            resolved_account(instruction, keys, 0),
            resolved_account(instruction, keys, 1),
            resolved_account(instruction, keys, 2),
            resolved_account(instruction, keys, 3),
        ) else {
            continue;
        };
        if mint != *expected_mint {
            continue;
        }
        return Some(TokenTransfer {
            amount,
            source,
            mint,
            destination,
            authority,
            token_program: program,
        });
    }
    None
}

/// Derives the recipient's associated token account for the given mint.
#[must_use]
pub fn recipient_token_account(owner: &Pubkey, token_program: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_ID,
    )
    .0
}

/// Parses `data` as a `TransferChecked` of the given token program,
/// returning the amount.
fn transfer_checked_amount(program: &Pubkey, data: &[u8]) -> Option<u64> {
    if *program == spl_token::ID {
        match spl_token::instruction::TokenInstruction::unpack(data).ok()? {
            spl_token::instruction::TokenInstruction::TransferChecked { amount, .. } => {
                Some(amount)
            }
            _ => None,
        }
    } else if *program == spl_token_2022::ID {
        match spl_token_2022::instruction::TokenInstruction::unpack(data).ok()? {
            spl_token_2022::instruction::TokenInstruction::TransferChecked { amount, .. } => {
                Some(amount)
            }
            _ => None,
        }
    } else {
        None
    }
}

/// Resolves the instruction account at `position` to a pubkey.
fn resolved_account(
    instruction: &CompiledInstruction,
    keys: &[Pubkey],
    position: usize,
) -> Option<Pubkey> {
    let index = *instruction.accounts.get(position)? as usize;
    keys.get(index).copied()
}
