//! Solana verification and settlement path for the tollgate gateway.
//!
//! This is the local-fallback half of the gateway's remote-first strategy:
//! when the facilitator cannot answer, payment proofs are verified and
//! settled directly against a Solana RPC node. SPL Token `TransferChecked`
//! instructions (classic and Token-2022) are the recognized value-transfer
//! shape.
//!
//! All RPC interaction goes through the [`provider::SolanaProviderLike`]
//! trait so both paths are testable without a node.

pub mod error;
pub mod provider;
pub mod settle;
pub mod transfer;
pub mod verify;

#[cfg(test)]
pub(crate) mod testutil;

pub use settle::ChainSettler;
pub use verify::ChainVerifier;
