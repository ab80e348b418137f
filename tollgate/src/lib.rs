//! Core types for the tollgate payment gateway.
//!
//! This crate provides the foundational pieces used throughout the tollgate
//! ecosystem for fronting pay-per-call APIs with HTTP 402 payment challenges.
//! It is transport- and chain-agnostic: the HTTP surface lives in
//! `tollgate-http` and the Solana settlement path in `tollgate-svm`.
//!
//! # Overview
//!
//! A caller without proof of payment receives a priced challenge carried in a
//! 402 response. A caller that attaches a signed payment proof is verified
//! synchronously, served, and the payment is settled on-chain after the
//! response has been written.
//!
//! # Modules
//!
//! - [`config`] - Process-wide payment configuration (recipient, asset, network)
//! - [`facilitator`] - Remote facilitator abstraction and the definitive/unavailable verdict type
//! - [`gate`] - Traits wiring verification, challenges, and settlement hand-off
//! - [`limiter`] - Token-bucket admission control for scarce upstream resources
//! - [`proto`] - Wire format types, encoding utilities, and error reasons
//! - [`requirements`] - Construction of priced payment challenges

pub mod config;
pub mod facilitator;
pub mod gate;
pub mod limiter;
pub mod proto;
pub mod requirements;
