//! HTTP surface for the tollgate payment gateway.
//!
//! - [`headers`] - Extraction of payment proofs from request headers
//! - [`facilitator`] - HTTP client for a remote payment facilitator
//! - [`layer`] - Tower middleware enforcing the challenge → verify →
//!   execute → settle sequence around protected routes

pub mod facilitator;
pub mod headers;
pub mod layer;

pub use facilitator::FacilitatorClient;
pub use layer::PaymentGateway;
