//! Shared doubles and fixtures for the gateway tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tollgate::config::PaymentConfig;
use tollgate::facilitator::{Facilitator, RemoteVerdict};
use tollgate::gate::{LocalSettle, LocalVerify, SettlementJob};
use tollgate::proto::{
    AssetInfo, Base64Bytes, DecodedProof, EXACT_SCHEME, InvalidReason, PaymentProof,
    PaymentRequirements, SettleOutcome, VerifyOutcome, X402_VERSION,
};

pub fn payment_config() -> Arc<PaymentConfig> {
    Arc::new(PaymentConfig {
        pay_to: "Treasury1111111111111111111111111111111111".to_owned(),
        asset: AssetInfo {
            mint: "Mint11111111111111111111111111111111111111".to_owned(),
            decimals: 6,
            symbol: "USDC".to_owned(),
        },
        network: "solana:devnet".to_owned(),
        max_timeout_seconds: 60,
    })
}

pub fn requirements(amount: u64) -> PaymentRequirements {
    let config = payment_config();
    PaymentRequirements {
        scheme: EXACT_SCHEME.to_owned(),
        network: config.network.clone(),
        max_amount_required: amount,
        resource: "/data/address/abc".to_owned(),
        description: "address data".to_owned(),
        pay_to: config.pay_to.clone(),
        asset: config.asset.clone(),
        max_timeout_seconds: config.max_timeout_seconds,
    }
}

/// A well-formed proof whose payload is the base64 of `tag`.
pub fn proof(tag: &[u8]) -> PaymentProof {
    let decoded = DecodedProof {
        x402_version: X402_VERSION,
        network: "solana:devnet".to_owned(),
        scheme: EXACT_SCHEME.to_owned(),
        payload: Base64Bytes::encode(tag).to_string(),
    };
    PaymentProof::new(Base64Bytes::encode_json(&decoded).unwrap().0)
}

pub fn job(tag: &[u8]) -> SettlementJob {
    let proof = proof(tag);
    SettlementJob {
        key: proof.key(),
        proof,
        requirements: requirements(10_000),
    }
}

/// Facilitator double returning scripted verdicts and counting calls.
pub struct MockFacilitator {
    requirements_verdict: RemoteVerdict<PaymentRequirements>,
    verify_verdict: RemoteVerdict<VerifyOutcome>,
    settle_verdict: RemoteVerdict<SettleOutcome>,
    requirements_count: AtomicUsize,
    verify_count: AtomicUsize,
    settle_count: AtomicUsize,
}

impl MockFacilitator {
    fn new(
        requirements_verdict: RemoteVerdict<PaymentRequirements>,
        verify_verdict: RemoteVerdict<VerifyOutcome>,
        settle_verdict: RemoteVerdict<SettleOutcome>,
    ) -> Self {
        Self {
            requirements_verdict,
            verify_verdict,
            settle_verdict,
            requirements_count: AtomicUsize::new(0),
            verify_count: AtomicUsize::new(0),
            settle_count: AtomicUsize::new(0),
        }
    }

    pub fn verifying(verdict: RemoteVerdict<VerifyOutcome>) -> Self {
        Self::new(
            RemoteVerdict::Unavailable("unused".to_owned()),
            verdict,
            RemoteVerdict::Unavailable("unused".to_owned()),
        )
    }

    pub fn settling(verdict: RemoteVerdict<SettleOutcome>) -> Self {
        Self::new(
            RemoteVerdict::Unavailable("unused".to_owned()),
            RemoteVerdict::Unavailable("unused".to_owned()),
            verdict,
        )
    }

    pub fn building(verdict: RemoteVerdict<PaymentRequirements>) -> Self {
        Self::new(
            verdict,
            RemoteVerdict::Unavailable("unused".to_owned()),
            RemoteVerdict::Unavailable("unused".to_owned()),
        )
    }

    pub fn requirements_calls(&self) -> usize {
        self.requirements_count.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_count.load(Ordering::SeqCst)
    }

    pub fn settle_calls(&self) -> usize {
        self.settle_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Facilitator for MockFacilitator {
    async fn create_requirements(
        &self,
        _price: u64,
        _resource: &str,
        _description: &str,
    ) -> RemoteVerdict<PaymentRequirements> {
        self.requirements_count.fetch_add(1, Ordering::SeqCst);
        self.requirements_verdict.clone()
    }

    async fn verify(
        &self,
        _proof: &DecodedProof,
        _requirements: &PaymentRequirements,
    ) -> RemoteVerdict<VerifyOutcome> {
        self.verify_count.fetch_add(1, Ordering::SeqCst);
        self.verify_verdict.clone()
    }

    async fn settle(
        &self,
        _proof: &DecodedProof,
        _requirements: &PaymentRequirements,
    ) -> RemoteVerdict<SettleOutcome> {
        self.settle_count.fetch_add(1, Ordering::SeqCst);
        self.settle_verdict.clone()
    }
}

/// Local verifier double.
pub struct MockLocalVerify {
    outcome: VerifyOutcome,
    count: AtomicUsize,
}

impl MockLocalVerify {
    pub fn valid() -> Self {
        Self {
            outcome: VerifyOutcome::valid(),
            count: AtomicUsize::new(0),
        }
    }

    pub fn invalid(reason: InvalidReason) -> Self {
        Self {
            outcome: VerifyOutcome::invalid(reason),
            count: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LocalVerify for MockLocalVerify {
    async fn verify_local(
        &self,
        _proof: &DecodedProof,
        _requirements: &PaymentRequirements,
    ) -> VerifyOutcome {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.outcome
    }
}

/// Local settler double.
pub struct MockLocalSettle {
    outcome: SettleOutcome,
    count: AtomicUsize,
}

impl MockLocalSettle {
    pub fn settled() -> Self {
        Self {
            outcome: SettleOutcome::settled("LocalSig", "solana:devnet"),
            count: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LocalSettle for MockLocalSettle {
    async fn settle_local(
        &self,
        _proof: &DecodedProof,
        _requirements: &PaymentRequirements,
    ) -> SettleOutcome {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}
