//! HTTP client for a remote payment facilitator.
//!
//! Talks to the facilitator's `/requirements`, `/verify`, and `/settle`
//! endpoints. The facilitator is authoritative when it answers definitively
//! (2xx, or 4xx with a parseable verdict body) and unavailable on anything
//! ambiguous: transport errors, timeouts, 5xx, or unparseable bodies. The
//! distinction comes back as [`RemoteVerdict`], never as a thrown error.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tollgate::facilitator::{Facilitator, RemoteVerdict};
use tollgate::proto::{
    DecodedProof, PaymentRequirements, SettleOutcome, VerifyOutcome, X402_VERSION,
};
use url::Url;

/// Errors constructing a [`FacilitatorClient`].
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    /// The base URL (or a derived endpoint URL) did not parse.
    #[error("invalid facilitator URL: {0}")]
    UrlParse(#[source] url::ParseError),
    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Wire body for verify and settle requests.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProofRequestBody<'a> {
    x402_version: u32,
    payment_proof: &'a DecodedProof,
    payment_requirements: &'a PaymentRequirements,
}

/// Wire body for createRequirements requests.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequirementsRequestBody<'a> {
    x402_version: u32,
    price: u64,
    resource: &'a str,
    description: &'a str,
}

/// Client for a remote x402 facilitator service.
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    requirements_url: Url,
    verify_url: Url,
    settle_url: Url,
    client: reqwest::Client,
}

impl FacilitatorClient {
    /// Default timeout applied to every facilitator request.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Builds a client for the facilitator at `base_url`.
    ///
    /// Endpoint URLs are derived relative to the base; a missing trailing
    /// slash is tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] on URL or HTTP client
    /// construction failure.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FacilitatorClientError> {
        let mut normalized = base_url.trim_end_matches('/').to_owned();
        normalized.push('/');
        let base = Url::parse(&normalized).map_err(FacilitatorClientError::UrlParse)?;
        let join = |path: &str| base.join(path).map_err(FacilitatorClientError::UrlParse);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FacilitatorClientError::HttpClient)?;
        Ok(Self {
            requirements_url: join("./requirements")?,
            verify_url: join("./verify")?,
            settle_url: join("./settle")?,
            client,
        })
    }

    /// POSTs `body` and classifies the response.
    ///
    /// `definitive_client_errors` controls whether a 4xx with a parseable
    /// body counts as an authoritative answer (true for verify/settle,
    /// false for requirements where only a built challenge is usable).
    async fn post_verdict<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &Url,
        body: &B,
        definitive_client_errors: bool,
    ) -> RemoteVerdict<T> {
        let response = match self.client.post(url.clone()).json(body).send().await {
            Ok(response) => response,
            Err(err) => {
                return RemoteVerdict::Unavailable(format!("facilitator transport error: {err}"));
            }
        };
        let status = response.status();
        let authoritative =
            status.is_success() || (definitive_client_errors && status.is_client_error());
        if !authoritative {
            return RemoteVerdict::Unavailable(format!("facilitator answered {status}"));
        }
        match response.json::<T>().await {
            Ok(value) => RemoteVerdict::Definitive(value),
            Err(err) => {
                RemoteVerdict::Unavailable(format!("unparseable facilitator response: {err}"))
            }
        }
    }
}

#[async_trait::async_trait]
impl Facilitator for FacilitatorClient {
    async fn create_requirements(
        &self,
        price: u64,
        resource: &str,
        description: &str,
    ) -> RemoteVerdict<PaymentRequirements> {
        let body = RequirementsRequestBody {
            x402_version: X402_VERSION,
            price,
            resource,
            description,
        };
        self.post_verdict(&self.requirements_url, &body, false).await
    }

    async fn verify(
        &self,
        proof: &DecodedProof,
        requirements: &PaymentRequirements,
    ) -> RemoteVerdict<VerifyOutcome> {
        let body = ProofRequestBody {
            x402_version: X402_VERSION,
            payment_proof: proof,
            payment_requirements: requirements,
        };
        self.post_verdict(&self.verify_url, &body, true).await
    }

    async fn settle(
        &self,
        proof: &DecodedProof,
        requirements: &PaymentRequirements,
    ) -> RemoteVerdict<SettleOutcome> {
        let body = ProofRequestBody {
            x402_version: X402_VERSION,
            payment_proof: proof,
            payment_requirements: requirements,
        };
        self.post_verdict(&self.settle_url, &body, true).await
    }
}
