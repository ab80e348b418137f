//! Thin client for the upstream blockchain-data API the gateway fronts.
//!
//! Handlers never call this directly; every call goes through the token
//! bucket so the gateway's aggregate volume stays within the upstream
//! contract.

use std::time::Duration;

use url::Url;

/// Errors talking to the upstream data API.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The base or derived URL did not parse.
    #[error("invalid upstream URL: {0}")]
    Url(#[source] url::ParseError),
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// The request failed in transport or decoding.
    #[error("upstream request failed: {0}")]
    Http(#[source] reqwest::Error),
    /// The upstream answered with a non-success status.
    #[error("upstream answered {0}")]
    Status(reqwest::StatusCode),
}

/// Client for the upstream data API.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    base: Url,
    client: reqwest::Client,
}

impl UpstreamClient {
    /// Builds a client for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] on URL or client construction failure.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let mut normalized = base_url.trim_end_matches('/').to_owned();
        normalized.push('/');
        let base = Url::parse(&normalized).map_err(UpstreamError::Url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::Client)?;
        Ok(Self { base, client })
    }

    /// Fetches data for a blockchain address.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] on transport failure or a non-success
    /// status.
    pub async fn address_data(&self, address: &str) -> Result<serde_json::Value, UpstreamError> {
        let url = self
            .base
            .join(&format!("./address/{address}"))
            .map_err(UpstreamError::Url)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(UpstreamError::Http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }
        response.json().await.map_err(UpstreamError::Http)
    }
}
