//! Construction of priced payment challenges.

use std::sync::Arc;

use crate::config::PaymentConfig;
use crate::gate::Challenge;
use crate::proto::{EXACT_SCHEME, PaymentRequirements};

/// Invalid inputs at challenge-build time.
///
/// Fatal to the request that triggered the build; never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// The configured price is zero.
    #[error("price must be greater than zero")]
    ZeroPrice,
    /// The resource path is empty or whitespace.
    #[error("resource must not be empty")]
    EmptyResource,
}

/// Builds immutable [`PaymentRequirements`] for protected resources.
///
/// Pure construction: the recipient, asset, network, and timeout come from
/// the process-wide [`PaymentConfig`], never from caller input.
#[derive(Debug, Clone)]
pub struct RequirementsBuilder {
    config: Arc<PaymentConfig>,
}

impl RequirementsBuilder {
    /// Creates a builder over the given payment configuration.
    #[must_use]
    pub const fn new(config: Arc<PaymentConfig>) -> Self {
        Self { config }
    }

    /// Returns the underlying payment configuration.
    #[must_use]
    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    /// Builds a challenge for `resource` priced at `price` base units.
    ///
    /// Negative or non-finite prices are unrepresentable by type; zero is
    /// rejected here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the price is zero or the resource
    /// is empty/whitespace.
    pub fn build(
        &self,
        price: u64,
        resource: &str,
        description: &str,
    ) -> Result<PaymentRequirements, ConfigurationError> {
        if price == 0 {
            return Err(ConfigurationError::ZeroPrice);
        }
        if resource.trim().is_empty() {
            return Err(ConfigurationError::EmptyResource);
        }
        Ok(PaymentRequirements {
            scheme: EXACT_SCHEME.to_owned(),
            network: self.config.network.clone(),
            max_amount_required: price,
            resource: resource.to_owned(),
            description: description.to_owned(),
            pay_to: self.config.pay_to.clone(),
            asset: self.config.asset.clone(),
            max_timeout_seconds: self.config.max_timeout_seconds,
        })
    }
}

#[async_trait::async_trait]
impl Challenge for RequirementsBuilder {
    async fn challenge(
        &self,
        price: u64,
        resource: &str,
        description: &str,
    ) -> Result<PaymentRequirements, ConfigurationError> {
        self.build(price, resource, description)
    }
}
