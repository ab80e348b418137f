//! Challenge construction, facilitator-first.
//!
//! Requirements are preferably built by the facilitator (it may enrich them
//! with data the gateway lacks), with the local builder as fallback. A
//! remote answer is only trusted when its recipient, asset, and network
//! match the gateway's own configuration; anything else is treated as
//! unavailable so a misbehaving facilitator cannot redirect payments.

use std::sync::Arc;

use tollgate::facilitator::{Facilitator, RemoteVerdict};
use tollgate::gate::Challenge;
use tollgate::proto::PaymentRequirements;
use tollgate::requirements::{ConfigurationError, RequirementsBuilder};

/// Builds challenges through the facilitator, falling back to the local
/// [`RequirementsBuilder`].
#[derive(Debug)]
pub struct FacilitatorChallenger<F> {
    facilitator: Arc<F>,
    builder: RequirementsBuilder,
}

impl<F> FacilitatorChallenger<F> {
    /// Wires the challenger from its collaborators.
    pub const fn new(facilitator: Arc<F>, builder: RequirementsBuilder) -> Self {
        Self {
            facilitator,
            builder,
        }
    }

    /// Whether remote-built requirements agree with local configuration on
    /// the fields a caller must not be able to influence.
    fn trustworthy(&self, requirements: &PaymentRequirements, price: u64) -> bool {
        let config = self.builder.config();
        requirements.pay_to == config.pay_to
            && requirements.asset == config.asset
            && requirements.network == config.network
            && requirements.max_amount_required == price
    }
}

#[async_trait::async_trait]
impl<F> Challenge for FacilitatorChallenger<F>
where
    F: Facilitator,
{
    async fn challenge(
        &self,
        price: u64,
        resource: &str,
        description: &str,
    ) -> Result<PaymentRequirements, ConfigurationError> {
        // Validate inputs before going remote; a bad price is a local bug
        // regardless of who builds the challenge.
        let local = self.builder.build(price, resource, description)?;

        match self
            .facilitator
            .create_requirements(price, resource, description)
            .await
        {
            RemoteVerdict::Definitive(remote) if self.trustworthy(&remote, price) => Ok(remote),
            RemoteVerdict::Definitive(remote) => {
                tracing::warn!(
                    pay_to = %remote.pay_to,
                    network = %remote.network,
                    "facilitator requirements disagree with configuration, using local build"
                );
                Ok(local)
            }
            RemoteVerdict::Unavailable(why) => {
                tracing::debug!(%why, "facilitator unavailable, building requirements locally");
                Ok(local)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockFacilitator, payment_config, requirements};
    use tollgate::gate::Challenge as _;

    fn challenger(facilitator: MockFacilitator) -> FacilitatorChallenger<MockFacilitator> {
        FacilitatorChallenger::new(
            Arc::new(facilitator),
            RequirementsBuilder::new(payment_config()),
        )
    }

    #[tokio::test]
    async fn uses_remote_requirements_when_they_match_config() {
        let remote = requirements(10_000);
        let challenger =
            challenger(MockFacilitator::building(RemoteVerdict::Definitive(remote.clone())));
        let built = challenger
            .challenge(10_000, "/data/address/abc", "address data")
            .await
            .unwrap();
        assert_eq!(built, remote);
    }

    #[tokio::test]
    async fn distrusts_remote_requirements_with_foreign_recipient() {
        let mut remote = requirements(10_000);
        remote.pay_to = "Attacker111111111111111111111111111111111".to_owned();
        let challenger =
            challenger(MockFacilitator::building(RemoteVerdict::Definitive(remote)));
        let built = challenger
            .challenge(10_000, "/data/address/abc", "address data")
            .await
            .unwrap();
        assert_eq!(built.pay_to, payment_config().pay_to);
    }

    #[tokio::test]
    async fn builds_locally_when_facilitator_is_unavailable() {
        let challenger =
            challenger(MockFacilitator::building(RemoteVerdict::Unavailable("down".to_owned())));
        let built = challenger
            .challenge(10_000, "/data/address/abc", "address data")
            .await
            .unwrap();
        assert_eq!(built.max_amount_required, 10_000);
        assert_eq!(built.resource, "/data/address/abc");
    }

    #[tokio::test]
    async fn invalid_price_fails_before_any_remote_call() {
        let challenger = challenger(MockFacilitator::building(RemoteVerdict::Unavailable(
            "should not be consulted".to_owned(),
        )));
        let err = challenger.challenge(0, "/r", "d").await.unwrap_err();
        assert_eq!(err, ConfigurationError::ZeroPrice);
        assert_eq!(challenger.facilitator.requirements_calls(), 0);
    }
}
