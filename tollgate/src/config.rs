//! Process-wide payment configuration.
//!
//! The recipient account, asset, network, and challenge timeout are fixed at
//! startup and never taken from caller input, so a caller cannot forge a
//! challenge that pays someone else.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::proto::AssetInfo;

/// Payment terms shared by every challenge this gateway issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfig {
    /// Recipient account credited by settled payments.
    pub pay_to: String,
    /// Token asset payments must use.
    pub asset: AssetInfo,
    /// Network identifier (e.g., `"solana:mainnet"`).
    pub network: String,
    /// How long an issued challenge remains satisfiable, in seconds.
    #[serde(default = "default_max_timeout_seconds")]
    pub max_timeout_seconds: u64,
}

const fn default_max_timeout_seconds() -> u64 {
    60
}

impl PaymentConfig {
    /// Converts an amount in token base units to a display value in whole
    /// tokens (USD for dollar-pegged assets).
    #[must_use]
    pub fn display_price(&self, base_units: u64) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(base_units), u32::from(self.asset.decimals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PaymentConfig {
        PaymentConfig {
            pay_to: "Treasury1111111111111111111111111111111111".to_owned(),
            asset: AssetInfo {
                mint: "Mint11111111111111111111111111111111111111".to_owned(),
                decimals: 6,
                symbol: "USDC".to_owned(),
            },
            network: "solana:devnet".to_owned(),
            max_timeout_seconds: 60,
        }
    }

    #[test]
    fn display_price_scales_by_decimals() {
        let cfg = config();
        assert_eq!(cfg.display_price(10_000).to_string(), "0.010000");
        assert_eq!(cfg.display_price(2_500_000).to_string(), "2.500000");
    }
}
