//! Gateway server configuration.
//!
//! Loads a TOML file with `$VAR` / `${VAR}` environment expansion in string
//! values, so secrets like the treasury account stay out of the file.
//!
//! # Example
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 4022
//!
//! [payment]
//! payTo = "$TREASURY_ACCOUNT"
//! network = "solana:mainnet"
//! maxTimeoutSeconds = 60
//!
//! [payment.asset]
//! mint = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
//! decimals = 6
//! symbol = "USDC"
//!
//! [facilitator]
//! url = "https://facilitator.example"
//!
//! [rpc]
//! url = "https://api.mainnet-beta.solana.com"
//!
//! [upstream]
//! url = "https://data.example"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to the configuration file (default: `config.toml`)
//! - `HOST` / `PORT` — Override the bind address
//! - Any `$VAR` referenced from string values in the file

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tollgate::config::PaymentConfig;
use tollgate::limiter::LimiterConfig;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `4022`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Payment terms for issued challenges.
    pub payment: PaymentConfig,

    /// Remote facilitator endpoint.
    pub facilitator: FacilitatorSettings,

    /// Blockchain RPC node used by the local fallback path.
    pub rpc: RpcSettings,

    /// Upstream data API the gateway fronts.
    pub upstream: UpstreamSettings,

    /// Admission control towards the upstream API.
    #[serde(default)]
    pub limiter: LimiterSettings,

    /// Settlement queue and timing.
    #[serde(default)]
    pub settlement: SettlementSettings,

    /// Per-route prices in token base units.
    #[serde(default)]
    pub pricing: PricingSettings,
}

/// Remote facilitator endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilitatorSettings {
    /// Base URL of the facilitator service.
    pub url: String,
    /// Per-request timeout in milliseconds (default: 10 000).
    #[serde(default = "default_facilitator_timeout_ms")]
    pub timeout_ms: u64,
}

/// RPC node settings for the local fallback path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSettings {
    /// HTTP RPC endpoint URL.
    pub url: String,
    /// Deadline for confirmation polling in milliseconds (default: 30 000).
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    /// Deadline for a single local verification in milliseconds
    /// (default: 10 000).
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

/// Upstream data API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    /// Base URL of the upstream data API.
    pub url: String,
    /// Per-request timeout in milliseconds (default: 10 000).
    #[serde(default = "default_call_timeout_ms")]
    pub timeout_ms: u64,
}

/// Token-bucket settings protecting the upstream API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LimiterSettings {
    /// Maximum upstream calls per window (default: 5).
    pub capacity: usize,
    /// Window length in milliseconds (default: 1 000).
    pub window_ms: u64,
    /// Queued calls beyond which new submissions are dropped
    /// (default: 256).
    pub max_pending: usize,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            capacity: 5,
            window_ms: 1_000,
            max_pending: 256,
        }
    }
}

impl LimiterSettings {
    /// Converts to the limiter's own configuration type.
    #[must_use]
    pub const fn to_config(self) -> LimiterConfig {
        LimiterConfig {
            capacity: self.capacity,
            window: Duration::from_millis(self.window_ms),
            max_pending: self.max_pending,
        }
    }
}

/// Settlement worker settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SettlementSettings {
    /// Bounded depth of the settlement queue (default: 1024).
    pub queue_depth: usize,
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self { queue_depth: 1024 }
    }
}

/// Per-route prices in token base units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Price of the address-data route (default: 10 000).
    pub address_data: u64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            address_data: 10_000,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
}

const fn default_port() -> u16 {
    4022
}

const fn default_facilitator_timeout_ms() -> u64 {
    10_000
}

const fn default_confirm_timeout_ms() -> u64 {
    30_000
}

const fn default_call_timeout_ms() -> u64 {
    10_000
}

impl GatewayConfig {
    /// Loads configuration from the path in the `CONFIG` environment
    /// variable, falling back to `config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        if !Path::new(path).exists() {
            return Err(format!("configuration file not found: {path}").into());
        }
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;

        if let Ok(host) = std::env::var("HOST")
            && let Ok(addr) = host.parse()
        {
            config.host = addr;
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        Ok(config)
    }

    /// Parses configuration from TOML text, expanding environment
    /// references first.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML does not parse.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(&expand_env_vars(content))
    }
}

/// Expands `$VAR` and `${VAR}` references from the process environment.
///
/// Unresolved references are left in place so a missing secret is visible
/// in the parsed value instead of silently becoming empty.
fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];

        let (name, consumed) = if let Some(inner) = rest.strip_prefix('{') {
            match inner.find('}') {
                Some(end) => (&inner[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = rest
                .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .unwrap_or(rest.len());
            (&rest[..end], end)
        };

        if name.is_empty() {
            out.push('$');
            continue;
        }
        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                out.push('$');
                out.push_str(&rest[..consumed]);
            }
        }
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[payment]
payTo = "Treasury1111111111111111111111111111111111"
network = "solana:devnet"

[payment.asset]
mint = "Mint11111111111111111111111111111111111111"
decimals = 6
symbol = "USDC"

[facilitator]
url = "http://localhost:4021"

[rpc]
url = "http://localhost:8899"

[upstream]
url = "http://localhost:9000"
"#;

    #[test]
    fn minimal_config_applies_defaults() {
        let config = GatewayConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.port, 4022);
        assert_eq!(config.limiter.capacity, 5);
        assert_eq!(config.limiter.window_ms, 1_000);
        assert_eq!(config.settlement.queue_depth, 1024);
        assert_eq!(config.pricing.address_data, 10_000);
        assert_eq!(config.payment.max_timeout_seconds, 60);
        assert_eq!(config.facilitator.timeout_ms, 10_000);
    }

    #[test]
    fn expands_environment_references() {
        // PATH is always present in a test environment.
        let path = std::env::var("PATH").unwrap();
        assert_eq!(expand_env_vars("a $PATH b"), format!("a {path} b"));
        assert_eq!(expand_env_vars("a ${PATH} b"), format!("a {path} b"));
    }

    #[test]
    fn leaves_unresolved_references_in_place() {
        assert_eq!(
            expand_env_vars("$TOLLGATE_SURELY_UNSET_VAR"),
            "$TOLLGATE_SURELY_UNSET_VAR"
        );
        assert_eq!(expand_env_vars("100$"), "100$");
    }
}
