//! Configuration management for the swap service
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub rates: RatesConfig,
    pub eth: EthConfig,
    pub ada: AdaConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Coordinator tick cadence
    pub poll_interval_secs: u64,
    /// Order lifetime from creation to expiry
    pub order_expiry_secs: i64,
    /// Bound on each external indexer query and outbound send
    pub external_call_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatesConfig {
    /// Fixed exchange rate: ETH per ADA. Quote retrieval is an external
    /// concern; the rate is applied once at order creation.
    pub eth_per_ada: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EthConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub etherscan_url: String,
    pub etherscan_api_key: String,
    /// Custody address users deposit ETH to
    pub custody_address: String,
    /// Hex-encoded signing key; empty means the ETH sender is unavailable
    pub private_key: String,
    /// Absolute deposit-match tolerance in ETH
    pub amount_tolerance: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdaConfig {
    pub blockfrost_url: String,
    pub blockfrost_api_key: String,
    /// Custody address users deposit ADA to
    pub custody_address: String,
    /// cardano-wallet server backing the ADA sender
    pub wallet_url: String,
    /// Wallet id on the cardano-wallet server; empty means the ADA sender is
    /// unavailable
    pub wallet_id: String,
    pub wallet_passphrase: String,
    /// Absolute deposit-match tolerance in ADA. Wider than the ETH tolerance
    /// to absorb fee deduction on either side.
    pub amount_tolerance: f64,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("SWAPD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.service.poll_interval_secs == 0 {
            anyhow::bail!("service.poll_interval_secs must be positive");
        }
        if self.service.order_expiry_secs <= 0 {
            anyhow::bail!("service.order_expiry_secs must be positive");
        }
        if self.rates.eth_per_ada <= 0.0 {
            anyhow::bail!("rates.eth_per_ada must be positive");
        }
        if self.eth.amount_tolerance <= 0.0 || self.ada.amount_tolerance <= 0.0 {
            anyhow::bail!("amount tolerances must be positive");
        }
        if self.eth.custody_address.is_empty() {
            anyhow::bail!("eth.custody_address is required");
        }
        if self.ada.custody_address.is_empty() {
            anyhow::bail!("ada.custody_address is required");
        }
        if self.eth.private_key.is_empty() {
            tracing::warn!("No ETH signing key configured - ETH settlements will stay parked");
        }
        if self.ada.wallet_id.is_empty() {
            tracing::warn!("No ADA wallet configured - ADA settlements will stay parked");
        }
        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "key = \"${TEST_VAR}\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "key = \"test_value\"");
    }

    #[test]
    fn test_missing_env_var_becomes_empty() {
        env::remove_var("SWAPD_SURELY_UNSET");
        let input = "key = \"${SWAPD_SURELY_UNSET}\"";
        assert_eq!(substitute_env_vars(input), "key = \"\"");
    }
}
