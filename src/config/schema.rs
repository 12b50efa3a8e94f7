//! Configuration schema definitions.
//!
//! Tunables for how operations are built, priced and confirmed. Secrets and
//! contract addresses never live here; they come from the environment (see
//! [`crate::config::env`]). Every section has defaults so an absent file is
//! a valid configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the operations tool.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ToolConfig {
    /// Node and explorer settings.
    pub node: NodeConfig,

    /// Inclusion and confirmation polling.
    pub confirmation: ConfirmationConfig,

    /// Fee, gas and storage estimation.
    pub fees: FeeConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Node connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Chain alias used in RPC paths.
    pub chain: String,

    /// Per request timeout.
    pub rpc_timeout_secs: u64,

    /// Block explorer base URL; operation hashes are appended to it.
    pub explorer_url: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain: "main".to_string(),
            rpc_timeout_secs: 30,
            explorer_url: "https://ghost.tzstats.com".to_string(),
        }
    }
}

/// Confirmation polling settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Blocks (inclusion block included) before an operation counts as confirmed.
    pub required: u64,

    /// Delay between inclusion polls.
    pub poll_interval_ms: u64,

    /// Polls before giving up with a confirmation timeout.
    pub max_attempts: u32,

    /// Backoff base after a failed poll.
    pub backoff_base_ms: u64,

    /// Backoff ceiling after repeated failed polls.
    pub backoff_max_ms: u64,

    /// How far back `status` searches for an operation.
    pub status_lookback_blocks: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            required: 1,
            poll_interval_ms: 5_000,
            max_attempts: 60,
            backoff_base_ms: 500,
            backoff_max_ms: 10_000,
            status_lookback_blocks: 120,
        }
    }
}

/// Fee and limit estimation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Flat part of every operation fee.
    pub minimal_fee_mutez: u64,

    /// Fee per unit of gas, in thousandths of a mutez.
    pub nanotez_per_gas: u64,

    /// Fee per byte of the signed operation.
    pub mutez_per_byte: u64,

    /// Extra bytes counted on top of the forged size.
    pub size_buffer_bytes: u64,

    /// Gas units added to the simulated consumption.
    pub gas_buffer: u64,

    /// Bytes added to the simulated storage growth.
    pub storage_buffer: u64,

    /// Protocol cap on gas per operation.
    pub hard_gas_limit: u64,

    /// Protocol cap on storage per operation.
    pub hard_storage_limit: u64,

    /// Bytes charged for each originated contract or newly allocated account.
    pub origination_size: u64,

    /// Storage burn price.
    pub burn_mutez_per_byte: u64,

    /// Operations whose total fee exceeds this are refused.
    pub max_fee_mutez: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            minimal_fee_mutez: 100,
            nanotez_per_gas: 100,
            mutez_per_byte: 1,
            size_buffer_bytes: 10,
            gas_buffer: 100,
            storage_buffer: 20,
            hard_gas_limit: 1_040_000,
            hard_storage_limit: 60_000,
            origination_size: 257,
            burn_mutez_per_byte: 250,
            max_fee_mutez: 5_000_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub log_level: String,

    /// Output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ToolConfig = toml::from_str(
            r#"
            [confirmation]
            required = 3

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.confirmation.required, 3);
        assert_eq!(config.confirmation.poll_interval_ms, 5_000);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.fees.minimal_fee_mutez, 100);
        assert_eq!(config.node.explorer_url, "https://ghost.tzstats.com");
    }
}
