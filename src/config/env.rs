//! Environment lookup for endpoints, contract addresses and signing keys.
//!
//! # Security
//! - Secret keys are read here and handed straight to the wallet
//! - Values are never logged; only their key names are

use std::collections::HashMap;
use std::str::FromStr;

use url::Url;

use crate::config::loader::ConfigError;
use crate::crypto::Address;

/// Node RPC endpoint.
pub const RPC_URL_ENV: &str = "TEZOS_RPC_URL";

/// Source of configuration values keyed by name.
///
/// Empty or whitespace-only values count as absent.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment, optionally seeded from a `.env` file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl ProcessEnv {
    /// Load `.env` from the working directory if one exists.
    ///
    /// Variables already set in the process take precedence.
    pub fn load_dotenv() {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env file"),
        }
    }
}

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.trim().is_empty()).cloned()
    }
}

/// Fetch a value the current action cannot run without.
pub fn require(env: &dyn EnvSource, key: &str) -> Result<String, ConfigError> {
    env.var(key).ok_or_else(|| {
        tracing::error!(key, "Missing required environment value");
        ConfigError::MissingEnv(key.to_string())
    })
}

/// Fetch a value the action can do without; absence is logged as a warning.
pub fn optional(env: &dyn EnvSource, key: &str) -> Option<String> {
    let value = env.var(key);
    if value.is_none() {
        tracing::warn!(key, "Optional environment value not set");
    }
    value
}

/// The node endpoint, parsed.
pub fn rpc_url(env: &dyn EnvSource) -> Result<Url, ConfigError> {
    let raw = require(env, RPC_URL_ENV)?;
    Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidEnv {
        key: RPC_URL_ENV.to_string(),
        reason: e.to_string(),
    })
}

/// Signing identities, each bound to its own secret key variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Originates contracts.
    Deployer,
    /// Administers the token factory.
    TokenFactoryAdmin,
    /// Administers the oracle factory.
    OracleFactoryAdmin,
    /// Administers a deployed token; submits mints and delegated transfers.
    TokenAdmin,
    /// Owner of the tokens moved by a delegated transfer. Falls back to
    /// [`Role::TokenAdmin`] when unset.
    TokenHolder,
}

impl Role {
    /// Environment variable holding this role's secret key.
    pub fn key_env(&self) -> &'static str {
        match self {
            Role::Deployer => "TEZOS_DEPLOYER_PRIVATE_KEY",
            Role::TokenFactoryAdmin => "BACKED_TOKEN_FACTORY_ADMIN_PRIVATE_KEY",
            Role::OracleFactoryAdmin => "BACKED_ORACLE_FACTORY_ADMIN_PRIVATE_KEY",
            Role::TokenAdmin => "BACKED_TOKEN_ADMIN_PRIVATE_KEY",
            Role::TokenHolder => "BACKED_TOKEN_HOLDER_PRIVATE_KEY",
        }
    }
}

/// Contracts the actions address, each bound to an address variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractRef {
    TokenFactory,
    OracleFactory,
    Token,
}

impl ContractRef {
    pub fn address_env(&self) -> &'static str {
        match self {
            ContractRef::TokenFactory => "BACKED_TOKEN_FACTORY",
            ContractRef::OracleFactory => "BACKED_ORACLE_FACTORY",
            ContractRef::Token => "BACKED_TOKEN",
        }
    }
}

/// Resolve and parse a contract address. Only originated (KT1) addresses
/// are accepted.
pub fn contract_address(env: &dyn EnvSource, contract: ContractRef) -> Result<Address, ConfigError> {
    let key = contract.address_env();
    let raw = require(env, key)?;
    let address = Address::from_str(raw.trim()).map_err(|e| ConfigError::InvalidEnv {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    if !address.is_originated() {
        return Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            reason: format!("{address} is not a contract address"),
        });
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyHash;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let env = env(&[(RPC_URL_ENV, "   ")]);
        assert!(matches!(rpc_url(&env), Err(ConfigError::MissingEnv(key)) if key == RPC_URL_ENV));
        assert_eq!(optional(&env, "BACKED_TOKEN"), None);
    }

    #[test]
    fn test_rpc_url_must_parse() {
        let bad = env(&[(RPC_URL_ENV, "ghostnet")]);
        assert!(matches!(rpc_url(&bad), Err(ConfigError::InvalidEnv { .. })));

        let good = env(&[(RPC_URL_ENV, "https://rpc.ghostnet.teztnets.com")]);
        assert_eq!(rpc_url(&good).unwrap().host_str(), Some("rpc.ghostnet.teztnets.com"));
    }

    #[test]
    fn test_contract_address_requires_kt1() {
        let tz1 = Address::implicit(KeyHash::Ed25519([1; 20])).to_string();
        let implicit = env(&[("BACKED_TOKEN", tz1.as_str())]);
        assert!(matches!(
            contract_address(&implicit, ContractRef::Token),
            Err(ConfigError::InvalidEnv { .. })
        ));

        let originated = Address::originated([3; 20]).to_string();
        let env = env(&[("BACKED_TOKEN", originated.as_str())]);
        assert_eq!(contract_address(&env, ContractRef::Token).unwrap().to_string(), originated);
    }
}
