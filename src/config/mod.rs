//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional TOML file
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ToolConfig (validated, immutable)
//!
//! process environment (+ .env)
//!     → env.rs (endpoint, contract addresses, signing keys)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Everything an action needs from the environment is resolved before
//!   its first network call

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::{contract_address, rpc_url, ContractRef, EnvSource, ProcessEnv, Role};
pub use loader::{load_config, load_config_or_default, ConfigError};
pub use schema::{ConfirmationConfig, FeeConfig, LogFormat, NodeConfig, ObservabilityConfig, ToolConfig};
