//! Deployment and administration of Backed token and oracle contracts on
//! Tezos.
//!
//! Every action follows the same path: resolve configuration and keys,
//! encode typed Michelson arguments, simulate, size fees, sign, inject and
//! wait for confirmations. Nothing reaches the node before the inputs are
//! known to be complete.

pub mod actions;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod michelson;
pub mod observability;
pub mod resilience;
pub mod tezos;

pub use config::ToolConfig;
pub use error::Error;
