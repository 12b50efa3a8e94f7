//! Tezos node integration.
//!
//! # Data Flow
//! ```text
//! action
//!     → operation.rs (OperationRequest → UnsignedOperation contents)
//!     → submitter.rs (simulate, price, sign, inject, confirm)
//!         ├── rpc.rs (TezosRpc trait, response model)
//!         │     └── client.rs (HTTP implementation)
//!         └── wallet.rs (ed25519 signing)
//! ```

pub mod client;
pub mod operation;
pub mod rpc;
pub mod submitter;
pub mod types;
pub mod wallet;

pub use client::HttpRpcClient;
pub use operation::{Arguments, OperationRequest};
pub use rpc::TezosRpc;
pub use submitter::OperationSubmitter;
pub use types::{OperationHash, OperationOutcome, OperationStatus, SubmittedOperation, TezosError, TezosResult};
pub use wallet::Wallet;
