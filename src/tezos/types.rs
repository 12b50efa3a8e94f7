//! Chain-specific types and error definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::base58;
use crate::crypto::hash::blake2b_256;
use crate::michelson::{EncodingError, Micheline};

/// Base58 operation hash (`o...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperationHash(String);

impl OperationHash {
    /// Hash of a signed operation, as the node will report it.
    pub fn from_signed_bytes(signed: &[u8]) -> Self {
        Self(base58::encode(&base58::OPERATION, &blake2b_256(signed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OperationHash {
    type Err = TezosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        base58::decode(&base58::OPERATION, s)
            .map_err(|e| TezosError::Malformed(format!("operation hash: {e}")))?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for OperationHash {
    type Error = TezosError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OperationHash> for String {
    fn from(hash: OperationHash) -> Self {
        hash.0
    }
}

impl fmt::Display for OperationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a node error trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeError {
    pub id: String,
    #[serde(default)]
    pub kind: Option<String>,
    /// Value passed to `FAILWITH`, when the script rejected the call.
    #[serde(default)]
    pub with: Option<Micheline>,
    #[serde(default)]
    pub msg: Option<String>,
}

/// Errors that can occur while talking to the chain.
#[derive(Debug, Error)]
pub enum TezosError {
    /// Connection or request failed before an answer arrived.
    #[error("RPC error: {0}")]
    Transport(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node answered with something we could not interpret.
    #[error("Malformed node response: {0}")]
    Malformed(String),

    /// The node answered with an error status.
    #[error("Node answered {status}: {message}")]
    Node {
        status: u16,
        message: String,
        errors: Vec<NodeError>,
    },

    #[error("Contract {0} not found")]
    ContractNotFound(String),

    #[error("Contract {contract} has no entry point '{entrypoint}'")]
    UnknownEntrypoint { contract: String, entrypoint: String },

    /// The chain refused the operation. `hash` is set when the rejection
    /// happened after injection.
    #[error("Entry point rejected: {reason}")]
    Rejected {
        reason: String,
        errors: Vec<String>,
        hash: Option<OperationHash>,
    },

    /// Invalid secret key or signing failure.
    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Insufficient funds: balance {balance} mutez, required {required} mutez")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("Fee {fee} mutez exceeds maximum {max} mutez")]
    FeeTooHigh { fee: u64, max: u64 },

    /// Injection was attempted but its result is unknown. The operation may
    /// still land on chain; check `hash` before retrying.
    #[error("Outcome unknown for operation {hash}: {reason}")]
    OutcomeUnknown { hash: OperationHash, reason: String },

    #[error("Operation {hash} not confirmed after {attempts} polls")]
    ConfirmationTimeout { hash: OperationHash, attempts: u32 },

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

/// Result type for chain operations.
pub type TezosResult<T> = Result<T, TezosError>;

/// Status of a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OperationStatus {
    /// Injected, not yet seen in a block.
    Pending,
    /// Included but short of the required depth.
    Confirming { current: u64, required: u64 },
    /// Included with the required depth.
    Confirmed { block_level: u64, confirmations: u64 },
    /// Included but failed to apply.
    Failed { reason: String },
}

/// An operation accepted by the node, awaiting inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedOperation {
    pub hash: OperationHash,
    /// Head level when the operation was built; inclusion can only happen above it.
    pub branch_level: u64,
    pub confirmations_required: u64,
    pub fee_mutez: u64,
    pub status: OperationStatus,
}

/// Final record of a confirmed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub hash: OperationHash,
    pub block_hash: String,
    pub block_level: u64,
    pub confirmations: u64,
    /// Contracts created by the operation, internal originations included.
    pub originated_contracts: Vec<String>,
    pub consumed_gas: u64,
    pub fee_mutez: u64,
}
