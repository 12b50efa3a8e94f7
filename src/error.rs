//! Top-level error type and process exit codes.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::michelson::EncodingError;
use crate::tezos::TezosError;

/// Broad failure classes, one exit code each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Encoding,
    Transport,
    Rejection,
    Funding,
    ConfirmationTimeout,
    UnknownOutcome,
}

impl ErrorKind {
    pub fn exit_code(&self) -> u8 {
        match self {
            ErrorKind::Configuration => 2,
            ErrorKind::Encoding => 3,
            ErrorKind::Transport => 4,
            ErrorKind::Rejection => 5,
            ErrorKind::Funding => 6,
            ErrorKind::ConfirmationTimeout => 7,
            ErrorKind::UnknownOutcome => 8,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Tezos(#[from] TezosError),

    #[error("Failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("Invalid Micheline JSON in {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },

    /// A command line argument that does not parse as what it names.
    #[error("Invalid {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::Io { .. } => ErrorKind::Configuration,
            Error::Encoding(_) | Error::Json { .. } | Error::InvalidArgument { .. } => ErrorKind::Encoding,
            Error::Tezos(e) => match e {
                TezosError::Transport(_)
                | TezosError::Timeout(_)
                | TezosError::Malformed(_)
                | TezosError::Node { .. } => ErrorKind::Transport,
                TezosError::ContractNotFound(_)
                | TezosError::UnknownEntrypoint { .. }
                | TezosError::Rejected { .. } => ErrorKind::Rejection,
                TezosError::InsufficientFunds { .. } | TezosError::FeeTooHigh { .. } => ErrorKind::Funding,
                TezosError::Wallet(_) => ErrorKind::Configuration,
                TezosError::Encoding(_) => ErrorKind::Encoding,
                TezosError::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
                TezosError::OutcomeUnknown { .. } => ErrorKind::UnknownOutcome,
            },
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }

    /// Operation hash to reconcile against the chain, when one exists.
    pub fn operation_hash(&self) -> Option<&str> {
        match self {
            Error::Tezos(TezosError::OutcomeUnknown { hash, .. })
            | Error::Tezos(TezosError::ConfirmationTimeout { hash, .. })
            | Error::Tezos(TezosError::Rejected { hash: Some(hash), .. }) => Some(hash.as_str()),
            _ => None,
        }
    }

    /// Structured form for the failure log line.
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Some(hash) = self.operation_hash() {
            value["operation_hash"] = serde_json::Value::String(hash.to_string());
        }
        if let Error::Tezos(TezosError::Rejected { errors, .. }) = self {
            value["node_errors"] = serde_json::json!(errors);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tezos::OperationHash;

    #[test]
    fn test_exit_codes_are_distinct() {
        let kinds = [
            ErrorKind::Configuration,
            ErrorKind::Encoding,
            ErrorKind::Transport,
            ErrorKind::Rejection,
            ErrorKind::Funding,
            ErrorKind::ConfirmationTimeout,
            ErrorKind::UnknownOutcome,
        ];
        let mut codes: Vec<u8> = kinds.iter().map(ErrorKind::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&0) && !codes.contains(&1));
    }

    #[test]
    fn test_classification() {
        let missing: Error = ConfigError::MissingEnv("TEZOS_RPC_URL".into()).into();
        assert_eq!(missing.kind(), ErrorKind::Configuration);
        assert_eq!(missing.exit_code(), 2);

        let timeout: Error = TezosError::Timeout(30).into();
        assert_eq!(timeout.kind(), ErrorKind::Transport);

        let funds: Error = TezosError::InsufficientFunds { balance: 1, required: 2 }.into();
        assert_eq!(funds.kind(), ErrorKind::Funding);
    }

    #[test]
    fn test_unknown_outcome_carries_hash() {
        let hash = OperationHash::from_signed_bytes(b"op");
        let err: Error = TezosError::OutcomeUnknown { hash: hash.clone(), reason: "connection reset".into() }.into();
        assert_eq!(err.kind(), ErrorKind::UnknownOutcome);
        assert_eq!(err.operation_hash(), Some(hash.as_str()));

        let json = err.to_json();
        assert_eq!(json["kind"], "unknown_outcome");
        assert_eq!(json["operation_hash"], hash.as_str());
    }
}
