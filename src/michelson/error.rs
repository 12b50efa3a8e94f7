//! Encoding error definitions.

use thiserror::Error;

use crate::crypto::KeyError;

/// Errors raised while checking, encoding or decoding Michelson data.
///
/// Every variant is raised before any byte leaves the encoder: a failed
/// encoding never yields partial output.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    /// The value tree does not match the declared type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A literal is out of range or malformed for its type.
    #[error("invalid {kind} literal: {reason}")]
    InvalidLiteral { kind: &'static str, reason: String },

    /// Map, big_map or set keys are not strictly increasing.
    #[error("{0} keys must be strictly increasing")]
    UnsortedKeys(&'static str),

    /// A key that Michelson cannot compare.
    #[error("values of type {0} are not comparable")]
    NotComparable(String),

    #[error("unknown Michelson primitive '{0}'")]
    UnknownPrimitive(String),

    /// Malformed type expression.
    #[error("invalid type expression: {0}")]
    InvalidSchema(String),

    /// A record field required by the schema was not supplied.
    #[error("missing field '%{0}'")]
    MissingField(String),

    /// A supplied record field does not exist in the schema.
    #[error("unknown field '%{0}'")]
    UnknownField(String),

    /// Binary input could not be decoded.
    #[error("decode error at byte {offset}: {reason}")]
    Decode { offset: usize, reason: String },

    #[error(transparent)]
    Key(#[from] KeyError),
}

impl EncodingError {
    pub(crate) fn literal(kind: &'static str, reason: impl Into<String>) -> Self {
        EncodingError::InvalidLiteral { kind, reason: reason.into() }
    }
}
