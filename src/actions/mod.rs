//! Administrative actions.
//!
//! Each action resolves everything it needs from the environment and its
//! arguments first, builds an [`OperationRequest`](crate::tezos::OperationRequest)
//! from typed values, then hands it to the
//! [`OperationSubmitter`](crate::tezos::OperationSubmitter). Payload builders
//! are pure functions so they can be checked without a node.

use std::fs;
use std::path::Path;

use num_bigint::BigUint;
use serde::Serialize;

use crate::crypto::Address;
use crate::error::Error;
use crate::michelson::text::char_to_bytes;
use crate::michelson::{EncodingError, Micheline, Type, Value};
use crate::tezos::{OperationOutcome, OperationStatus};

pub mod factory;
pub mod originate;
pub mod status;
pub mod token;

/// What an action did, for the final log line.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub action: &'static str,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OperationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

impl Report {
    /// Report for a confirmed operation.
    pub fn confirmed(action: &'static str, summary: String, outcome: OperationOutcome, explorer: &str) -> Self {
        let explorer_url = Some(explorer_link(explorer, outcome.hash.as_str()));
        Self { action, summary, operation: Some(outcome), status: None, explorer_url }
    }

    pub fn log(&self) {
        match &self.operation {
            Some(outcome) => tracing::info!(
                action = self.action,
                op_hash = %outcome.hash,
                block_level = outcome.block_level,
                confirmations = outcome.confirmations,
                fee_mutez = outcome.fee_mutez,
                explorer_url = self.explorer_url.as_deref().unwrap_or_default(),
                "{}",
                self.summary
            ),
            None => tracing::info!(
                action = self.action,
                explorer_url = self.explorer_url.as_deref().unwrap_or_default(),
                "{}",
                self.summary
            ),
        }
    }
}

/// Explorer page for an operation or contract.
pub fn explorer_link(base: &str, id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), id)
}

/// Read a Micheline JSON file.
pub fn read_micheline(path: &Path) -> Result<Micheline, Error> {
    let text = fs::read_to_string(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&text).map_err(|source| Error::Json { path: path.to_path_buf(), source })
}

pub fn parse_address(text: &str) -> Result<Address, EncodingError> {
    Ok(text.trim().parse()?)
}

pub fn parse_nat(name: &'static str, text: &str) -> Result<BigUint, Error> {
    text.trim()
        .parse()
        .map_err(|_| Error::InvalidArgument { name, reason: format!("'{text}' is not a natural number") })
}

/// Seconds since the epoch of an RFC 3339 instant.
pub fn parse_deadline(text: &str) -> Result<i64, EncodingError> {
    chrono::DateTime::parse_from_rfc3339(text.trim())
        .map(|t| t.timestamp())
        .map_err(|e| EncodingError::InvalidLiteral { kind: "timestamp", reason: format!("'{text}': {e}") })
}

/// Named leaves of a parameter type, looking through an outer entry point
/// annotation.
pub fn record_fields(ty: &Type) -> Vec<(&str, &Type)> {
    match ty {
        Type::Field(_, inner) if matches!(inner.as_ref(), Type::Pair(..)) => inner.fields(),
        other => other.fields(),
    }
}

/// Type of the field `name` in a record type.
pub fn field_type<'a>(ty: &'a Type, name: &str) -> Result<&'a Type, EncodingError> {
    record_fields(ty)
        .into_iter()
        .find(|(field, _)| *field == name)
        .map(|(_, ty)| ty)
        .ok_or_else(|| EncodingError::MissingField(name.to_string()))
}

/// A text argument in the form its field expects: raw UTF-8 bytes for
/// `bytes` fields, the string itself for `string` fields.
pub fn text_value(ty: &Type, text: &str) -> Result<Value, EncodingError> {
    match ty.strip() {
        Type::Bytes => Ok(Value::bytes(char_to_bytes(text))),
        Type::String => Ok(Value::string(text)),
        Type::Nat => Value::parse_nat(text),
        other => Err(EncodingError::TypeMismatch { expected: other.to_string(), found: "text".to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explorer_link() {
        assert_eq!(explorer_link("https://ghost.tzstats.com/", "oo1"), "https://ghost.tzstats.com/oo1");
        assert_eq!(explorer_link("https://ghost.tzstats.com", "oo1"), "https://ghost.tzstats.com/oo1");
    }

    #[test]
    fn test_text_value_follows_field_type() {
        assert_eq!(text_value(&Type::Bytes, "18").unwrap(), Value::bytes(vec![0x31, 0x38]));
        assert_eq!(text_value(&Type::field("decimals", Type::String), "18").unwrap(), Value::string("18"));
        assert_eq!(text_value(&Type::Nat, "18").unwrap(), Value::nat(18));
        assert!(text_value(&Type::Address, "18").is_err());
    }

    #[test]
    fn test_field_lookup_through_entrypoint_annotation() {
        let ty = Type::field(
            "deployOracle",
            Type::pair(Type::field("decimals", Type::String), Type::field("owner", Type::Address)),
        );
        assert_eq!(field_type(&ty, "owner").unwrap(), &Type::Address);
        assert!(matches!(field_type(&ty, "metadata"), Err(EncodingError::MissingField(_))));
    }

    #[test]
    fn test_parse_deadline() {
        assert_eq!(parse_deadline("2023-10-05T16:27:56Z").unwrap(), 1_696_523_276);
        assert!(parse_deadline("tomorrow").is_err());
    }

    #[test]
    fn test_parse_nat_rejects_negative() {
        assert!(parse_nat("amount", "-1").is_err());
        assert_eq!(parse_nat("amount", " 100 ").unwrap(), BigUint::from(100u32));
    }
}
