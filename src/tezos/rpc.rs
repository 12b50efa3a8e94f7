//! The node RPC surface the submitter depends on, and the response model
//! shared by its implementations.
//!
//! [`HttpRpcClient`](crate::tezos::client::HttpRpcClient) talks to a real
//! node; tests substitute an in-memory fake.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::crypto::Address;
use crate::michelson::Micheline;
use crate::tezos::operation::UnsignedOperation;
use crate::tezos::types::{NodeError, OperationHash, TezosError, TezosResult};

/// Placeholder signature accepted by `run_operation`, which does not check it.
pub const SIMULATION_SIGNATURE: &str =
    "edsigtkpiSSschcaCt9pUVrpNPf7TTcgvgDEDD6NCEHMy8NNQJCGnMfLZzYoQj74yLjo9wx6MPVV29CvVzgi7qEcEUok3k7AuMg";

/// Header fields of the current head.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockHeader {
    pub hash: String,
    pub level: u64,
    pub chain_id: String,
    pub protocol: String,
}

/// Application status of one operation content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    Applied,
    #[default]
    Failed,
    Backtracked,
    Skipped,
}

/// Result of applying (or simulating) one content, internal results nested.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentResult {
    pub kind: String,
    pub status: ApplyStatus,
    pub consumed_milligas: u64,
    pub paid_storage_size_diff: u64,
    pub allocated_destination: bool,
    pub originated_contracts: Vec<String>,
    pub errors: Vec<NodeError>,
    pub internal: Vec<ContentResult>,
}

impl ContentResult {
    /// Gas units consumed, internal operations included, rounded up.
    pub fn consumed_gas(&self) -> u64 {
        let milligas = self.consumed_milligas + self.internal.iter().map(|r| r.consumed_milligas).sum::<u64>();
        milligas.div_ceil(1000)
    }

    /// Storage growth, internal operations included.
    pub fn paid_storage(&self) -> u64 {
        self.paid_storage_size_diff + self.internal.iter().map(|r| r.paid_storage_size_diff).sum::<u64>()
    }

    /// Contracts and accounts whose creation is charged a flat storage fee.
    pub fn allocations(&self) -> u64 {
        std::iter::once(self)
            .chain(self.internal.iter())
            .map(|r| r.originated_contracts.len() as u64 + u64::from(r.allocated_destination))
            .sum()
    }

    pub fn originated(&self) -> impl Iterator<Item = &String> {
        std::iter::once(self).chain(self.internal.iter()).flat_map(|r| r.originated_contracts.iter())
    }

    pub fn succeeded(&self) -> bool {
        self.status == ApplyStatus::Applied && self.internal.iter().all(|r| r.status == ApplyStatus::Applied)
    }
}

/// Every error reported across `results`, outer results first.
pub fn collect_errors(results: &[ContentResult]) -> Vec<NodeError> {
    results
        .iter()
        .flat_map(|r| std::iter::once(r).chain(r.internal.iter()))
        .flat_map(|r| r.errors.iter().cloned())
        .collect()
}

/// Human readable reason for a rejection.
///
/// A `FAILWITH` payload wins: strings are reported verbatim, other values as
/// Micheline JSON. Otherwise the error ids are listed.
pub fn rejection_reason(errors: &[NodeError]) -> String {
    if let Some(with) = errors.iter().find_map(|e| e.with.as_ref()) {
        return match with {
            Micheline::String { string } => string.clone(),
            other => other.to_string(),
        };
    }
    if errors.is_empty() {
        return "operation failed without an error trace".to_string();
    }
    errors.iter().map(|e| e.id.as_str()).collect::<Vec<_>>().join(", ")
}

/// Turn failed results into a rejection, or `None` if everything applied.
pub fn rejection(results: &[ContentResult], hash: Option<OperationHash>) -> Option<TezosError> {
    if results.iter().all(ContentResult::succeeded) {
        return None;
    }
    let errors = collect_errors(results);
    Some(TezosError::Rejected {
        reason: rejection_reason(&errors),
        errors: errors.into_iter().map(|e| e.id).collect(),
        hash,
    })
}

/// Where an operation landed.
#[derive(Debug, Clone, PartialEq)]
pub struct Inclusion {
    pub block_hash: String,
    pub block_level: u64,
    pub results: Vec<ContentResult>,
}

/// Answer to an inclusion search.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationLookup {
    /// Head level at the time of the search.
    pub head_level: u64,
    pub inclusion: Option<Inclusion>,
}

/// Node RPC calls used to build, submit and track operations.
#[async_trait]
pub trait TezosRpc: Send + Sync {
    /// Current head header.
    async fn head(&self) -> TezosResult<BlockHeader>;

    /// Last used counter of an implicit account.
    async fn counter(&self, source: &Address) -> TezosResult<u64>;

    /// Revealed public key, or `None` if the account is unrevealed.
    async fn manager_key(&self, source: &Address) -> TezosResult<Option<String>>;

    /// Spendable balance in mutez.
    async fn balance(&self, address: &Address) -> TezosResult<u64>;

    /// Entry point types of a contract. Fails with
    /// [`TezosError::ContractNotFound`] if no such contract exists.
    async fn entrypoints(&self, contract: &Address) -> TezosResult<BTreeMap<String, Micheline>>;

    /// Dry-run an operation against the head context.
    async fn run_operation(&self, operation: &UnsignedOperation, chain_id: &str) -> TezosResult<Vec<ContentResult>>;

    /// Binary form of an unsigned operation.
    async fn forge(&self, operation: &UnsignedOperation) -> TezosResult<Vec<u8>>;

    /// Broadcast a signed operation.
    async fn inject(&self, signed: &[u8]) -> TezosResult<OperationHash>;

    /// Search blocks from `from_level` up to the head for `hash`.
    async fn find_operation(&self, hash: &OperationHash, from_level: u64) -> TezosResult<OperationLookup>;
}

#[derive(Deserialize)]
struct RawContent {
    kind: String,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

#[derive(Deserialize)]
struct RawMetadata {
    #[serde(default)]
    operation_result: Option<RawResult>,
    #[serde(default)]
    internal_operation_results: Vec<RawInternal>,
}

#[derive(Deserialize)]
struct RawInternal {
    kind: String,
    result: RawResult,
}

#[derive(Deserialize)]
struct RawResult {
    #[serde(default)]
    status: ApplyStatus,
    #[serde(default)]
    consumed_milligas: Option<String>,
    #[serde(default)]
    paid_storage_size_diff: Option<String>,
    #[serde(default)]
    allocated_destination_contract: bool,
    #[serde(default)]
    originated_contracts: Vec<String>,
    #[serde(default)]
    errors: Vec<NodeError>,
}

fn parse_counter(field: &str, value: Option<String>) -> TezosResult<u64> {
    match value {
        None => Ok(0),
        Some(text) => text
            .parse()
            .map_err(|_| TezosError::Malformed(format!("{field} is not a number: '{text}'"))),
    }
}

impl RawResult {
    fn into_result(self, kind: String, internal: Vec<ContentResult>) -> TezosResult<ContentResult> {
        Ok(ContentResult {
            kind,
            status: self.status,
            consumed_milligas: parse_counter("consumed_milligas", self.consumed_milligas)?,
            paid_storage_size_diff: parse_counter("paid_storage_size_diff", self.paid_storage_size_diff)?,
            allocated_destination: self.allocated_destination_contract,
            originated_contracts: self.originated_contracts,
            errors: self.errors,
            internal,
        })
    }
}

/// Parse the `contents` array of an applied or simulated operation.
pub fn parse_contents(contents: serde_json::Value) -> TezosResult<Vec<ContentResult>> {
    let raw: Vec<RawContent> = serde_json::from_value(contents)
        .map_err(|e| TezosError::Malformed(format!("operation contents: {e}")))?;

    raw.into_iter()
        .map(|content| {
            let metadata = content
                .metadata
                .ok_or_else(|| TezosError::Malformed(format!("{} content without metadata", content.kind)))?;
            let internal = metadata
                .internal_operation_results
                .into_iter()
                .map(|i| i.result.into_result(i.kind, Vec::new()))
                .collect::<TezosResult<Vec<_>>>()?;
            let result = metadata
                .operation_result
                .ok_or_else(|| TezosError::Malformed(format!("{} content without result", content.kind)))?;
            result.into_result(content.kind, internal)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn simulated_mint() -> serde_json::Value {
        json!([{
            "kind": "transaction",
            "metadata": {
                "balance_updates": [],
                "operation_result": {
                    "status": "applied",
                    "consumed_milligas": "2540317",
                    "paid_storage_size_diff": "67",
                    "storage_size": "15380"
                },
                "internal_operation_results": [{
                    "kind": "event",
                    "source": "KT1BqKHXPT8ACHPMgkVmNVGNkCn96WCTYdX7",
                    "result": { "status": "applied", "consumed_milligas": "100000" }
                }]
            }
        }])
    }

    #[test]
    fn test_parse_simulation() {
        let results = parse_contents(simulated_mint()).unwrap();
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.succeeded());
        assert_eq!(result.consumed_gas(), 2_641);
        assert_eq!(result.paid_storage(), 67);
        assert_eq!(result.allocations(), 0);
        assert!(rejection(&results, None).is_none());
    }

    #[test]
    fn test_failwith_string_is_the_reason() {
        let results = parse_contents(json!([{
            "kind": "transaction",
            "metadata": {
                "operation_result": {
                    "status": "failed",
                    "errors": [
                        { "kind": "temporary", "id": "proto.018-Proxford.michelson_v1.runtime_error" },
                        {
                            "kind": "temporary",
                            "id": "proto.018-Proxford.michelson_v1.script_rejected",
                            "with": { "string": "BACKED_TOKEN_Nonce_Invalid" }
                        }
                    ]
                }
            }
        }]))
        .unwrap();

        match rejection(&results, None) {
            Some(TezosError::Rejected { reason, errors, hash }) => {
                assert_eq!(reason, "BACKED_TOKEN_Nonce_Invalid");
                assert_eq!(errors.len(), 2);
                assert!(hash.is_none());
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_non_string_failwith_and_plain_errors() {
        let pair = NodeError {
            id: "script_rejected".into(),
            kind: None,
            with: Some(Micheline::prim("Pair", vec![Micheline::int(1), Micheline::int(2)])),
            msg: None,
        };
        assert_eq!(rejection_reason(&[pair]), r#"{"prim":"Pair","args":[{"int":"1"},{"int":"2"}]}"#);

        let plain = NodeError { id: "contract.balance_too_low".into(), kind: None, with: None, msg: None };
        assert_eq!(rejection_reason(&[plain]), "contract.balance_too_low");
    }

    #[test]
    fn test_origination_allocations() {
        let results = parse_contents(json!([{
            "kind": "origination",
            "metadata": {
                "operation_result": {
                    "status": "applied",
                    "consumed_milligas": "1500",
                    "paid_storage_size_diff": "1000",
                    "originated_contracts": ["KT1BqKHXPT8ACHPMgkVmNVGNkCn96WCTYdX7"]
                }
            }
        }]))
        .unwrap();
        assert_eq!(results[0].allocations(), 1);
        assert_eq!(results[0].consumed_gas(), 2);
        assert_eq!(results[0].originated().count(), 1);
    }

    #[test]
    fn test_missing_metadata_is_malformed() {
        assert!(matches!(
            parse_contents(json!([{ "kind": "transaction" }])),
            Err(TezosError::Malformed(_))
        ));
    }
}
