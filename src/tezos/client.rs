//! Node RPC client over HTTP with timeout and error handling.
//!
//! # Responsibilities
//! - Query chain state (head, counters, balances, entry points)
//! - Simulate, forge and inject operations
//! - Scan blocks for an injected operation
//! - Map transport failures, timeouts and node error traces to [`TezosError`]

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::NodeConfig;
use crate::crypto::Address;
use crate::michelson::Micheline;
use crate::tezos::operation::{Content, UnsignedOperation};
use crate::tezos::rpc::{
    parse_contents, BlockHeader, ContentResult, Inclusion, OperationLookup, TezosRpc, SIMULATION_SIGNATURE,
};
use crate::tezos::types::{NodeError, OperationHash, TezosError, TezosResult};

/// Validation pass holding manager operations.
const MANAGER_PASS: usize = 3;

/// HTTP client for a single node.
#[derive(Debug, Clone)]
pub struct HttpRpcClient {
    http: reqwest::Client,
    base: Url,
    chain: String,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct EntrypointsResponse {
    entrypoints: BTreeMap<String, Micheline>,
}

#[derive(Deserialize)]
struct RunOperationResponse {
    contents: serde_json::Value,
}

#[derive(Deserialize)]
struct BlockOperation {
    hash: String,
    contents: serde_json::Value,
}

#[derive(Serialize)]
struct SignedForSimulation<'a> {
    branch: &'a str,
    contents: &'a [Content],
    signature: &'static str,
}

#[derive(Serialize)]
struct RunOperationRequest<'a> {
    operation: SignedForSimulation<'a>,
    chain_id: &'a str,
}

impl HttpRpcClient {
    /// Create a client for the node at `rpc_url`.
    pub fn new(rpc_url: &Url, config: &NodeConfig) -> TezosResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.rpc_timeout_secs))
            .build()
            .map_err(|e| TezosError::Transport(format!("Failed to build HTTP client: {e}")))?;

        // Url::join drops the last path segment unless the base ends in '/'.
        let mut base = rpc_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        tracing::info!(rpc_url = %base, chain = %config.chain, "Node client initialized");

        Ok(Self { http, base, chain: config.chain.clone(), timeout_secs: config.rpc_timeout_secs })
    }

    fn url(&self, path: &str) -> TezosResult<Url> {
        self.base
            .join(path)
            .map_err(|e| TezosError::Transport(format!("Invalid RPC path '{path}': {e}")))
    }

    fn block_path(&self, block: &str, rest: &str) -> String {
        format!("chains/{}/blocks/{}/{}", self.chain, block, rest)
    }

    fn send_error(&self, path: &str, e: reqwest::Error) -> TezosError {
        if e.is_timeout() {
            tracing::warn!(path, timeout_secs = self.timeout_secs, "RPC timeout");
            TezosError::Timeout(self.timeout_secs)
        } else {
            tracing::warn!(path, error = %e, "RPC error");
            TezosError::Transport(e.to_string())
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> TezosResult<T> {
        let response = self
            .http
            .get(self.url(path)?)
            .send()
            .await
            .map_err(|e| self.send_error(path, e))?;
        self.read(path, response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> TezosResult<T> {
        let response = self
            .http
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .map_err(|e| self.send_error(path, e))?;
        self.read(path, response).await
    }

    async fn read<T: DeserializeOwned>(&self, path: &str, response: reqwest::Response) -> TezosResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.send_error(path, e))?;

        if !status.is_success() {
            let errors: Vec<NodeError> = serde_json::from_str(&body).unwrap_or_default();
            let message = if errors.is_empty() {
                body.trim().to_string()
            } else {
                errors.iter().map(|e| e.id.as_str()).collect::<Vec<_>>().join(", ")
            };
            tracing::debug!(path, status = status.as_u16(), %message, "Node returned an error");
            return Err(TezosError::Node { status: status.as_u16(), message, errors });
        }

        serde_json::from_str(&body).map_err(|e| TezosError::Malformed(format!("{path}: {e}")))
    }

    fn contract_path(&self, address: &Address, rest: &str) -> String {
        self.block_path("head", &format!("context/contracts/{}/{}", address.without_entrypoint(), rest))
    }
}

fn parse_amount(field: &str, text: String) -> TezosResult<u64> {
    text.parse()
        .map_err(|_| TezosError::Malformed(format!("{field} is not a number: '{text}'")))
}

#[async_trait]
impl TezosRpc for HttpRpcClient {
    async fn head(&self) -> TezosResult<BlockHeader> {
        self.get(&self.block_path("head", "header")).await
    }

    async fn counter(&self, source: &Address) -> TezosResult<u64> {
        let text: String = self.get(&self.contract_path(source, "counter")).await?;
        parse_amount("counter", text)
    }

    async fn manager_key(&self, source: &Address) -> TezosResult<Option<String>> {
        self.get(&self.contract_path(source, "manager_key")).await
    }

    async fn balance(&self, address: &Address) -> TezosResult<u64> {
        let text: String = self.get(&self.contract_path(address, "balance")).await?;
        parse_amount("balance", text)
    }

    async fn entrypoints(&self, contract: &Address) -> TezosResult<BTreeMap<String, Micheline>> {
        match self.get::<EntrypointsResponse>(&self.contract_path(contract, "entrypoints")).await {
            Ok(response) => Ok(response.entrypoints),
            Err(TezosError::Node { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(TezosError::ContractNotFound(contract.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn run_operation(&self, operation: &UnsignedOperation, chain_id: &str) -> TezosResult<Vec<ContentResult>> {
        let body = RunOperationRequest {
            operation: SignedForSimulation {
                branch: &operation.branch,
                contents: &operation.contents,
                signature: SIMULATION_SIGNATURE,
            },
            chain_id,
        };
        let response: RunOperationResponse =
            self.post(&self.block_path("head", "helpers/scripts/run_operation"), &body).await?;
        parse_contents(response.contents)
    }

    async fn forge(&self, operation: &UnsignedOperation) -> TezosResult<Vec<u8>> {
        let forged: String = self.post(&self.block_path("head", "helpers/forge/operations"), operation).await?;
        hex::decode(forged.trim()).map_err(|e| TezosError::Malformed(format!("forged operation: {e}")))
    }

    async fn inject(&self, signed: &[u8]) -> TezosResult<OperationHash> {
        let path = format!("injection/operation?chain={}", self.chain);
        let hash: String = self.post(&path, &hex::encode(signed)).await?;
        hash.parse()
    }

    async fn find_operation(&self, hash: &OperationHash, from_level: u64) -> TezosResult<OperationLookup> {
        let head = self.head().await?;

        for level in from_level.max(1)..=head.level {
            let block = level.to_string();
            let operations: Vec<BlockOperation> = self
                .get(&self.block_path(&block, &format!("operations/{MANAGER_PASS}")))
                .await?;

            if let Some(found) = operations.into_iter().find(|op| op.hash == hash.as_str()) {
                let block_hash: String = self.get(&self.block_path(&block, "hash")).await?;
                tracing::debug!(op_hash = %hash, level, "Operation found in block");
                return Ok(OperationLookup {
                    head_level: head.level,
                    inclusion: Some(Inclusion { block_hash, block_level: level, results: parse_contents(found.contents)? }),
                });
            }
        }

        Ok(OperationLookup { head_level: head.level, inclusion: None })
    }
}
