//! Shared fixtures: an in-memory node for submitter scenarios and an HTTP
//! mock node for end-to-end runs.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value as JsonValue};
use tokio::net::TcpListener;

use tezos_ops::config::ToolConfig;
use tezos_ops::crypto::base58;
use tezos_ops::michelson::{Micheline, Type};
use tezos_ops::tezos::operation::{Content, UnsignedOperation};
use tezos_ops::tezos::rpc::{ApplyStatus, BlockHeader, ContentResult, Inclusion, OperationLookup, TezosRpc};
use tezos_ops::tezos::types::NodeError;
use tezos_ops::tezos::{OperationHash, TezosError, TezosResult, Wallet};

pub const TOKEN_ADMIN_SEED: [u8; 32] = [9; 32];

pub fn secret_key(seed: [u8; 32]) -> String {
    base58::encode(&base58::EDSK_SEED, &seed)
}

pub fn wallet() -> Wallet {
    Wallet::from_secret_key(&secret_key(TOKEN_ADMIN_SEED)).unwrap()
}

/// Configuration with polling fast enough for tests.
pub fn fast_config() -> ToolConfig {
    let mut config = ToolConfig::default();
    config.confirmation.poll_interval_ms = 1;
    config.confirmation.backoff_base_ms = 1;
    config.confirmation.backoff_max_ms = 5;
    config.confirmation.max_attempts = 5;
    config
}

/// Error trace of a script that failed with `reason`.
pub fn failwith(reason: &str) -> Vec<NodeError> {
    vec![
        NodeError {
            id: "proto.018-Proxford.michelson_v1.runtime_error".to_string(),
            kind: Some("temporary".to_string()),
            with: None,
            msg: None,
        },
        NodeError {
            id: "proto.018-Proxford.michelson_v1.script_rejected".to_string(),
            kind: Some("temporary".to_string()),
            with: Some(Micheline::string(reason)),
            msg: None,
        },
    ]
}

/// One scripted answer to `find_operation`.
#[derive(Debug, Clone)]
pub enum Lookup {
    Pending { head: u64 },
    Included { head: u64, level: u64 },
    Failed { head: u64, level: u64, reason: String },
    Unreachable,
}

#[derive(Debug, Default)]
pub struct NodeState {
    pub calls: Vec<&'static str>,
    pub head_level: u64,
    pub counter: u64,
    pub revealed: bool,
    pub balance: u64,
    pub entrypoints: BTreeMap<String, Micheline>,
    /// Error trace returned by the next simulation.
    pub simulation_errors: Option<Vec<NodeError>>,
    pub consumed_milligas: u64,
    pub paid_storage: u64,
    pub originated: Vec<String>,
    /// Failure returned by the next injection.
    pub inject_failure: Option<TezosError>,
    pub lookups: VecDeque<Lookup>,
    pub simulated: Option<UnsignedOperation>,
    pub injected: Option<OperationHash>,
}

/// In-memory node answering from scripted state.
#[derive(Debug, Clone)]
pub struct FakeNode {
    state: Arc<Mutex<NodeState>>,
}

impl FakeNode {
    pub fn new() -> Self {
        let state = NodeState {
            head_level: 100,
            counter: 41,
            revealed: true,
            balance: 10_000_000,
            consumed_milligas: 2_540_317,
            ..NodeState::default()
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub fn with_entrypoint(self, name: &str, ty: &Type) -> Self {
        self.state.lock().unwrap().entrypoints.insert(name.to_string(), ty.to_micheline());
        self
    }

    pub fn update(&self, f: impl FnOnce(&mut NodeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn simulated(&self) -> Option<UnsignedOperation> {
        self.state.lock().unwrap().simulated.clone()
    }

    pub fn injected(&self) -> Option<OperationHash> {
        self.state.lock().unwrap().injected.clone()
    }

    fn record(&self, call: &'static str) -> std::sync::MutexGuard<'_, NodeState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state
    }
}

fn applied(state: &NodeState, kind: &str) -> ContentResult {
    ContentResult {
        kind: kind.to_string(),
        status: ApplyStatus::Applied,
        consumed_milligas: state.consumed_milligas,
        paid_storage_size_diff: state.paid_storage,
        originated_contracts: state.originated.clone(),
        ..ContentResult::default()
    }
}

#[async_trait]
impl TezosRpc for FakeNode {
    async fn head(&self) -> TezosResult<BlockHeader> {
        let state = self.record("head");
        Ok(BlockHeader {
            hash: "BLockGenesisGenesisGenesisGenesisGenesisf79b5d1CoW2".to_string(),
            level: state.head_level,
            chain_id: "NetXnHfVqm9iesp".to_string(),
            protocol: "ProxfordYmVfjWnRcgjWH36fW6PArwqykTFzotUxRs6gmTcZDuH".to_string(),
        })
    }

    async fn counter(&self, _source: &tezos_ops::crypto::Address) -> TezosResult<u64> {
        Ok(self.record("counter").counter)
    }

    async fn manager_key(&self, _source: &tezos_ops::crypto::Address) -> TezosResult<Option<String>> {
        let state = self.record("manager_key");
        Ok(state.revealed.then(|| "edpk".to_string()))
    }

    async fn balance(&self, _address: &tezos_ops::crypto::Address) -> TezosResult<u64> {
        Ok(self.record("balance").balance)
    }

    async fn entrypoints(&self, contract: &tezos_ops::crypto::Address) -> TezosResult<BTreeMap<String, Micheline>> {
        let state = self.record("entrypoints");
        if state.entrypoints.is_empty() {
            return Err(TezosError::ContractNotFound(contract.to_string()));
        }
        Ok(state.entrypoints.clone())
    }

    async fn run_operation(&self, operation: &UnsignedOperation, _chain_id: &str) -> TezosResult<Vec<ContentResult>> {
        let mut state = self.record("run_operation");
        state.simulated = Some(operation.clone());
        let failure = state.simulation_errors.take();
        let results = operation
            .contents
            .iter()
            .enumerate()
            .map(|(i, content)| {
                let kind = match content {
                    Content::Reveal { .. } => "reveal",
                    Content::Transaction { .. } => "transaction",
                    Content::Origination { .. } => "origination",
                }
                .to_string();
                let last = i + 1 == operation.contents.len();
                match (&failure, last) {
                    (Some(errors), true) => ContentResult {
                        kind,
                        status: ApplyStatus::Failed,
                        errors: errors.clone(),
                        ..ContentResult::default()
                    },
                    _ => applied(&state, &kind),
                }
            })
            .collect();
        Ok(results)
    }

    async fn forge(&self, operation: &UnsignedOperation) -> TezosResult<Vec<u8>> {
        let _state = self.record("forge");
        Ok(serde_json::to_vec(operation).unwrap())
    }

    async fn inject(&self, signed: &[u8]) -> TezosResult<OperationHash> {
        let mut state = self.record("inject");
        if let Some(error) = state.inject_failure.take() {
            return Err(error);
        }
        let hash = OperationHash::from_signed_bytes(signed);
        state.injected = Some(hash.clone());
        Ok(hash)
    }

    async fn find_operation(&self, _hash: &OperationHash, _from_level: u64) -> TezosResult<OperationLookup> {
        let mut state = self.record("find_operation");
        let next = state.lookups.pop_front().unwrap_or(Lookup::Pending { head: state.head_level });
        let inclusion = |level: u64, results: Vec<ContentResult>| Inclusion {
            block_hash: format!("BLock{level}"),
            block_level: level,
            results,
        };
        match next {
            Lookup::Pending { head } => Ok(OperationLookup { head_level: head, inclusion: None }),
            Lookup::Included { head, level } => Ok(OperationLookup {
                head_level: head,
                inclusion: Some(inclusion(level, vec![applied(&state, "transaction")])),
            }),
            Lookup::Failed { head, level, reason } => Ok(OperationLookup {
                head_level: head,
                inclusion: Some(inclusion(
                    level,
                    vec![ContentResult {
                        kind: "transaction".to_string(),
                        status: ApplyStatus::Failed,
                        errors: failwith(&reason),
                        ..ContentResult::default()
                    }],
                )),
            }),
            Lookup::Unreachable => Err(TezosError::Transport("connection refused".to_string())),
        }
    }
}

/// Requests seen by the mock node, keyed by route.
#[derive(Debug, Default)]
pub struct MockLog {
    pub hits: HashMap<String, usize>,
    pub injected: Option<String>,
    pub head_level: u64,
}

#[derive(Clone)]
struct Mock {
    log: Arc<Mutex<MockLog>>,
    entrypoints: JsonValue,
}

impl Mock {
    fn hit(&self, route: &str) {
        *self.log.lock().unwrap().hits.entry(route.to_string()).or_default() += 1;
    }
}

fn applied_contents(contents: &JsonValue) -> JsonValue {
    let contents = contents.as_array().cloned().unwrap_or_default();
    JsonValue::Array(
        contents
            .into_iter()
            .map(|mut content| {
                content["metadata"] = json!({
                    "operation_result": { "status": "applied", "consumed_milligas": "2540317" }
                });
                content
            })
            .collect(),
    )
}

/// Start an HTTP mock node on an ephemeral port.
///
/// The head is at level 100 until an operation is injected, then moves to
/// 101 with the operation included there.
pub async fn start_mock_node(entrypoints: JsonValue) -> (SocketAddr, Arc<Mutex<MockLog>>) {
    let log = Arc::new(Mutex::new(MockLog { head_level: 100, ..MockLog::default() }));
    let mock = Mock { log: log.clone(), entrypoints };

    let app = Router::new()
        .route("/chains/main/blocks/head/header", get(header))
        .route("/chains/main/blocks/head/context/contracts/{address}/{field}", get(contract_field))
        .route("/chains/main/blocks/head/helpers/scripts/run_operation", post(run_operation))
        .route("/chains/main/blocks/head/helpers/forge/operations", post(forge))
        .route("/injection/operation", post(inject))
        .route("/chains/main/blocks/{level}/operations/3", get(block_operations))
        .route("/chains/main/blocks/{level}/hash", get(block_hash))
        .with_state(mock);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, log)
}

async fn header(State(mock): State<Mock>) -> Json<JsonValue> {
    mock.hit("header");
    let level = mock.log.lock().unwrap().head_level;
    Json(json!({
        "hash": format!("BLockHead{level}"),
        "level": level,
        "chain_id": "NetXnHfVqm9iesp",
        "protocol": "ProxfordYmVfjWnRcgjWH36fW6PArwqykTFzotUxRs6gmTcZDuH"
    }))
}

async fn contract_field(
    State(mock): State<Mock>,
    Path((_address, field)): Path<(String, String)>,
) -> Json<JsonValue> {
    mock.hit(&field);
    Json(match field.as_str() {
        "counter" => json!("41"),
        "balance" => json!("10000000"),
        "manager_key" => json!("edpkuBknW28nW72KG6RoHtYW7p12T6GKc7nAbwYX5m8Wd9sDVC9yav"),
        "entrypoints" => json!({ "entrypoints": mock.entrypoints }),
        _ => JsonValue::Null,
    })
}

async fn run_operation(State(mock): State<Mock>, Json(body): Json<JsonValue>) -> Json<JsonValue> {
    mock.hit("run_operation");
    Json(json!({ "contents": applied_contents(&body["operation"]["contents"]) }))
}

async fn forge(State(mock): State<Mock>, Json(body): Json<JsonValue>) -> Json<JsonValue> {
    mock.hit("forge");
    Json(json!(hex::encode(body.to_string())))
}

async fn inject(State(mock): State<Mock>, Json(signed): Json<String>) -> Json<JsonValue> {
    mock.hit("inject");
    let bytes = hex::decode(&signed).unwrap();
    let hash = OperationHash::from_signed_bytes(&bytes).to_string();
    let mut log = mock.log.lock().unwrap();
    log.injected = Some(hash.clone());
    log.head_level = 101;
    Json(json!(hash))
}

async fn block_operations(State(mock): State<Mock>, Path(level): Path<u64>) -> Json<JsonValue> {
    mock.hit("operations");
    let injected = mock.log.lock().unwrap().injected.clone();
    match injected {
        Some(hash) if level == 101 => Json(json!([{
            "hash": hash,
            "contents": [{
                "kind": "transaction",
                "metadata": { "operation_result": { "status": "applied", "consumed_milligas": "2540317" } }
            }]
        }])),
        _ => Json(json!([])),
    }
}

async fn block_hash(State(mock): State<Mock>, Path(level): Path<u64>) -> Json<JsonValue> {
    mock.hit("block_hash");
    Json(json!(format!("BLock{level}")))
}
