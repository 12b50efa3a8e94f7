//! End-to-end runs through the HTTP client against a mock node.

use std::collections::HashMap;

use clap::Parser;
use serde_json::json;

use tezos_ops::actions::token::execute_type;
use tezos_ops::cli::Cli;
use tezos_ops::config::env::RPC_URL_ENV;
use tezos_ops::config::{ContractRef, Role};
use tezos_ops::crypto::Address;
use tezos_ops::tezos::OperationStatus;

mod common;
use common::{fast_config, secret_key, start_mock_node, TOKEN_ADMIN_SEED};

fn env(rpc_url: String) -> HashMap<String, String> {
    HashMap::from([
        (RPC_URL_ENV.to_string(), rpc_url),
        (Role::TokenAdmin.key_env().to_string(), secret_key(TOKEN_ADMIN_SEED)),
        (ContractRef::Token.address_env().to_string(), Address::originated([7; 20]).to_string()),
    ])
}

#[tokio::test]
async fn test_mint_then_status() {
    let entrypoints = json!({ "execute": serde_json::to_value(execute_type().to_micheline()).unwrap() });
    let (addr, log) = start_mock_node(entrypoints).await;
    let env = env(format!("http://{addr}"));
    let config = fast_config();

    let recipient = Address::originated([1; 20]).to_string();
    let cli = Cli::try_parse_from(["tezos-ops", "mint", "--recipient", recipient.as_str(), "--amount", "100"]).unwrap();
    let report = cli.command.run(&env, &config).await.unwrap();

    let outcome = report.operation.unwrap();
    assert_eq!(outcome.block_level, 101);
    assert_eq!(outcome.confirmations, 1);
    assert_eq!(Some(outcome.hash.to_string()), log.lock().unwrap().injected);
    assert!(report.explorer_url.unwrap().ends_with(outcome.hash.as_str()));
    {
        let log = log.lock().unwrap();
        assert_eq!(log.hits.get("inject"), Some(&1));
        assert_eq!(log.hits.get("forge"), Some(&2));
        assert_eq!(log.hits.get("run_operation"), Some(&1));
    }

    let cli = Cli::try_parse_from(["tezos-ops", "status", outcome.hash.as_str(), "--lookback", "5"]).unwrap();
    let report = cli.command.run(&env, &config).await.unwrap();
    assert_eq!(report.status, Some(OperationStatus::Confirmed { block_level: 101, confirmations: 1 }));
}

#[tokio::test]
async fn test_unreachable_node_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let recipient = Address::originated([1; 20]).to_string();
    let cli = Cli::try_parse_from(["tezos-ops", "mint", "--recipient", recipient.as_str(), "--amount", "1"]).unwrap();
    let err = cli.command.run(&env(format!("http://{addr}")), &fast_config()).await.unwrap_err();
    assert_eq!(err.exit_code(), 4);
}
