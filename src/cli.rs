//! Command line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::actions::factory::{self, DeployOracleArgs, DeployTokenArgs, UpdateImplementationArgs};
use crate::actions::originate::{self, OriginateArgs};
use crate::actions::status::{self, StatusArgs};
use crate::actions::token::{self, DelegatedTransferArgs, MintArgs};
use crate::actions::Report;
use crate::config::{rpc_url, EnvSource, ToolConfig};
use crate::error::Error;
use crate::tezos::HttpRpcClient;

#[derive(Debug, Parser)]
#[command(name = "tezos-ops")]
#[command(about = "Deploy and administer Backed token and oracle contracts on Tezos", long_about = None)]
pub struct Cli {
    /// TOML file with node, fee and confirmation settings.
    #[arg(short, long, env = "TEZOS_OPS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Originate a contract from Micheline JSON code and storage
    Originate(OriginateArgs),
    /// Deploy a Backed token through the token factory
    DeployToken(DeployTokenArgs),
    /// Deploy a Backed oracle through the oracle factory
    DeployOracle(DeployOracleArgs),
    /// Mint tokens on the Backed token
    Mint(MintArgs),
    /// Sign and submit a delegated transfer on the Backed token
    DelegatedTransfer(DelegatedTransferArgs),
    /// Replace the implementation a factory deploys
    UpdateImplementation(UpdateImplementationArgs),
    /// Look up an operation by hash
    Status(StatusArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Originate(_) => "originate",
            Command::DeployToken(_) => "deploy-token",
            Command::DeployOracle(_) => "deploy-oracle",
            Command::Mint(_) => "mint",
            Command::DelegatedTransfer(_) => "delegated-transfer",
            Command::UpdateImplementation(_) => "update-implementation",
            Command::Status(_) => "status",
        }
    }

    /// Run against the node named by `TEZOS_RPC_URL`.
    pub async fn run(&self, env: &dyn EnvSource, config: &ToolConfig) -> Result<Report, Error> {
        let url = rpc_url(env)?;
        let rpc = HttpRpcClient::new(&url, &config.node)?;

        match self {
            Command::Originate(args) => originate::originate(rpc, env, config, args).await,
            Command::DeployToken(args) => factory::deploy_token(rpc, env, config, args).await,
            Command::DeployOracle(args) => factory::deploy_oracle(rpc, env, config, args).await,
            Command::Mint(args) => token::mint(rpc, env, config, args).await,
            Command::DelegatedTransfer(args) => token::delegated_transfer(rpc, env, config, args).await,
            Command::UpdateImplementation(args) => factory::update_implementation(rpc, env, config, args).await,
            Command::Status(args) => status::status(rpc, config, args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::collections::HashMap;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_mint() {
        let cli = Cli::try_parse_from(["tezos-ops", "mint", "--recipient", "tz1abc", "--amount", "100"]).unwrap();
        assert_eq!(cli.command.name(), "mint");
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_delegated_transfer_defaults_nonce() {
        let cli = Cli::try_parse_from([
            "tezos-ops",
            "delegated-transfer",
            "--spender",
            "tz1abc",
            "--amount",
            "100",
            "--deadline",
            "2023-10-05T16:27:56Z",
        ])
        .unwrap();
        match cli.command {
            Command::DelegatedTransfer(args) => assert_eq!(args.nonce, "0"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_rpc_url_fails_before_any_request() {
        let cli = Cli::try_parse_from(["tezos-ops", "status", "ooTest"]).unwrap();
        let env: HashMap<String, String> = HashMap::new();
        let err = cli.command.run(&env, &ToolConfig::default()).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("TEZOS_RPC_URL"));
    }
}
