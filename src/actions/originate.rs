//! Contract origination from Micheline JSON code and storage files.

use std::path::PathBuf;

use clap::Args;

use crate::actions::{read_micheline, Report};
use crate::config::{EnvSource, Role, ToolConfig};
use crate::error::Error;
use crate::michelson::{EncodingError, Micheline, Type, Value};
use crate::tezos::{OperationRequest, OperationSubmitter, TezosError, TezosRpc, Wallet};

#[derive(Debug, Clone, Args)]
pub struct OriginateArgs {
    /// Micheline JSON file with the contract code.
    #[arg(long)]
    pub code: PathBuf,

    /// Micheline JSON file with the initial storage.
    #[arg(long)]
    pub storage: PathBuf,

    /// Initial balance in mutez.
    #[arg(long, default_value_t = 0)]
    pub balance: u64,
}

/// The `storage` section of a contract's code.
pub fn storage_type(code: &Micheline) -> Result<&Micheline, EncodingError> {
    let Micheline::Seq(sections) = code else {
        return Err(EncodingError::InvalidSchema(format!("contract code must be a sequence, found {}", code.describe())));
    };
    sections
        .iter()
        .find_map(|section| match section {
            Micheline::Prim { prim, args, .. } if prim == "storage" && args.len() == 1 => Some(&args[0]),
            _ => None,
        })
        .ok_or_else(|| EncodingError::InvalidSchema("contract code has no storage section".to_string()))
}

/// Build an origination, checking the storage against the code's storage type.
///
/// Storage types outside the supported set (tickets, sapling states...) are
/// left to the node to check.
pub fn origination_request(code: Micheline, storage: Micheline, balance: u64) -> Result<OperationRequest, EncodingError> {
    match Type::from_micheline(storage_type(&code)?) {
        Ok(ty) => {
            Value::from_micheline(&ty, &storage)?;
        }
        Err(e) => tracing::warn!(error = %e, "Skipping local storage type check"),
    }
    Ok(OperationRequest::originate(code, storage, balance))
}

/// Originate a contract as the deployer.
pub async fn originate<R: TezosRpc>(
    rpc: R,
    env: &dyn EnvSource,
    config: &ToolConfig,
    args: &OriginateArgs,
) -> Result<Report, Error> {
    let wallet = Wallet::from_env(env, Role::Deployer)?;
    let request = origination_request(read_micheline(&args.code)?, read_micheline(&args.storage)?, args.balance)?;

    tracing::info!(code = %args.code.display(), balance_mutez = args.balance, "Originating contract");
    let outcome = OperationSubmitter::new(rpc, wallet, config).send(&request).await?;
    let contract = outcome
        .originated_contracts
        .first()
        .cloned()
        .ok_or_else(|| TezosError::Malformed("origination applied without an originated contract".to_string()))?;

    Ok(Report::confirmed(
        "originate",
        format!("Contract address: {contract}"),
        outcome,
        &config.node.explorer_url,
    ))
}
