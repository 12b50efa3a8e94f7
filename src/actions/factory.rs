//! Factory contract invocations: deploy tokens and oracles, replace the
//! action implementations new instances are created with.
//!
//! Argument types are read from the factory itself and filled by field
//! name, so a factory whose record layout changes keeps working as long as
//! the field names stay.

use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::actions::{field_type, parse_address, read_micheline, record_fields, text_value, Report};
use crate::config::{contract_address, ContractRef, EnvSource, Role, ToolConfig};
use crate::crypto::Address;
use crate::error::Error;
use crate::michelson::{EncodingError, Micheline, Type, Value};
use crate::tezos::{OperationRequest, OperationSubmitter, TezosError, TezosRpc, Wallet};

pub const DEPLOY_TOKEN_ENTRYPOINT: &str = "deployToken";
pub const DEPLOY_ORACLE_ENTRYPOINT: &str = "deployOracle";
pub const UPDATE_IMPLEMENTATION_ENTRYPOINT: &str = "updateImplementation";

#[derive(Debug, Clone, Args)]
pub struct DeployTokenArgs {
    /// Token name.
    #[arg(long)]
    pub name: String,

    /// Ticker symbol.
    #[arg(long)]
    pub symbol: String,

    #[arg(long, default_value = "18")]
    pub decimals: String,

    /// Icon URL.
    #[arg(long, default_value = "")]
    pub icon: String,

    /// Off-chain metadata URL.
    #[arg(long, default_value = "")]
    pub metadata: String,

    /// Owner of the new token. Defaults to the signing factory admin.
    #[arg(long)]
    pub owner: Option<String>,

    /// Defaults to the owner.
    #[arg(long)]
    pub minter: Option<String>,

    /// Defaults to the owner.
    #[arg(long)]
    pub burner: Option<String>,

    /// Defaults to the owner.
    #[arg(long)]
    pub pauser: Option<String>,
}

/// Resolved role addresses of a new token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRoles {
    pub owner: Address,
    pub minter: Address,
    pub burner: Address,
    pub pauser: Address,
}

impl TokenRoles {
    /// Parse the role arguments; unset roles fall back to the owner, an
    /// unset owner to `signer`.
    pub fn resolve(args: &DeployTokenArgs, signer: &Address) -> Result<Self, EncodingError> {
        let owner = match &args.owner {
            Some(text) => parse_address(text)?,
            None => signer.clone(),
        };
        let role = |arg: &Option<String>| -> Result<Address, EncodingError> {
            match arg {
                Some(text) => parse_address(text),
                None => Ok(owner.clone()),
            }
        };
        Ok(Self {
            minter: role(&args.minter)?,
            burner: role(&args.burner)?,
            pauser: role(&args.pauser)?,
            owner,
        })
    }
}

/// `deployToken` argument for the factory's declared type.
pub fn deploy_token_value(ty: &Type, args: &DeployTokenArgs, roles: &TokenRoles) -> Result<Value, EncodingError> {
    let text = |name: &'static str, value: &str| -> Result<(&'static str, Value), EncodingError> {
        Ok((name, text_value(field_type(ty, name)?, value)?))
    };
    Value::record(
        ty,
        [
            ("tokenOwner", Value::Address(roles.owner.clone())),
            ("minter", Value::Address(roles.minter.clone())),
            ("burner", Value::Address(roles.burner.clone())),
            ("pauser", Value::Address(roles.pauser.clone())),
            text("name", &args.name)?,
            text("symbol", &args.symbol)?,
            text("icon", &args.icon)?,
            text("decimals", &args.decimals)?,
            text("metadata", &args.metadata)?,
        ],
    )
}

/// Deploy a token through `BACKED_TOKEN_FACTORY`.
pub async fn deploy_token<R: TezosRpc>(
    rpc: R,
    env: &dyn EnvSource,
    config: &ToolConfig,
    args: &DeployTokenArgs,
) -> Result<Report, Error> {
    let wallet = Wallet::from_env(env, Role::TokenFactoryAdmin)?;
    let factory = contract_address(env, ContractRef::TokenFactory)?;
    let roles = TokenRoles::resolve(args, wallet.address())?;

    let submitter = OperationSubmitter::new(rpc, wallet, config);
    let ty = submitter.entrypoint_type(&factory, DEPLOY_TOKEN_ENTRYPOINT).await?;
    let value = deploy_token_value(&ty, args, &roles)?;
    let request = OperationRequest::call(factory.clone(), DEPLOY_TOKEN_ENTRYPOINT, ty, value)?;

    tracing::info!(contract = %factory, name = %args.name, symbol = %args.symbol, "Deploying token");
    let outcome = submitter.send(&request).await?;
    let summary = match outcome.originated_contracts.first() {
        Some(token) => format!("Backed token {} deployed at {}", args.symbol, token),
        None => format!("Backed token {} deployed", args.symbol),
    };

    Ok(Report::confirmed("deploy-token", summary, outcome, &config.node.explorer_url))
}

#[derive(Debug, Clone, Args)]
pub struct DeployOracleArgs {
    #[arg(long, default_value = "Backed Oracle")]
    pub description: String,

    #[arg(long, default_value = "18")]
    pub decimals: String,

    /// Owner of the new oracle. Defaults to the signing factory admin.
    #[arg(long)]
    pub owner: Option<String>,

    /// Account allowed to push prices. Defaults to the owner.
    #[arg(long)]
    pub updater: Option<String>,

    /// Off-chain metadata URL, for factories that accept one.
    #[arg(long)]
    pub metadata: Option<String>,
}

/// `deployOracle` argument for the factory's declared type.
///
/// `metadata` is only sent when the factory declares the field.
pub fn deploy_oracle_value(
    ty: &Type,
    args: &DeployOracleArgs,
    owner: &Address,
    updater: &Address,
) -> Result<Value, EncodingError> {
    let mut fields = vec![
        ("owner", Value::Address(owner.clone())),
        ("updater", Value::Address(updater.clone())),
        ("description", text_value(field_type(ty, "description")?, &args.description)?),
        ("decimals", text_value(field_type(ty, "decimals")?, &args.decimals)?),
    ];
    if let Ok(metadata_ty) = field_type(ty, "metadata") {
        let metadata = args.metadata.as_deref().unwrap_or_default();
        fields.push(("metadata", text_value(metadata_ty, metadata)?));
    } else if args.metadata.is_some() {
        tracing::warn!("Factory does not accept oracle metadata; ignoring --metadata");
    }
    Value::record(ty, fields)
}

/// Deploy an oracle through `BACKED_ORACLE_FACTORY`.
pub async fn deploy_oracle<R: TezosRpc>(
    rpc: R,
    env: &dyn EnvSource,
    config: &ToolConfig,
    args: &DeployOracleArgs,
) -> Result<Report, Error> {
    let wallet = Wallet::from_env(env, Role::OracleFactoryAdmin)?;
    let factory = contract_address(env, ContractRef::OracleFactory)?;
    let owner = match &args.owner {
        Some(text) => parse_address(text)?,
        None => wallet.address().clone(),
    };
    let updater = match &args.updater {
        Some(text) => parse_address(text)?,
        None => owner.clone(),
    };

    let submitter = OperationSubmitter::new(rpc, wallet, config);
    let ty = submitter.entrypoint_type(&factory, DEPLOY_ORACLE_ENTRYPOINT).await?;
    let value = deploy_oracle_value(&ty, args, &owner, &updater)?;
    let request = OperationRequest::call(factory.clone(), DEPLOY_ORACLE_ENTRYPOINT, ty, value)?;

    tracing::info!(contract = %factory, description = %args.description, "Deploying oracle");
    let outcome = submitter.send(&request).await?;
    let summary = oracle_summary(&outcome.originated_contracts);

    Ok(Report::confirmed("deploy-oracle", summary, outcome, &config.node.explorer_url))
}

/// Which factory an implementation update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FactoryKind {
    Token,
    Oracle,
}

impl FactoryKind {
    fn role(&self) -> Role {
        match self {
            FactoryKind::Token => Role::TokenFactoryAdmin,
            FactoryKind::Oracle => Role::OracleFactoryAdmin,
        }
    }

    fn contract(&self) -> ContractRef {
        match self {
            FactoryKind::Token => ContractRef::TokenFactory,
            FactoryKind::Oracle => ContractRef::OracleFactory,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct UpdateImplementationArgs {
    #[arg(long, value_enum, default_value_t = FactoryKind::Token)]
    pub factory: FactoryKind,

    /// Micheline JSON file with the new implementation map.
    #[arg(long)]
    pub implementation: PathBuf,
}

/// Type-check an implementation literal against the factory's declared
/// parameter type.
///
/// The parameter is either the implementation map itself or a record
/// holding it under `%implementation`.
pub fn implementation_argument(ty: &Type, implementation: &Micheline) -> Result<Micheline, EncodingError> {
    let target = match ty.strip() {
        Type::BigMap(..) | Type::Map(..) => ty,
        _ => field_type(ty, "implementation")?,
    };
    if record_fields(ty).len() > 1 {
        return Err(EncodingError::InvalidSchema(format!(
            "{UPDATE_IMPLEMENTATION_ENTRYPOINT} takes more than the implementation map: {ty}"
        )));
    }
    Value::from_micheline(target, implementation)?;
    Ok(implementation.clone())
}

/// Replace the implementation map of a factory.
pub async fn update_implementation<R: TezosRpc>(
    rpc: R,
    env: &dyn EnvSource,
    config: &ToolConfig,
    args: &UpdateImplementationArgs,
) -> Result<Report, Error> {
    let wallet = Wallet::from_env(env, args.factory.role())?;
    let factory = contract_address(env, args.factory.contract())?;
    let implementation = read_micheline(&args.implementation)?;

    let submitter = OperationSubmitter::new(rpc, wallet, config);
    let ty = submitter.entrypoint_type(&factory, UPDATE_IMPLEMENTATION_ENTRYPOINT).await?;
    let argument = implementation_argument(&ty, &implementation)?;
    let request = OperationRequest::call_raw(factory.clone(), UPDATE_IMPLEMENTATION_ENTRYPOINT, argument);

    tracing::info!(contract = %factory, factory = ?args.factory, "Updating implementation");
    let outcome = submitter.send(&request).await.map_err(|e| match e {
        TezosError::Rejected { reason, errors, hash } => TezosError::Rejected {
            reason: format!("{UPDATE_IMPLEMENTATION_ENTRYPOINT} rejected: {reason}"),
            errors,
            hash,
        },
        other => other,
    })?;

    Ok(Report::confirmed(
        "update-implementation",
        "Backed factory implementation successfully updated".to_string(),
        outcome,
        &config.node.explorer_url,
    ))
}

/// The factory originates the oracle first, then its forwarder.
pub fn oracle_summary(originated: &[String]) -> String {
    match originated {
        [] => "Backed oracle deployed".to_string(),
        [oracle] => format!("Backed oracle deployed at {oracle}"),
        [oracle, forwarders @ ..] => {
            format!("Backed oracle deployed at {oracle}, forwarder at {}", forwarders.join(", "))
        }
    }
}
