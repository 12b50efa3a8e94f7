//! Reconcile an operation hash against the chain without submitting anything.
//!
//! Used after an unknown outcome or a confirmation timeout, before deciding
//! whether to submit again.

use clap::Args;

use crate::actions::{explorer_link, Report};
use crate::config::ToolConfig;
use crate::error::Error;
use crate::tezos::rpc::rejection;
use crate::tezos::{OperationHash, OperationStatus, TezosError, TezosResult, TezosRpc};

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    /// Operation hash (`o...`).
    pub hash: String,

    /// Blocks below the head to search. Defaults to the configured lookback.
    #[arg(long)]
    pub lookback: Option<u64>,
}

/// Status of `hash` within the last `lookback` blocks.
///
/// An operation not found in that window is reported as pending.
pub async fn operation_status<R: TezosRpc>(
    rpc: &R,
    hash: &OperationHash,
    lookback: u64,
    required: u64,
) -> TezosResult<OperationStatus> {
    let head = rpc.head().await?;
    let from_level = head.level.saturating_sub(lookback).max(1);
    let lookup = rpc.find_operation(hash, from_level).await?;

    let Some(inclusion) = lookup.inclusion else {
        return Ok(OperationStatus::Pending);
    };
    if let Some(TezosError::Rejected { reason, .. }) = rejection(&inclusion.results, Some(hash.clone())) {
        return Ok(OperationStatus::Failed { reason });
    }

    let confirmations = lookup.head_level.saturating_sub(inclusion.block_level) + 1;
    Ok(if confirmations >= required.max(1) {
        OperationStatus::Confirmed { block_level: inclusion.block_level, confirmations }
    } else {
        OperationStatus::Confirming { current: confirmations, required }
    })
}

pub async fn status<R: TezosRpc>(rpc: R, config: &ToolConfig, args: &StatusArgs) -> Result<Report, Error> {
    let hash: OperationHash = args
        .hash
        .trim()
        .parse()
        .map_err(|e: TezosError| Error::InvalidArgument { name: "operation hash", reason: e.to_string() })?;
    let lookback = args.lookback.unwrap_or(config.confirmation.status_lookback_blocks);

    let status = operation_status(&rpc, &hash, lookback, config.confirmation.required).await?;
    let summary = match &status {
        OperationStatus::Pending => format!("Operation {hash} not found in the last {lookback} blocks"),
        OperationStatus::Confirming { current, required } => {
            format!("Operation {hash} included, {current} of {required} confirmations")
        }
        OperationStatus::Confirmed { block_level, confirmations } => {
            format!("Operation {hash} confirmed at level {block_level} ({confirmations} confirmations)")
        }
        OperationStatus::Failed { reason } => format!("Operation {hash} failed: {reason}"),
    };

    Ok(Report {
        action: "status",
        summary,
        operation: None,
        explorer_url: Some(explorer_link(&config.node.explorer_url, hash.as_str())),
        status: Some(status),
    })
}
