//! Operation building, signing, injection and confirmation monitoring.
//!
//! # Flow
//! ```text
//! OperationRequest
//!     → entry point check (contract exists, type matches)
//!     → head, counter, reveal status
//!     → run_operation (simulated at the protocol caps)
//!     → gas / storage limits from the simulation plus buffers
//!     → forge, price by size and gas, forge again with the fee
//!     → balance check
//!     → sign, hash locally, inject
//!     → poll blocks until the required depth
//! ```
//!
//! Nothing is broadcast until every check before injection has passed. Once
//! injection has been attempted, errors carry the operation hash.

use std::time::Duration;

use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::config::{ConfirmationConfig, FeeConfig, ToolConfig};
use crate::crypto::Address;
use crate::michelson::{EncodingError, Type};
use crate::resilience::backoff::calculate_backoff;
use crate::tezos::operation::{Arguments, Content, Manager, OperationRequest, UnsignedOperation};
use crate::tezos::rpc::{rejection, rejection_reason, ContentResult, TezosRpc};
use crate::tezos::types::{
    OperationHash, OperationOutcome, OperationStatus, SubmittedOperation, TezosError, TezosResult,
};
use crate::tezos::wallet::Wallet;

/// Bytes a signature adds to the forged operation.
const SIGNATURE_SIZE: u64 = 64;

/// Fee for one content: flat part, gas part (rounded up), size part.
pub fn content_fee(fees: &FeeConfig, gas_limit: u64, size_bytes: u64) -> u64 {
    let gas_fee = gas_limit.saturating_mul(fees.nanotez_per_gas).div_ceil(1000);
    fees.minimal_fee_mutez
        .saturating_add(gas_fee)
        .saturating_add(size_bytes.saturating_mul(fees.mutez_per_byte))
}

/// Gas limit from a simulated result: consumption plus buffer, capped.
pub fn gas_limit(fees: &FeeConfig, result: &ContentResult) -> u64 {
    (result.consumed_gas() + fees.gas_buffer).min(fees.hard_gas_limit)
}

/// Storage limit from a simulated result: paid growth plus a flat charge
/// per allocation, plus buffer, capped.
pub fn storage_limit(fees: &FeeConfig, result: &ContentResult) -> u64 {
    let needed = result.paid_storage() + fees.origination_size * result.allocations();
    if needed == 0 {
        0
    } else {
        (needed + fees.storage_buffer).min(fees.hard_storage_limit)
    }
}

/// Builds, signs, injects and tracks operations for one wallet.
pub struct OperationSubmitter<R> {
    rpc: R,
    wallet: Wallet,
    fees: FeeConfig,
    confirmation: ConfirmationConfig,
}

impl<R: TezosRpc> OperationSubmitter<R> {
    pub fn new(rpc: R, wallet: Wallet, config: &ToolConfig) -> Self {
        Self {
            rpc,
            wallet,
            fees: config.fees.clone(),
            confirmation: ConfirmationConfig {
                // A zero period panics in `tokio::time::interval`.
                poll_interval_ms: config.confirmation.poll_interval_ms.max(1),
                ..config.confirmation.clone()
            },
        }
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Submit `request` and wait until it is confirmed.
    pub async fn send(&self, request: &OperationRequest) -> TezosResult<OperationOutcome> {
        let mut submitted = self.submit(request).await?;
        self.wait_for_confirmation(&mut submitted).await
    }

    /// Parameter type of `entrypoint` on `contract`, as the contract declares it.
    pub async fn entrypoint_type(&self, contract: &Address, entrypoint: &str) -> TezosResult<Type> {
        let entrypoints = self.rpc.entrypoints(contract).await?;
        let node = entrypoints.get(entrypoint).ok_or_else(|| TezosError::UnknownEntrypoint {
            contract: contract.to_string(),
            entrypoint: entrypoint.to_string(),
        })?;
        Ok(Type::from_micheline(node)?)
    }

    async fn check_call(&self, destination: &Address, entrypoint: &str, arguments: &Arguments) -> TezosResult<()> {
        let entrypoints = self.rpc.entrypoints(destination).await?;
        let declared = match entrypoints.get(entrypoint) {
            Some(node) => node,
            // Contracts without named entry points still accept `default`.
            None if entrypoint == "default" => return Ok(()),
            None => {
                return Err(TezosError::UnknownEntrypoint {
                    contract: destination.to_string(),
                    entrypoint: entrypoint.to_string(),
                })
            }
        };

        if let Arguments::Typed { ty, .. } = arguments {
            let declared = Type::from_micheline(declared)?;
            if !ty.matches(&declared) {
                return Err(EncodingError::TypeMismatch {
                    expected: declared.to_string(),
                    found: ty.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Build, simulate, price, sign and inject `request`.
    pub async fn submit(&self, request: &OperationRequest) -> TezosResult<SubmittedOperation> {
        request.validate()?;
        if let OperationRequest::Call { destination, entrypoint, arguments, .. } = request {
            self.check_call(destination, entrypoint, arguments).await?;
        }

        let source = self.wallet.address();
        let head = self.rpc.head().await?;
        let counter = self.rpc.counter(source).await?;
        let revealed = self.rpc.manager_key(source).await?.is_some();

        let mut contents = Vec::with_capacity(2);
        let mut next_counter = counter + 1;
        if !revealed {
            tracing::info!(address = %source, "Account not revealed, adding reveal");
            contents.push(Content::reveal(Manager::new(source, next_counter), self.wallet.public_key()));
            next_counter += 1;
        }
        contents.push(request.to_content(Manager::new(source, next_counter))?);

        for content in &mut contents {
            let manager = content.manager_mut();
            manager.gas_limit = self.fees.hard_gas_limit;
            manager.storage_limit = self.fees.hard_storage_limit;
        }
        let mut operation = UnsignedOperation { branch: head.hash.clone(), contents };

        let results = match self.rpc.run_operation(&operation, &head.chain_id).await {
            Ok(results) => results,
            Err(TezosError::Node { errors, .. }) if !errors.is_empty() => {
                return Err(TezosError::Rejected {
                    reason: rejection_reason(&errors),
                    errors: errors.into_iter().map(|e| e.id).collect(),
                    hash: None,
                })
            }
            Err(e) => return Err(e),
        };
        if let Some(rejected) = rejection(&results, None) {
            tracing::warn!(error = %rejected, "Simulation rejected the operation");
            return Err(rejected);
        }
        if results.len() != operation.contents.len() {
            return Err(TezosError::Malformed(format!(
                "simulation returned {} results for {} contents",
                results.len(),
                operation.contents.len()
            )));
        }

        for (content, result) in operation.contents.iter_mut().zip(&results) {
            let manager = content.manager_mut();
            manager.gas_limit = gas_limit(&self.fees, result);
            manager.storage_limit = storage_limit(&self.fees, result);
        }

        let forged = self.price(&mut operation).await?;
        self.check_funds(&operation).await?;

        let signature = self.wallet.sign_operation(&forged);
        let mut signed = forged;
        signed.extend_from_slice(signature.as_bytes());
        let hash = OperationHash::from_signed_bytes(&signed);

        tracing::info!(
            op_hash = %hash,
            kind = request.kind(),
            fee_mutez = operation.total_fee(),
            "Injecting operation"
        );

        let injected = match self.rpc.inject(&signed).await {
            Ok(node_hash) => {
                if node_hash != hash {
                    tracing::warn!(local = %hash, node = %node_hash, "Node reported a different operation hash");
                }
                node_hash
            }
            // Only a client error with a trace proves the node refused it.
            Err(TezosError::Node { status, errors, .. }) if (400..500).contains(&status) && !errors.is_empty() => {
                return Err(TezosError::Rejected {
                    reason: rejection_reason(&errors),
                    errors: errors.into_iter().map(|e| e.id).collect(),
                    hash: None,
                });
            }
            Err(e) => {
                tracing::error!(op_hash = %hash, error = %e, "Injection outcome unknown");
                return Err(TezosError::OutcomeUnknown { hash, reason: e.to_string() });
            }
        };

        Ok(SubmittedOperation {
            hash: injected,
            branch_level: head.level,
            confirmations_required: self.confirmation.required.max(1),
            fee_mutez: operation.total_fee(),
            status: OperationStatus::Pending,
        })
    }

    /// Set fees from the forged size and return the final forged bytes.
    ///
    /// The size part of the fee is charged on the last content, which also
    /// absorbs the growth of the fee fields themselves.
    async fn price(&self, operation: &mut UnsignedOperation) -> TezosResult<Vec<u8>> {
        let draft = self.rpc.forge(operation).await?;
        let size = draft.len() as u64 + SIGNATURE_SIZE + self.fees.size_buffer_bytes;

        let last = operation.contents.len().saturating_sub(1);
        for (i, content) in operation.contents.iter_mut().enumerate() {
            let manager = content.manager_mut();
            let size_part = if i == last { size } else { 0 };
            manager.fee = content_fee(&self.fees, manager.gas_limit, size_part);
        }

        let fee = operation.total_fee();
        if fee > self.fees.max_fee_mutez {
            return Err(TezosError::FeeTooHigh { fee, max: self.fees.max_fee_mutez });
        }

        let forged = self.rpc.forge(operation).await?;
        tracing::debug!(size = forged.len(), fee_mutez = fee, "Operation forged");
        Ok(forged)
    }

    async fn check_funds(&self, operation: &UnsignedOperation) -> TezosResult<()> {
        let required = operation.total_fee()
            + operation.total_spent()
            + operation.total_storage_limit() * self.fees.burn_mutez_per_byte;
        let balance = self.rpc.balance(self.wallet.address()).await?;
        if balance < required {
            return Err(TezosError::InsufficientFunds { balance, required });
        }
        Ok(())
    }

    /// Poll until `submitted` reaches the required depth, keeping its status
    /// current.
    ///
    /// Transient poll failures back off and count against the attempt budget.
    pub async fn wait_for_confirmation(&self, submitted: &mut SubmittedOperation) -> TezosResult<OperationOutcome> {
        let required = submitted.confirmations_required.max(1);
        let mut ticker = interval(Duration::from_millis(self.confirmation.poll_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut from_level = submitted.branch_level + 1;
        let mut failures = 0u32;

        for attempt in 1..=self.confirmation.max_attempts {
            ticker.tick().await;

            let lookup = match self.rpc.find_operation(&submitted.hash, from_level).await {
                Ok(lookup) => {
                    failures = 0;
                    lookup
                }
                Err(e) => {
                    failures += 1;
                    let delay = calculate_backoff(
                        failures,
                        self.confirmation.backoff_base_ms,
                        self.confirmation.backoff_max_ms,
                    );
                    tracing::warn!(
                        op_hash = %submitted.hash,
                        attempt,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Confirmation poll failed"
                    );
                    sleep(delay).await;
                    continue;
                }
            };

            let Some(inclusion) = lookup.inclusion else {
                tracing::debug!(op_hash = %submitted.hash, attempt, head_level = lookup.head_level, "Operation pending");
                submitted.status = OperationStatus::Pending;
                from_level = from_level.max(lookup.head_level + 1);
                continue;
            };

            if let Some(rejected) = rejection(&inclusion.results, Some(submitted.hash.clone())) {
                if let TezosError::Rejected { reason, .. } = &rejected {
                    submitted.status = OperationStatus::Failed { reason: reason.clone() };
                }
                tracing::error!(op_hash = %submitted.hash, level = inclusion.block_level, "Operation failed on chain");
                return Err(rejected);
            }

            let confirmations = lookup.head_level.saturating_sub(inclusion.block_level) + 1;
            if confirmations >= required {
                submitted.status = OperationStatus::Confirmed { block_level: inclusion.block_level, confirmations };
                tracing::info!(
                    op_hash = %submitted.hash,
                    level = inclusion.block_level,
                    confirmations,
                    "Operation confirmed"
                );
                return Ok(OperationOutcome {
                    hash: submitted.hash.clone(),
                    block_hash: inclusion.block_hash,
                    block_level: inclusion.block_level,
                    confirmations,
                    originated_contracts: inclusion.results.iter().flat_map(|r| r.originated()).cloned().collect(),
                    consumed_gas: inclusion.results.iter().map(ContentResult::consumed_gas).sum(),
                    fee_mutez: submitted.fee_mutez,
                });
            }

            submitted.status = OperationStatus::Confirming { current: confirmations, required };
            tracing::debug!(
                op_hash = %submitted.hash,
                confirmations,
                required,
                "Waiting for confirmations"
            );
            from_level = inclusion.block_level;
        }

        Err(TezosError::ConfirmationTimeout {
            hash: submitted.hash.clone(),
            attempts: self.confirmation.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(milligas: u64, paid: u64, originated: usize) -> ContentResult {
        ContentResult {
            consumed_milligas: milligas,
            paid_storage_size_diff: paid,
            originated_contracts: vec!["KT1".to_string(); originated],
            ..ContentResult::default()
        }
    }

    #[test]
    fn test_fee_formula() {
        let fees = FeeConfig::default();
        // 100 + ceil(2641 * 0.1) + 200 bytes
        assert_eq!(content_fee(&fees, 2_641, 200), 100 + 265 + 200);
        assert_eq!(content_fee(&fees, 0, 0), 100);
    }

    #[test]
    fn test_fee_saturates() {
        let fees = FeeConfig { nanotez_per_gas: u64::MAX, ..FeeConfig::default() };
        assert_eq!(content_fee(&fees, 2, 10), u64::MAX.div_ceil(1000) + 100 + 10);

        let fees = FeeConfig { mutez_per_byte: u64::MAX, ..FeeConfig::default() };
        assert_eq!(content_fee(&fees, 2_641, 200), u64::MAX);
    }

    #[test]
    fn test_limits_from_simulation() {
        let fees = FeeConfig::default();
        assert_eq!(gas_limit(&fees, &result(2_540_317, 0, 0)), 2_541 + 100);
        assert_eq!(gas_limit(&fees, &result(5_000_000_000, 0, 0)), fees.hard_gas_limit);

        assert_eq!(storage_limit(&fees, &result(0, 0, 0)), 0);
        assert_eq!(storage_limit(&fees, &result(0, 67, 0)), 67 + 20);
        assert_eq!(storage_limit(&fees, &result(0, 1_000, 1)), 1_000 + 257 + 20);
        assert_eq!(storage_limit(&fees, &result(0, 1_000_000, 0)), fees.hard_storage_limit);
    }
}
