//! Compute-unit estimation by simulation.

use std::borrow::Cow;

use crate::compute_budget::MAX_COMPUTE_UNIT_LIMIT;
use crate::error::{is_compute_budget_exceeded, SolError};
use crate::rpc::{SimulateTransactionConfig, SolanaRpc};
use crate::transaction::{base64_unsigned_transaction, TransactionMessage};

/// Simulate `message` and return the compute units it consumed.
///
/// A message without a lifetime is simulated against a freshly fetched
/// blockhash; the caller's value is never modified. Missing or non-numeric
/// `unitsConsumed` counts as 0. When the simulation fails because the
/// compute budget was exceeded (at any depth of the error chain) the
/// network maximum is returned instead of an error. Every other failure
/// propagates unchanged.
pub async fn estimate_compute_unit_limit<R>(
    rpc: &R,
    message: &TransactionMessage,
) -> Result<u64, SolError>
where
    R: SolanaRpc + ?Sized,
{
    match simulate_units(rpc, message).await {
        Ok(units) => Ok(units),
        Err(err) if is_compute_budget_exceeded(&err) => {
            tracing::debug!(
                max = MAX_COMPUTE_UNIT_LIMIT,
                error = %err,
                "compute budget exceeded during simulation, using maximum"
            );
            Ok(MAX_COMPUTE_UNIT_LIMIT as u64)
        }
        Err(err) => Err(err),
    }
}

async fn simulate_units<R>(rpc: &R, message: &TransactionMessage) -> Result<u64, SolError>
where
    R: SolanaRpc + ?Sized,
{
    let scratch = match message.lifetime_constraint() {
        Some(_) => Cow::Borrowed(message),
        None => {
            let latest = rpc.get_latest_blockhash().await?;
            Cow::Owned(message.with_lifetime_constraint(latest.value.into()))
        }
    };

    let wire = base64_unsigned_transaction(&scratch)?;
    tracing::debug!(
        instructions = scratch.instructions().len(),
        "simulating transaction for compute estimate"
    );
    let response = rpc
        .simulate_transaction(&wire, &SimulateTransactionConfig::for_estimate())
        .await?;
    let result = response.value;

    if let Some(source) = result.err {
        return Err(SolError::SimulationFailed {
            units_consumed: result.units_consumed,
            logs: result.logs.unwrap_or_default(),
            source,
        });
    }

    Ok(result.units_consumed.unwrap_or(0))
}
