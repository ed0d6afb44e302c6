//! Turning a raw transaction message into one that is ready to sign.
//!
//! [`prepare_transaction`] runs three steps in order:
//!
//! 1. make sure the message declares a compute-unit limit, estimating one by
//!    simulation when it is missing or a reset is requested;
//! 2. bind (or refresh) the blockhash lifetime;
//! 3. hand the final base64 wire transaction to the optional `log_request`
//!    hook, exactly once.
//!
//! No step retries. RPC failures other than a budget-exceeded simulation
//! propagate to the caller.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compute_budget::{
    find_compute_unit_limit, set_compute_unit_limit, DEFAULT_COMPUTE_UNIT_LIMIT,
    MAX_COMPUTE_UNIT_LIMIT,
};
use crate::error::SolError;
use crate::estimate::estimate_compute_unit_limit;
use crate::rpc::SolanaRpc;
use crate::transaction::{base64_unsigned_transaction, TransactionMessage};

pub const DEFAULT_COMPUTE_UNIT_LIMIT_MULTIPLIER: f64 = 1.1;

fn default_multiplier() -> f64 {
    DEFAULT_COMPUTE_UNIT_LIMIT_MULTIPLIER
}

fn default_true() -> bool {
    true
}

/// Serializable preparation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrepareConfig {
    /// Safety margin applied to the simulated estimate.
    #[serde(default = "default_multiplier")]
    pub compute_unit_limit_multiplier: f64,

    /// Re-estimate even when a limit instruction is already present.
    #[serde(default)]
    pub compute_unit_limit_reset: bool,

    /// Replace an existing lifetime with a freshly fetched blockhash.
    #[serde(default = "default_true")]
    pub blockhash_reset: bool,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            compute_unit_limit_multiplier: DEFAULT_COMPUTE_UNIT_LIMIT_MULTIPLIER,
            compute_unit_limit_reset: false,
            blockhash_reset: true,
        }
    }
}

impl PrepareConfig {
    pub fn validate(&self) -> Result<(), SolError> {
        let multiplier = self.compute_unit_limit_multiplier;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(SolError::InvalidConfig(format!(
                "compute_unit_limit_multiplier must be a positive finite number, got {multiplier}"
            )));
        }
        Ok(())
    }
}

/// Payload handed to the `log_request` hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedRequest {
    pub base64_wire_transaction: String,
}

pub type LogRequestFn = Arc<dyn Fn(&LoggedRequest) + Send + Sync>;

/// [`PrepareConfig`] plus the optional reporting hook.
#[derive(Clone, Default)]
pub struct PrepareOptions {
    pub config: PrepareConfig,
    pub log_request: Option<LogRequestFn>,
}

impl fmt::Debug for PrepareOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrepareOptions")
            .field("config", &self.config)
            .field("log_request", &self.log_request.is_some())
            .finish()
    }
}

impl From<PrepareConfig> for PrepareOptions {
    fn from(config: PrepareConfig) -> Self {
        Self {
            config,
            log_request: None,
        }
    }
}

impl PrepareOptions {
    #[must_use]
    pub fn with_log_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&LoggedRequest) + Send + Sync + 'static,
    {
        self.log_request = Some(Arc::new(hook));
        self
    }
}

/// `clamp(ceil(raw × multiplier), 200_000, 1_400_000)`.
pub fn compute_unit_limit_from_estimate(raw: u64, multiplier: f64) -> u32 {
    let scaled = (raw as f64 * multiplier).ceil();
    // NaN fails both comparisons and lands on the floor.
    if scaled >= MAX_COMPUTE_UNIT_LIMIT as f64 {
        MAX_COMPUTE_UNIT_LIMIT
    } else if scaled > DEFAULT_COMPUTE_UNIT_LIMIT as f64 {
        scaled as u32
    } else {
        DEFAULT_COMPUTE_UNIT_LIMIT
    }
}

/// Return a copy of `message` with a compute-unit limit and a lifetime.
pub async fn prepare_transaction<R>(
    rpc: &R,
    message: &TransactionMessage,
    options: &PrepareOptions,
) -> Result<TransactionMessage, SolError>
where
    R: SolanaRpc + ?Sized,
{
    let config = &options.config;
    config.validate()?;
    if message.fee_payer().is_none() {
        return Err(SolError::MissingFeePayer);
    }

    let existing = find_compute_unit_limit(message);
    let mut prepared = if existing.is_none() || config.compute_unit_limit_reset {
        let raw = estimate_compute_unit_limit(rpc, message).await?;
        let units = compute_unit_limit_from_estimate(raw, config.compute_unit_limit_multiplier);
        tracing::debug!(raw, units, replaced = existing.is_some(), "compute unit limit");
        let limit = set_compute_unit_limit(units);
        match existing {
            Some(index) => message.with_instruction_at(index, limit)?,
            None => message.with_instruction(limit),
        }
    } else {
        message.clone()
    };

    if prepared.lifetime_constraint().is_none() || config.blockhash_reset {
        let latest = rpc.get_latest_blockhash().await?;
        tracing::debug!(
            blockhash = %latest.value.blockhash,
            last_valid_block_height = latest.value.last_valid_block_height,
            "bound transaction lifetime"
        );
        prepared = prepared.with_lifetime_constraint(latest.value.into());
    }

    if let Some(log_request) = &options.log_request {
        let request = LoggedRequest {
            base64_wire_transaction: base64_unsigned_transaction(&prepared)?,
        };
        tracing::trace!(wire = %request.base64_wire_transaction, "prepared transaction");
        log_request(&request);
    }

    Ok(prepared)
}
