//! RPC interface consumed by the estimator, the preparer and the send helpers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::{Address, Blockhash, Signature};
use crate::error::{RpcError, TransactionError};
use crate::transaction::LifetimeConstraint;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionEncoding {
    #[default]
    Base64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcContext {
    pub slot: u64,
}

/// A value read at `context.slot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponse<T> {
    pub context: RpcContext,
    pub value: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestBlockhash {
    pub blockhash: Blockhash,
    pub last_valid_block_height: u64,
}

impl From<LatestBlockhash> for LifetimeConstraint {
    fn from(latest: LatestBlockhash) -> Self {
        LifetimeConstraint {
            blockhash: latest.blockhash,
            last_valid_block_height: latest.last_valid_block_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateTransactionConfig {
    pub encoding: TransactionEncoding,
    pub replace_recent_blockhash: bool,
    pub sig_verify: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitment: Option<Commitment>,
}

impl SimulateTransactionConfig {
    /// Settings used for compute estimation: the transaction is unsigned and
    /// keeps its own blockhash.
    pub fn for_estimate() -> Self {
        Self {
            encoding: TransactionEncoding::Base64,
            replace_recent_blockhash: false,
            sig_verify: false,
            commitment: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationResult {
    pub units_consumed: Option<u64>,
    pub logs: Option<Vec<String>>,
    pub err: Option<TransactionError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionConfig {
    pub encoding: TransactionEncoding,
    pub skip_preflight: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preflight_commitment: Option<Commitment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub lamports: u64,
    pub owner: Address,
    pub data: Vec<u8>,
    pub executable: bool,
}

/// Abstraction over the JSON-RPC methods this crate needs.
#[async_trait]
pub trait SolanaRpc: Send + Sync {
    async fn get_latest_blockhash(&self) -> Result<RpcResponse<LatestBlockhash>, RpcError>;

    async fn simulate_transaction(
        &self,
        wire_transaction_base64: &str,
        config: &SimulateTransactionConfig,
    ) -> Result<RpcResponse<SimulationResult>, RpcError>;

    async fn send_transaction(
        &self,
        wire_transaction_base64: &str,
        config: &SendTransactionConfig,
    ) -> Result<Signature, RpcError>;

    async fn get_balance(&self, address: &Address) -> Result<RpcResponse<u64>, RpcError>;

    async fn get_account_info(
        &self,
        address: &Address,
    ) -> Result<RpcResponse<Option<AccountInfo>>, RpcError>;
}
