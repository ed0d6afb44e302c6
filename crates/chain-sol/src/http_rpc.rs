//! JSON-RPC 2.0 over HTTP implementation of [`SolanaRpc`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::address::{Address, Signature};
use crate::error::{RpcError, TransactionError};
use crate::rpc::{
    AccountInfo, Commitment, LatestBlockhash, RpcContext, RpcResponse, SendTransactionConfig,
    SimulateTransactionConfig, SimulationResult, SolanaRpc,
};

pub struct HttpRpcClient {
    http: reqwest::Client,
    url: String,
    commitment: Commitment,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct Envelope {
    result: Option<Value>,
    error: Option<ErrorObject>,
}

#[derive(Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSimulation {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    logs: Option<Vec<String>>,
    #[serde(default)]
    units_consumed: Option<Value>,
}

#[derive(Deserialize)]
struct RawAccount {
    lamports: u64,
    owner: Address,
    data: (String, String),
    executable: bool,
}

impl HttpRpcClient {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        commitment: Commitment,
    ) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
            commitment,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        tracing::trace!(method, id, "rpc request");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::HttpStatus(status.as_u16()));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;

        if let Some(error) = envelope.error {
            // Preflight failures carry the simulation outcome in `data.err`.
            let cause = error
                .data
                .as_ref()
                .and_then(|data| data.get("err"))
                .filter(|err| !err.is_null())
                .map(TransactionError::from_rpc_value);
            return Err(RpcError::Server {
                code: error.code,
                message: error.message,
                cause,
            });
        }

        let result = envelope
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method}: missing result")))?;
        serde_json::from_value(result)
            .map_err(|e| RpcError::InvalidResponse(format!("{method}: {e}")))
    }
}

#[async_trait]
impl SolanaRpc for HttpRpcClient {
    async fn get_latest_blockhash(&self) -> Result<RpcResponse<LatestBlockhash>, RpcError> {
        self.call(
            "getLatestBlockhash",
            json!([{"commitment": self.commitment}]),
        )
        .await
    }

    async fn simulate_transaction(
        &self,
        wire_transaction_base64: &str,
        config: &SimulateTransactionConfig,
    ) -> Result<RpcResponse<SimulationResult>, RpcError> {
        let raw: RpcResponse<RawSimulation> = self
            .call(
                "simulateTransaction",
                json!([wire_transaction_base64, config]),
            )
            .await?;

        Ok(RpcResponse {
            context: raw.context,
            value: SimulationResult {
                // Non-numeric values are treated as absent.
                units_consumed: raw.value.units_consumed.as_ref().and_then(Value::as_u64),
                logs: raw.value.logs,
                err: raw
                    .value
                    .err
                    .filter(|err| !err.is_null())
                    .map(|err| TransactionError::from_rpc_value(&err)),
            },
        })
    }

    async fn send_transaction(
        &self,
        wire_transaction_base64: &str,
        config: &SendTransactionConfig,
    ) -> Result<Signature, RpcError> {
        let signature: String = self
            .call("sendTransaction", json!([wire_transaction_base64, config]))
            .await?;
        signature
            .parse()
            .map_err(|e| RpcError::InvalidResponse(format!("sendTransaction: {e}")))
    }

    async fn get_balance(&self, address: &Address) -> Result<RpcResponse<u64>, RpcError> {
        self.call(
            "getBalance",
            json!([address, {"commitment": self.commitment}]),
        )
        .await
    }

    async fn get_account_info(
        &self,
        address: &Address,
    ) -> Result<RpcResponse<Option<AccountInfo>>, RpcError> {
        let raw: RpcResponse<Option<RawAccount>> = self
            .call(
                "getAccountInfo",
                json!([address, {"commitment": self.commitment, "encoding": "base64"}]),
            )
            .await?;

        let value = match raw.value {
            Some(account) => {
                let data = BASE64.decode(&account.data.0).map_err(|e| {
                    RpcError::InvalidResponse(format!("getAccountInfo: account data: {e}"))
                })?;
                Some(AccountInfo {
                    lamports: account.lamports,
                    owner: account.owner,
                    data,
                    executable: account.executable,
                })
            }
            None => None,
        };

        Ok(RpcResponse {
            context: RpcContext {
                slot: raw.context.slot,
            },
            value,
        })
    }
}
