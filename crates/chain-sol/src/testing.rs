//! Scriptable in-memory [`SolanaRpc`] for tests.
//!
//! Each method pops the next scripted outcome from its queue; when the queue
//! is empty a deterministic default is returned (fresh blockhash per call,
//! zero compute units, counter-derived signatures). Every call is recorded.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::address::{Address, Blockhash, Signature};
use crate::error::RpcError;
use crate::rpc::{
    AccountInfo, LatestBlockhash, RpcContext, RpcResponse, SendTransactionConfig,
    SimulateTransactionConfig, SimulationResult, SolanaRpc,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcCall {
    GetLatestBlockhash,
    SimulateTransaction {
        wire_transaction_base64: String,
        config: SimulateTransactionConfig,
    },
    SendTransaction {
        wire_transaction_base64: String,
        config: SendTransactionConfig,
    },
    GetBalance(Address),
    GetAccountInfo(Address),
}

#[derive(Default)]
struct Script {
    blockhashes: VecDeque<Result<LatestBlockhash, RpcError>>,
    simulations: VecDeque<Result<SimulationResult, RpcError>>,
    sends: VecDeque<Result<Signature, RpcError>>,
    balances: HashMap<Address, u64>,
    accounts: HashMap<Address, AccountInfo>,
    calls: Vec<RpcCall>,
    counter: u8,
}

#[derive(Default)]
pub struct MockRpc {
    slot: u64,
    script: Mutex<Script>,
}

impl MockRpc {
    pub fn new() -> Self {
        Self {
            slot: 1,
            ..Self::default()
        }
    }

    /// The blockhash returned by the `n`th default `getLatestBlockhash` call
    /// (1-based), when nothing was scripted.
    pub fn default_blockhash(n: u8) -> LatestBlockhash {
        LatestBlockhash {
            blockhash: Blockhash::new([n; 32]),
            last_valid_block_height: 1_000 + n as u64,
        }
    }

    pub fn push_blockhash(&self, latest: LatestBlockhash) -> &Self {
        self.script.lock().blockhashes.push_back(Ok(latest));
        self
    }

    pub fn push_blockhash_error(&self, err: RpcError) -> &Self {
        self.script.lock().blockhashes.push_back(Err(err));
        self
    }

    pub fn push_simulation(&self, result: SimulationResult) -> &Self {
        self.script.lock().simulations.push_back(Ok(result));
        self
    }

    pub fn push_units_consumed(&self, units: u64) -> &Self {
        self.push_simulation(SimulationResult {
            units_consumed: Some(units),
            ..SimulationResult::default()
        })
    }

    pub fn push_simulation_error(&self, err: RpcError) -> &Self {
        self.script.lock().simulations.push_back(Err(err));
        self
    }

    pub fn push_signature(&self, signature: Signature) -> &Self {
        self.script.lock().sends.push_back(Ok(signature));
        self
    }

    pub fn push_send_error(&self, err: RpcError) -> &Self {
        self.script.lock().sends.push_back(Err(err));
        self
    }

    pub fn set_balance(&self, address: Address, lamports: u64) -> &Self {
        self.script.lock().balances.insert(address, lamports);
        self
    }

    pub fn set_account(&self, address: Address, account: AccountInfo) -> &Self {
        self.script.lock().accounts.insert(address, account);
        self
    }

    pub fn calls(&self) -> Vec<RpcCall> {
        self.script.lock().calls.clone()
    }

    pub fn blockhash_calls(&self) -> usize {
        self.count(|c| matches!(c, RpcCall::GetLatestBlockhash))
    }

    pub fn simulate_calls(&self) -> usize {
        self.count(|c| matches!(c, RpcCall::SimulateTransaction { .. }))
    }

    /// Base64 payloads handed to `sendTransaction`, in call order.
    pub fn sent_transactions(&self) -> Vec<String> {
        self.script
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RpcCall::SendTransaction {
                    wire_transaction_base64,
                    ..
                } => Some(wire_transaction_base64.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, f: impl Fn(&RpcCall) -> bool) -> usize {
        self.script.lock().calls.iter().filter(|c| f(c)).count()
    }

    fn respond<T>(&self, value: T) -> RpcResponse<T> {
        RpcResponse {
            context: RpcContext { slot: self.slot },
            value,
        }
    }
}

#[async_trait]
impl SolanaRpc for MockRpc {
    async fn get_latest_blockhash(&self) -> Result<RpcResponse<LatestBlockhash>, RpcError> {
        let next = {
            let mut script = self.script.lock();
            script.calls.push(RpcCall::GetLatestBlockhash);
            script.counter = script.counter.wrapping_add(1);
            let counter = script.counter;
            script
                .blockhashes
                .pop_front()
                .unwrap_or_else(|| Ok(Self::default_blockhash(counter)))
        };
        next.map(|latest| self.respond(latest))
    }

    async fn simulate_transaction(
        &self,
        wire_transaction_base64: &str,
        config: &SimulateTransactionConfig,
    ) -> Result<RpcResponse<SimulationResult>, RpcError> {
        let next = {
            let mut script = self.script.lock();
            script.calls.push(RpcCall::SimulateTransaction {
                wire_transaction_base64: wire_transaction_base64.to_string(),
                config: config.clone(),
            });
            script.simulations.pop_front().unwrap_or_else(|| {
                Ok(SimulationResult {
                    units_consumed: Some(0),
                    ..SimulationResult::default()
                })
            })
        };
        next.map(|result| self.respond(result))
    }

    async fn send_transaction(
        &self,
        wire_transaction_base64: &str,
        config: &SendTransactionConfig,
    ) -> Result<Signature, RpcError> {
        let mut script = self.script.lock();
        script.calls.push(RpcCall::SendTransaction {
            wire_transaction_base64: wire_transaction_base64.to_string(),
            config: config.clone(),
        });
        let sent = script
            .calls
            .iter()
            .filter(|c| matches!(c, RpcCall::SendTransaction { .. }))
            .count() as u8;
        script
            .sends
            .pop_front()
            .unwrap_or_else(|| Ok(Signature::new([sent; 64])))
    }

    async fn get_balance(&self, address: &Address) -> Result<RpcResponse<u64>, RpcError> {
        let lamports = {
            let mut script = self.script.lock();
            script.calls.push(RpcCall::GetBalance(*address));
            script.balances.get(address).copied().unwrap_or(0)
        };
        Ok(self.respond(lamports))
    }

    async fn get_account_info(
        &self,
        address: &Address,
    ) -> Result<RpcResponse<Option<AccountInfo>>, RpcError> {
        let account = {
            let mut script = self.script.lock();
            script.calls.push(RpcCall::GetAccountInfo(*address));
            script.accounts.get(address).cloned()
        };
        Ok(self.respond(account))
    }
}
