//! Solana chain support for the wallet hooks.
//!
//! This crate handles Solana addresses, the legacy transaction wire format,
//! compute-budget and SPL token instructions, and the RPC-driven preparation
//! of a transaction message before it is signed. It does not depend on
//! `solana-sdk`: the wire format is implemented by hand and `bs58` encodes
//! addresses. Signing is left to the caller, which supplies signatures to
//! [`encode_wire_transaction`].

pub mod address;
pub mod compute_budget;
pub mod error;
pub mod estimate;
pub mod http_rpc;
pub mod prepare;
pub mod rpc;
pub mod spl_token;
pub mod system_program;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use address::{validate_address, Address, Blockhash, Signature};
pub use compute_budget::{
    find_compute_unit_limit, parse_compute_unit_limit, set_compute_unit_limit,
    set_compute_unit_price, COMPUTE_BUDGET_PROGRAM_ID, DEFAULT_COMPUTE_UNIT_LIMIT,
    MAX_COMPUTE_UNIT_LIMIT,
};
pub use error::{
    error_chain_contains, is_compute_budget_exceeded, InstructionError, RpcError, SolError,
    TransactionError,
};
pub use estimate::estimate_compute_unit_limit;
pub use http_rpc::HttpRpcClient;
pub use prepare::{
    compute_unit_limit_from_estimate, prepare_transaction, LogRequestFn, LoggedRequest,
    PrepareConfig, PrepareOptions,
};
pub use rpc::{
    AccountInfo, Commitment, LatestBlockhash, RpcResponse, SendTransactionConfig,
    SimulateTransactionConfig, SimulationResult, SolanaRpc,
};
pub use spl_token::{
    build_create_associated_token_account_idempotent, build_spl_transfer,
    derive_associated_token_address, ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
pub use system_program::{build_sol_transfer, SYSTEM_PROGRAM_ID};
pub use transaction::{
    base64_unsigned_transaction, base64_wire_transaction, compile_message,
    encode_wire_transaction, serialize_message, AccountMeta, CompiledMessage, Instruction,
    LifetimeConstraint, TransactionMessage,
};
