use std::error::Error as StdError;

use serde_json::Value;
use thiserror::Error;

/// Solana chain operation errors.
#[derive(Debug, Clone, Error)]
pub enum SolError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("transaction message has no fee payer")]
    MissingFeePayer,

    #[error("transaction message has no lifetime constraint")]
    MissingLifetime,

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("transaction simulation failed: {source}")]
    SimulationFailed {
        units_consumed: Option<u64>,
        logs: Vec<String>,
        #[source]
        source: TransactionError,
    },
}

/// Failures raised by the RPC transport.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("JSON-RPC error {code}: {message}")]
    Server {
        code: i64,
        message: String,
        #[source]
        cause: Option<TransactionError>,
    },

    #[error("invalid RPC response: {0}")]
    InvalidResponse(String),
}

/// Why the runtime rejected a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("error processing instruction {index}: {source}")]
    InstructionError {
        index: u8,
        #[source]
        source: InstructionError,
    },

    #[error("blockhash not found")]
    BlockhashNotFound,

    #[error("attempt to load a program that does not exist")]
    AccountNotFound,

    #[error("insufficient funds for fee")]
    InsufficientFundsForFee,

    #[error("transaction already processed")]
    AlreadyProcessed,

    #[error("transaction error: {0}")]
    Other(String),
}

/// Why a single instruction failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstructionError {
    #[error("computational budget exceeded")]
    ComputationalBudgetExceeded,

    #[error("program failed to complete")]
    ProgramFailedToComplete,

    #[error("custom program error: {0:#x}")]
    Custom(u32),

    #[error("{0}")]
    Other(String),
}

impl TransactionError {
    /// Parse the `err` value of a simulation result or preflight failure.
    ///
    /// The RPC encodes unit variants as bare strings (`"BlockhashNotFound"`)
    /// and tuple variants as single-key objects
    /// (`{"InstructionError":[0,"ComputationalBudgetExceeded"]}`).
    pub fn from_rpc_value(value: &Value) -> Self {
        match value {
            Value::String(name) => match name.as_str() {
                "BlockhashNotFound" => Self::BlockhashNotFound,
                "AccountNotFound" => Self::AccountNotFound,
                "InsufficientFundsForFee" => Self::InsufficientFundsForFee,
                "AlreadyProcessed" => Self::AlreadyProcessed,
                other => Self::Other(other.to_string()),
            },
            Value::Object(map) => match map.get("InstructionError").and_then(Value::as_array) {
                Some(pair) if pair.len() == 2 => match pair[0].as_u64() {
                    Some(index) if index <= u8::MAX as u64 => Self::InstructionError {
                        index: index as u8,
                        source: InstructionError::from_rpc_value(&pair[1]),
                    },
                    _ => Self::Other(value.to_string()),
                },
                _ => Self::Other(value.to_string()),
            },
            other => Self::Other(other.to_string()),
        }
    }
}

impl InstructionError {
    pub fn from_rpc_value(value: &Value) -> Self {
        match value {
            Value::String(name) => match name.as_str() {
                "ComputationalBudgetExceeded" => Self::ComputationalBudgetExceeded,
                "ProgramFailedToComplete" => Self::ProgramFailedToComplete,
                other => Self::Other(other.to_string()),
            },
            Value::Object(map) => match map.get("Custom").and_then(Value::as_u64) {
                Some(code) if code <= u32::MAX as u64 => Self::Custom(code as u32),
                _ => Self::Other(value.to_string()),
            },
            other => Self::Other(other.to_string()),
        }
    }
}

/// Walk `err` and its `source()` chain, returning `true` if any link is a `K`
/// accepted by `predicate`.
pub fn error_chain_contains<K>(
    err: &(dyn StdError + 'static),
    mut predicate: impl FnMut(&K) -> bool,
) -> bool
where
    K: StdError + 'static,
{
    let mut current = Some(err);
    while let Some(link) = current {
        if let Some(kind) = link.downcast_ref::<K>() {
            if predicate(kind) {
                return true;
            }
        }
        current = link.source();
    }
    false
}

/// Whether the runtime reported `ComputationalBudgetExceeded` anywhere in the chain.
pub fn is_compute_budget_exceeded(err: &(dyn StdError + 'static)) -> bool {
    error_chain_contains::<InstructionError>(err, |e| {
        matches!(e, InstructionError::ComputationalBudgetExceeded)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_invalid_address() {
        let err = SolError::InvalidAddress("bad decode".into());
        assert_eq!(err.to_string(), "invalid address: bad decode");
    }

    #[test]
    fn display_missing_fee_payer() {
        assert_eq!(
            SolError::MissingFeePayer.to_string(),
            "transaction message has no fee payer"
        );
    }

    #[test]
    fn display_rpc_server_error() {
        let err = SolError::from(RpcError::Server {
            code: -32002,
            message: "preflight failure".into(),
            cause: None,
        });
        assert_eq!(
            err.to_string(),
            "RPC error: JSON-RPC error -32002: preflight failure"
        );
    }

    #[test]
    fn parse_instruction_error_budget_exceeded() {
        let parsed =
            TransactionError::from_rpc_value(&json!({"InstructionError": [1, "ComputationalBudgetExceeded"]}));
        assert_eq!(
            parsed,
            TransactionError::InstructionError {
                index: 1,
                source: InstructionError::ComputationalBudgetExceeded,
            }
        );
    }

    #[test]
    fn parse_custom_program_error() {
        let parsed = TransactionError::from_rpc_value(&json!({"InstructionError": [0, {"Custom": 6001}]}));
        assert_eq!(
            parsed,
            TransactionError::InstructionError {
                index: 0,
                source: InstructionError::Custom(6001),
            }
        );
        assert_eq!(
            parsed.to_string(),
            "error processing instruction 0: custom program error: 0x1771"
        );
    }

    #[test]
    fn parse_unit_and_unknown_variants() {
        assert_eq!(
            TransactionError::from_rpc_value(&json!("BlockhashNotFound")),
            TransactionError::BlockhashNotFound
        );
        assert_eq!(
            TransactionError::from_rpc_value(&json!("WouldExceedMaxBlockCostLimit")),
            TransactionError::Other("WouldExceedMaxBlockCostLimit".into())
        );
        assert!(matches!(
            TransactionError::from_rpc_value(&json!({"DuplicateInstruction": 3})),
            TransactionError::Other(_)
        ));
    }

    #[test]
    fn budget_exceeded_found_at_depth() {
        let err = SolError::Rpc(RpcError::Server {
            code: -32002,
            message: "Transaction simulation failed".into(),
            cause: Some(TransactionError::InstructionError {
                index: 0,
                source: InstructionError::ComputationalBudgetExceeded,
            }),
        });
        assert!(is_compute_budget_exceeded(&err));
    }

    #[test]
    fn budget_exceeded_found_through_simulation_failure() {
        let err = SolError::SimulationFailed {
            units_consumed: Some(200_000),
            logs: vec![],
            source: TransactionError::InstructionError {
                index: 2,
                source: InstructionError::ComputationalBudgetExceeded,
            },
        };
        assert!(is_compute_budget_exceeded(&err));
    }

    #[test]
    fn other_failures_are_not_budget_exceeded() {
        let err = SolError::SimulationFailed {
            units_consumed: None,
            logs: vec![],
            source: TransactionError::InstructionError {
                index: 0,
                source: InstructionError::Custom(1),
            },
        };
        assert!(!is_compute_budget_exceeded(&err));
        assert!(!is_compute_budget_exceeded(&SolError::Rpc(RpcError::Transport(
            "connection reset".into()
        ))));
    }

    #[test]
    fn chain_helper_matches_top_level_link() {
        let err = RpcError::HttpStatus(503);
        assert!(error_chain_contains::<RpcError>(&err, |e| matches!(
            e,
            RpcError::HttpStatus(503)
        )));
        assert!(!error_chain_contains::<TransactionError>(&err, |_| true));
    }
}
