use chain_sol::SolError;
use thiserror::Error;

/// Errors raised by controllers, helpers and client setup.
///
/// `Clone` so a controller can publish the error into its observable state
/// and still return it to the caller.
#[derive(Debug, Clone, Error)]
pub enum HookError {
    #[error("Connect a wallet or supply an `authority` before {0}.")]
    MissingAuthority(&'static str),

    #[error("Unable to resolve a source owner for the SPL transfer.")]
    MissingSourceOwner,

    #[error("Connect a wallet or supply an address before {0}.")]
    MissingAddress(&'static str),

    #[error("Add at least one instruction to the transaction pool before {0}.")]
    EmptyTransactionPool(&'static str),

    #[error("SOL: {0}")]
    Chain(#[from] SolError),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
