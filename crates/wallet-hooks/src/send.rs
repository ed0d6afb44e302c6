use chain_sol::{
    base64_wire_transaction, prepare_transaction, PrepareOptions, SendTransactionConfig,
    Signature, SolanaRpc, TransactionMessage,
};

use crate::error::HookError;
use crate::signer::{sign_transaction, TransactionSigner};

/// How helpers prepare and submit a transaction.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub prepare: PrepareOptions,
    pub send: SendTransactionConfig,
}

/// Sign an already prepared message and submit it.
pub async fn sign_and_send(
    rpc: &dyn SolanaRpc,
    prepared: &TransactionMessage,
    signer: &dyn TransactionSigner,
    config: &SendTransactionConfig,
) -> Result<Signature, HookError> {
    let wire = sign_transaction(prepared, &[signer])?;
    let signature = rpc
        .send_transaction(&base64_wire_transaction(&wire), config)
        .await
        .map_err(chain_sol::SolError::from)?;
    tracing::debug!(%signature, "transaction sent");
    Ok(signature)
}

/// Prepare `message`, then sign and submit it.
pub async fn prepare_and_send(
    rpc: &dyn SolanaRpc,
    message: &TransactionMessage,
    signer: &dyn TransactionSigner,
    options: &SendOptions,
) -> Result<Signature, HookError> {
    let prepared = prepare_transaction(rpc, message, &options.prepare).await?;
    sign_and_send(rpc, &prepared, signer, &options.send).await
}
