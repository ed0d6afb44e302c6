//! Native SOL transfers.

use std::sync::Arc;

use async_trait::async_trait;
use chain_sol::{build_sol_transfer, Address, Signature, SolError, SolanaRpc, TransactionMessage};

use crate::controller::{resolve_authority, AsyncController, AuthorityProvider};
use crate::emitter::Subscription;
use crate::error::HookError;
use crate::send::{prepare_and_send, SendOptions};
use crate::signer::TransactionSigner;
use crate::state::AsyncState;

#[derive(Clone)]
pub struct SolTransferInput {
    pub destination: Address,
    pub lamports: u64,
    pub authority: Option<Arc<dyn TransactionSigner>>,
}

impl SolTransferInput {
    pub fn new(destination: Address, lamports: u64) -> Self {
        Self {
            destination,
            lamports,
            authority: None,
        }
    }

    #[must_use]
    pub fn with_authority(mut self, authority: Arc<dyn TransactionSigner>) -> Self {
        self.authority = Some(authority);
        self
    }
}

#[derive(Clone)]
pub struct SolTransfer {
    pub authority: Arc<dyn TransactionSigner>,
    pub destination: Address,
    pub lamports: u64,
}

#[async_trait]
pub trait SolTransferHelper: Send + Sync {
    async fn send_transfer(
        &self,
        transfer: SolTransfer,
        options: &SendOptions,
    ) -> Result<Signature, HookError>;
}

/// System-program transfers paid and signed by the authority.
pub struct SolHelper {
    rpc: Arc<dyn SolanaRpc>,
}

impl SolHelper {
    pub fn new(rpc: Arc<dyn SolanaRpc>) -> Self {
        Self { rpc }
    }

    pub fn build_transfer_message(
        &self,
        transfer: &SolTransfer,
    ) -> Result<TransactionMessage, HookError> {
        let from = transfer.authority.address();
        Ok(TransactionMessage::new()
            .with_fee_payer(from)
            .with_instruction(build_sol_transfer(
                &from,
                &transfer.destination,
                transfer.lamports,
            )?))
    }

    pub async fn fetch_balance(&self, address: &Address) -> Result<u64, HookError> {
        let response = self
            .rpc
            .get_balance(address)
            .await
            .map_err(SolError::from)?;
        Ok(response.value)
    }
}

#[async_trait]
impl SolTransferHelper for SolHelper {
    async fn send_transfer(
        &self,
        transfer: SolTransfer,
        options: &SendOptions,
    ) -> Result<Signature, HookError> {
        let message = self.build_transfer_message(&transfer)?;
        tracing::debug!(
            destination = %transfer.destination,
            lamports = transfer.lamports,
            "sending SOL transfer"
        );
        prepare_and_send(
            self.rpc.as_ref(),
            &message,
            transfer.authority.as_ref(),
            options,
        )
        .await
    }
}

/// Tracks SOL transfer sends. Only the authority needs resolving.
#[derive(Clone)]
pub struct SolTransferController {
    controller: AsyncController<Signature>,
    helper: Arc<dyn SolTransferHelper>,
    authority_provider: Option<AuthorityProvider>,
    options: SendOptions,
}

impl SolTransferController {
    pub fn new(helper: Arc<dyn SolTransferHelper>) -> Self {
        Self {
            controller: AsyncController::new("sol-transfer"),
            helper,
            authority_provider: None,
            options: SendOptions::default(),
        }
    }

    #[must_use]
    pub fn with_authority_provider(mut self, provider: AuthorityProvider) -> Self {
        self.authority_provider = Some(provider);
        self
    }

    #[must_use]
    pub fn with_send_options(mut self, options: SendOptions) -> Self {
        self.options = options;
        self
    }

    pub fn get_state(&self) -> AsyncState<Signature> {
        self.controller.get_state()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.controller.subscribe(listener)
    }

    pub fn reset(&self) {
        self.controller.reset();
    }

    pub async fn send(&self, input: SolTransferInput) -> Result<Signature, HookError> {
        self.send_with(input, &self.options).await
    }

    pub async fn send_with(
        &self,
        input: SolTransferInput,
        options: &SendOptions,
    ) -> Result<Signature, HookError> {
        let authority = resolve_authority(
            input.authority,
            self.authority_provider.as_ref(),
            "sending SOL",
        )?;
        let transfer = SolTransfer {
            authority,
            destination: input.destination,
            lamports: input.lamports,
        };
        self.controller
            .run(self.helper.send_transfer(transfer, options))
            .await
    }
}
