//! Wallet client: the RPC, the configuration and the connected wallet,
//! plus factories for controllers bound to that wallet.

use std::sync::Arc;

use chain_sol::{Address, HttpRpcClient, SolError, SolanaRpc};
use parking_lot::RwLock;

use crate::config::ClientConfig;
use crate::controller::{AddressProvider, AuthorityProvider};
use crate::emitter::{Emitter, Subscription};
use crate::error::HookError;
use crate::pool::TransactionPool;
use crate::send::SendOptions;
use crate::signer::TransactionSigner;
use crate::sol::{SolHelper, SolTransferController};
use crate::spl::{SplTokenHelper, SplTransferController};

type Slot = Arc<RwLock<Option<Arc<dyn TransactionSigner>>>>;

#[derive(Clone)]
pub struct WalletClient {
    rpc: Arc<dyn SolanaRpc>,
    config: ClientConfig,
    wallet: Slot,
    wallet_changes: Emitter,
}

impl WalletClient {
    pub fn new(rpc: Arc<dyn SolanaRpc>, config: ClientConfig) -> Self {
        Self {
            rpc,
            config,
            wallet: Arc::new(RwLock::new(None)),
            wallet_changes: Emitter::new(),
        }
    }

    /// Validate `config` and connect to its RPC endpoint over HTTP.
    pub fn from_config(config: ClientConfig) -> Result<Self, HookError> {
        config.validate()?;
        let rpc = HttpRpcClient::new(
            config.rpc.url.clone(),
            config.rpc.timeout(),
            config.rpc.commitment,
        )
        .map_err(SolError::from)?;
        Ok(Self::new(Arc::new(rpc), config))
    }

    pub fn rpc(&self) -> Arc<dyn SolanaRpc> {
        Arc::clone(&self.rpc)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn send_options(&self) -> SendOptions {
        self.config.send_options()
    }

    // -- wallet connection ----------------------------------------------------

    pub fn connect(&self, signer: Arc<dyn TransactionSigner>) {
        tracing::debug!(address = %signer.address(), "wallet connected");
        *self.wallet.write() = Some(signer);
        self.wallet_changes.emit();
    }

    /// Returns the wallet that was connected, if any.
    pub fn disconnect(&self) -> Option<Arc<dyn TransactionSigner>> {
        let previous = self.wallet.write().take();
        if previous.is_some() {
            tracing::debug!("wallet disconnected");
            self.wallet_changes.emit();
        }
        previous
    }

    pub fn wallet(&self) -> Option<Arc<dyn TransactionSigner>> {
        self.wallet.read().clone()
    }

    pub fn address(&self) -> Option<Address> {
        self.wallet.read().as_ref().map(|w| w.address())
    }

    pub fn subscribe_wallet<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.wallet_changes.subscribe(listener)
    }

    // -- queries --------------------------------------------------------------

    /// Lamport balance of `address`, or of the connected wallet.
    pub async fn balance(&self, address: Option<Address>) -> Result<u64, HookError> {
        let address = address
            .or_else(|| self.address())
            .ok_or(HookError::MissingAddress("reading a balance"))?;
        SolHelper::new(self.rpc()).fetch_balance(&address).await
    }

    // -- controllers ----------------------------------------------------------

    /// Providers read the connected wallet when a send starts, not when the
    /// controller is built.
    fn authority_provider(&self) -> AuthorityProvider {
        let wallet = Arc::clone(&self.wallet);
        Arc::new(move || wallet.read().clone())
    }

    fn address_provider(&self) -> AddressProvider {
        let wallet = Arc::clone(&self.wallet);
        Arc::new(move || wallet.read().as_ref().map(|w| w.address()))
    }

    pub fn spl_token_helper(&self, mint: Address) -> SplTokenHelper {
        SplTokenHelper::new(self.rpc(), mint)
    }

    pub fn spl_transfer_controller(&self, mint: Address) -> SplTransferController {
        SplTransferController::new(Arc::new(self.spl_token_helper(mint)))
            .with_authority_provider(self.authority_provider())
            .with_source_owner_provider(self.address_provider())
            .with_send_options(self.send_options())
    }

    pub fn sol_transfer_controller(&self) -> SolTransferController {
        SolTransferController::new(Arc::new(SolHelper::new(self.rpc())))
            .with_authority_provider(self.authority_provider())
            .with_send_options(self.send_options())
    }

    pub fn transaction_pool(&self) -> TransactionPool {
        TransactionPool::new(self.rpc())
            .with_authority_provider(self.authority_provider())
            .with_send_options(self.send_options())
    }
}
