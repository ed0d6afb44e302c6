//! Client-side bindings over the Solana layer in `chain-sol`.
//!
//! Exposes observable controllers for SPL and SOL transfers and a
//! transaction pool, the signer seam they use, and a [`WalletClient`] that
//! wires them to the currently connected wallet.

pub mod client;
pub mod config;
pub mod controller;
pub mod emitter;
pub mod error;
pub mod pool;
pub mod send;
pub mod signer;
pub mod sol;
pub mod spl;
pub mod state;

pub use client::WalletClient;
pub use config::{init_tracing, ClientConfig, LogConfig, RpcConfig, SendConfig};
pub use controller::{AddressProvider, AsyncController, AuthorityProvider};
pub use emitter::Subscription;
pub use error::HookError;
pub use pool::TransactionPool;
pub use send::{prepare_and_send, sign_and_send, SendOptions};
pub use signer::{sign_transaction, KeypairSigner, TransactionSigner};
pub use sol::{SolHelper, SolTransfer, SolTransferController, SolTransferHelper, SolTransferInput};
pub use spl::{
    SplTokenHelper, SplTransfer, SplTransferController, SplTransferHelper, SplTransferInput,
};
pub use state::{AsyncState, AsyncStatus};
