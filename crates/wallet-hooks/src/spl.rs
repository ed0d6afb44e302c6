//! SPL token transfers: the helper that builds and sends them, and the
//! controller that tracks one send at a time.

use std::sync::Arc;

use async_trait::async_trait;
use chain_sol::{
    build_create_associated_token_account_idempotent, build_spl_transfer,
    derive_associated_token_address, Address, Signature, SolError, SolanaRpc,
    TransactionMessage, TOKEN_PROGRAM_ID,
};

use crate::controller::{resolve_authority, AddressProvider, AsyncController, AuthorityProvider};
use crate::emitter::Subscription;
use crate::error::HookError;
use crate::send::{prepare_and_send, SendOptions};
use crate::signer::TransactionSigner;
use crate::state::AsyncState;

/// Caller-facing transfer request. `authority` and `source_owner` fall back
/// to the controller's providers when omitted.
#[derive(Clone)]
pub struct SplTransferInput {
    pub destination_owner: Address,
    /// Amount in the mint's base units.
    pub amount: u64,
    pub authority: Option<Arc<dyn TransactionSigner>>,
    pub source_owner: Option<Address>,
    /// Prepend an idempotent create of the destination token account.
    pub ensure_destination_ata: bool,
}

impl SplTransferInput {
    pub fn new(destination_owner: Address, amount: u64) -> Self {
        Self {
            destination_owner,
            amount,
            authority: None,
            source_owner: None,
            ensure_destination_ata: true,
        }
    }

    #[must_use]
    pub fn with_authority(mut self, authority: Arc<dyn TransactionSigner>) -> Self {
        self.authority = Some(authority);
        self
    }

    #[must_use]
    pub fn with_source_owner(mut self, owner: Address) -> Self {
        self.source_owner = Some(owner);
        self
    }
}

/// A transfer with every field resolved.
#[derive(Clone)]
pub struct SplTransfer {
    pub authority: Arc<dyn TransactionSigner>,
    pub source_owner: Address,
    pub destination_owner: Address,
    pub amount: u64,
    pub ensure_destination_ata: bool,
}

#[async_trait]
pub trait SplTransferHelper: Send + Sync {
    async fn send_transfer(
        &self,
        transfer: SplTransfer,
        options: &SendOptions,
    ) -> Result<Signature, HookError>;
}

/// SPL token operations for a single mint.
pub struct SplTokenHelper {
    rpc: Arc<dyn SolanaRpc>,
    mint: Address,
}

impl SplTokenHelper {
    pub fn new(rpc: Arc<dyn SolanaRpc>, mint: Address) -> Self {
        Self { rpc, mint }
    }

    pub fn mint(&self) -> &Address {
        &self.mint
    }

    pub fn associated_token_address(&self, owner: &Address) -> Result<Address, HookError> {
        Ok(derive_associated_token_address(owner, &self.mint)?)
    }

    /// Unprepared message moving `amount` from the source owner's token
    /// account to the destination owner's. The authority pays fees.
    pub fn build_transfer_message(
        &self,
        transfer: &SplTransfer,
    ) -> Result<TransactionMessage, HookError> {
        let payer = transfer.authority.address();
        let source = self.associated_token_address(&transfer.source_owner)?;
        let destination = self.associated_token_address(&transfer.destination_owner)?;

        let mut message = TransactionMessage::new().with_fee_payer(payer);
        if transfer.ensure_destination_ata {
            message = message.with_instruction(build_create_associated_token_account_idempotent(
                &payer,
                &transfer.destination_owner,
                &self.mint,
            )?);
        }
        Ok(message.with_instruction(build_spl_transfer(
            &source,
            &destination,
            &payer,
            transfer.amount,
        )?))
    }

    /// Token balance of `owner`'s associated account, or `None` if the
    /// account does not exist.
    pub async fn fetch_balance(&self, owner: &Address) -> Result<Option<u64>, HookError> {
        let ata = self.associated_token_address(owner)?;
        let response = self
            .rpc
            .get_account_info(&ata)
            .await
            .map_err(SolError::from)?;
        let Some(account) = response.value else {
            return Ok(None);
        };
        if account.owner != TOKEN_PROGRAM_ID {
            return Err(SolError::InvalidAddress(format!("{ata} is not a token account")).into());
        }
        // Token account layout: mint (32) || owner (32) || amount (u64 LE) || ...
        let amount: [u8; 8] = account
            .data
            .get(64..72)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| {
                SolError::SerializationError(format!("{ata}: token account data too short"))
            })?;
        Ok(Some(u64::from_le_bytes(amount)))
    }
}

#[async_trait]
impl SplTransferHelper for SplTokenHelper {
    async fn send_transfer(
        &self,
        transfer: SplTransfer,
        options: &SendOptions,
    ) -> Result<Signature, HookError> {
        let message = self.build_transfer_message(&transfer)?;
        tracing::debug!(
            mint = %self.mint,
            destination_owner = %transfer.destination_owner,
            amount = transfer.amount,
            "sending SPL transfer"
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

/// Tracks SPL transfer sends.
#[derive(Clone)]
pub struct SplTransferController {
    controller: AsyncController<Signature>,
    helper: Arc<dyn SplTransferHelper>,
    authority_provider: Option<AuthorityProvider>,
    source_owner_provider: Option<AddressProvider>,
    options: SendOptions,
}

impl SplTransferController {
    pub fn new(helper: Arc<dyn SplTransferHelper>) -> Self {
        Self {
            controller: AsyncController::new("spl-transfer"),
            helper,
            authority_provider: None,
            source_owner_provider: None,
            options: SendOptions::default(),
        }
    }

    #[must_use]
    pub fn with_authority_provider(mut self, provider: AuthorityProvider) -> Self {
        self.authority_provider = Some(provider);
        self
    }

    #[must_use]
    pub fn with_source_owner_provider(mut self, provider: AddressProvider) -> Self {
        self.source_owner_provider = Some(provider);
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

    pub async fn send(&self, input: SplTransferInput) -> Result<Signature, HookError> {
        self.send_with(input, &self.options).await
    }

    /// Resolve missing fields, then run the transfer. Nothing is published
    /// when a required field cannot be resolved.
    pub async fn send_with(
        &self,
        input: SplTransferInput,
        options: &SendOptions,
    ) -> Result<Signature, HookError> {
        let transfer = self.resolve(input)?;
        self.controller
            .run(self.helper.send_transfer(transfer, options))
            .await
    }

    fn resolve(&self, input: SplTransferInput) -> Result<SplTransfer, HookError> {
        let authority = resolve_authority(
            input.authority,
            self.authority_provider.as_ref(),
            "sending SPL tokens",
        )?;
        let source_owner = input
            .source_owner
            .or_else(|| self.source_owner_provider.as_ref().and_then(|p| p()))
            .ok_or(HookError::MissingSourceOwner)?;
        Ok(SplTransfer {
            authority,
            source_owner,
            destination_owner: input.destination_owner,
            amount: input.amount,
            ensure_destination_ata: input.ensure_destination_ata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::KeypairSigner;
    use crate::state::AsyncStatus;
    use chain_sol::rpc::AccountInfo;
    use chain_sol::testing::MockRpc;
    use chain_sol::{RpcError, ASSOCIATED_TOKEN_PROGRAM_ID};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records each transfer and returns a fixed signature.
    #[derive(Default)]
    struct RecordingHelper {
        calls: AtomicUsize,
        last_source_owner: Mutex<Option<Address>>,
        fail_with: Option<HookError>,
    }

    #[async_trait]
    impl SplTransferHelper for RecordingHelper {
        async fn send_transfer(
            &self,
            transfer: SplTransfer,
            _options: &SendOptions,
        ) -> Result<Signature, HookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_source_owner.lock() = Some(transfer.source_owner);
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(Signature::new([1; 64])),
            }
        }
    }

    fn mint() -> Address {
        Address::new([0x30; 32])
    }

    fn signer() -> Arc<dyn TransactionSigner> {
        Arc::new(KeypairSigner::generate())
    }

    fn statuses(controller: &SplTransferController) -> (Arc<Mutex<Vec<AsyncStatus>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observed = controller.clone();
        let sub = controller.subscribe(move || sink.lock().push(observed.get_state().status()));
        (seen, sub)
    }

    #[tokio::test]
    async fn send_publishes_loading_then_success_then_idle_on_reset() {
        let helper = Arc::new(RecordingHelper::default());
        let controller = SplTransferController::new(helper.clone());
        let (seen, _sub) = statuses(&controller);

        let input = SplTransferInput::new(Address::new([2; 32]), 10)
            .with_authority(signer())
            .with_source_owner(Address::new([3; 32]));
        let signature = controller.send(input).await.unwrap();

        assert_eq!(signature, Signature::new([1; 64]));
        assert_eq!(*seen.lock(), vec![AsyncStatus::Loading, AsyncStatus::Success]);

        controller.reset();
        assert_eq!(seen.lock().last(), Some(&AsyncStatus::Idle));
    }

    #[tokio::test]
    async fn missing_authority_rejects_before_operation() {
        let helper = Arc::new(RecordingHelper::default());
        let controller = SplTransferController::new(helper.clone());
        let (seen, _sub) = statuses(&controller);

        let err = controller
            .send(SplTransferInput::new(Address::new([2; 32]), 10))
            .await
            .unwrap_err();

        assert!(matches!(err, HookError::MissingAuthority(_)));
        assert!(err.to_string().contains("authority"));
        assert_eq!(helper.calls.load(Ordering::SeqCst), 0);
        assert!(seen.lock().is_empty());
        assert_eq!(controller.get_state().status(), AsyncStatus::Idle);
    }

    #[tokio::test]
    async fn missing_source_owner_rejects_before_operation() {
        let helper = Arc::new(RecordingHelper::default());
        let controller = SplTransferController::new(helper.clone());

        let err = controller
            .send(SplTransferInput::new(Address::new([2; 32]), 10).with_authority(signer()))
            .await
            .unwrap_err();

        assert!(matches!(err, HookError::MissingSourceOwner));
        assert!(err.to_string().contains("source owner"));
        assert_eq!(helper.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn providers_fill_missing_fields() {
        let helper = Arc::new(RecordingHelper::default());
        let authority = signer();
        let provided = Arc::clone(&authority);
        let owner = Address::new([0x44; 32]);
        let controller = SplTransferController::new(helper.clone())
            .with_authority_provider(Arc::new(move || Some(Arc::clone(&provided))))
            .with_source_owner_provider(Arc::new(move || Some(owner)));

        controller
            .send(SplTransferInput::new(Address::new([2; 32]), 10))
            .await
            .unwrap();

        assert_eq!(helper.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*helper.last_source_owner.lock(), Some(owner));
    }

    #[tokio::test]
    async fn explicit_input_wins_over_providers() {
        let helper = Arc::new(RecordingHelper::default());
        let explicit = Address::new([0x55; 32]);
        let controller = SplTransferController::new(helper.clone())
            .with_source_owner_provider(Arc::new(|| Some(Address::new([0x66; 32]))));

        controller
            .send(
                SplTransferInput::new(Address::new([2; 32]), 10)
                    .with_authority(signer())
                    .with_source_owner(explicit),
            )
            .await
            .unwrap();

        assert_eq!(*helper.last_source_owner.lock(), Some(explicit));
    }

    #[tokio::test]
    async fn helper_failure_is_published_and_rethrown() {
        let helper = Arc::new(RecordingHelper {
            fail_with: Some(HookError::Chain(SolError::Rpc(RpcError::HttpStatus(500)))),
            ..RecordingHelper::default()
        });
        let controller = SplTransferController::new(helper);
        let (seen, _sub) = statuses(&controller);

        let err = controller
            .send(
                SplTransferInput::new(Address::new([2; 32]), 10)
                    .with_authority(signer())
                    .with_source_owner(Address::new([3; 32])),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, HookError::Chain(SolError::Rpc(RpcError::HttpStatus(500)))));
        assert_eq!(*seen.lock(), vec![AsyncStatus::Loading, AsyncStatus::Error]);
        assert!(matches!(
            controller.get_state().error(),
            Some(HookError::Chain(SolError::Rpc(RpcError::HttpStatus(500))))
        ));
    }

    #[test]
    fn transfer_message_moves_between_associated_accounts() {
        let rpc: Arc<dyn SolanaRpc> = Arc::new(MockRpc::new());
        let helper = SplTokenHelper::new(rpc, mint());
        let authority = signer();
        let source_owner = Address::new([3; 32]);
        let destination_owner = Address::new([4; 32]);
        let transfer = SplTransfer {
            authority: Arc::clone(&authority),
            source_owner,
            destination_owner,
            amount: 1_000,
            ensure_destination_ata: true,
        };

        let message = helper.build_transfer_message(&transfer).unwrap();

        assert_eq!(message.fee_payer(), Some(&authority.address()));
        let instructions = message.instructions();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].program_id, ASSOCIATED_TOKEN_PROGRAM_ID);
        assert_eq!(
            instructions[1].accounts[0].pubkey,
            derive_associated_token_address(&source_owner, &mint()).unwrap()
        );
        assert_eq!(
            instructions[1].accounts[1].pubkey,
            derive_associated_token_address(&destination_owner, &mint()).unwrap()
        );
        assert_eq!(instructions[1].accounts[2].pubkey, authority.address());

        let without_create = helper
            .build_transfer_message(&SplTransfer {
                ensure_destination_ata: false,
                ..transfer
            })
            .unwrap();
        assert_eq!(without_create.instructions().len(), 1);
    }

    #[tokio::test]
    async fn token_helper_prepares_signs_and_sends() {
        let rpc = Arc::new(MockRpc::new());
        rpc.push_units_consumed(50_000);
        let helper = SplTokenHelper::new(rpc.clone(), mint());
        let authority = signer();

        helper
            .send_transfer(
                SplTransfer {
                    authority: Arc::clone(&authority),
                    source_owner: authority.address(),
                    destination_owner: Address::new([4; 32]),
                    amount: 25,
                    ensure_destination_ata: true,
                },
                &SendOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(rpc.simulate_calls(), 1);
        assert_eq!(rpc.blockhash_calls(), 2);
        assert_eq!(rpc.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn fetch_balance_reads_token_account_amount() {
        let rpc = Arc::new(MockRpc::new());
        let helper = SplTokenHelper::new(rpc.clone(), mint());
        let owner = Address::new([7; 32]);
        let mut data = vec![0u8; 165];
        data[64..72].copy_from_slice(&42_000u64.to_le_bytes());
        rpc.set_account(
            helper.associated_token_address(&owner).unwrap(),
            AccountInfo {
                lamports: 2_039_280,
                owner: TOKEN_PROGRAM_ID,
                data,
                executable: false,
            },
        );

        assert_eq!(helper.fetch_balance(&owner).await.unwrap(), Some(42_000));
        assert_eq!(
            helper.fetch_balance(&Address::new([8; 32])).await.unwrap(),
            None
        );
    }
}
