//! Transaction pool: stage instructions, then prepare and send them as one
//! transaction.

use std::sync::Arc;

use chain_sol::{prepare_transaction, Instruction, Signature, SolanaRpc, TransactionMessage};
use parking_lot::Mutex;

use crate::controller::{resolve_authority, AsyncController, AuthorityProvider};
use crate::emitter::{Emitter, Subscription};
use crate::error::HookError;
use crate::send::{sign_and_send, SendOptions};
use crate::signer::TransactionSigner;
use crate::state::AsyncState;

#[derive(Default)]
struct Staged {
    instructions: Vec<Instruction>,
    prepared: Option<TransactionMessage>,
}

/// Staged instructions plus one controller for `prepare` and one for `send`.
///
/// Any change to the staged instructions discards the prepared transaction.
#[derive(Clone)]
pub struct TransactionPool {
    rpc: Arc<dyn SolanaRpc>,
    staged: Arc<Mutex<Staged>>,
    changes: Emitter,
    prepare_controller: AsyncController<TransactionMessage>,
    send_controller: AsyncController<Signature>,
    authority_provider: Option<AuthorityProvider>,
    options: SendOptions,
}

impl TransactionPool {
    pub fn new(rpc: Arc<dyn SolanaRpc>) -> Self {
        Self {
            rpc,
            staged: Arc::new(Mutex::new(Staged::default())),
            changes: Emitter::new(),
            prepare_controller: AsyncController::new("pool-prepare"),
            send_controller: AsyncController::new("pool-send"),
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

    // -- staging ------------------------------------------------------------

    pub fn instructions(&self) -> Vec<Instruction> {
        self.staged.lock().instructions.clone()
    }

    pub fn prepared(&self) -> Option<TransactionMessage> {
        self.staged.lock().prepared.clone()
    }

    pub fn add_instruction(&self, instruction: Instruction) {
        self.update(|instructions| instructions.push(instruction));
    }

    pub fn add_instructions<I>(&self, extra: I)
    where
        I: IntoIterator<Item = Instruction>,
    {
        self.update(|instructions| instructions.extend(extra));
    }

    /// Remove and return the instruction at `index`, if any.
    pub fn remove_instruction(&self, index: usize) -> Option<Instruction> {
        let mut removed = None;
        self.update(|instructions| {
            if index < instructions.len() {
                removed = Some(instructions.remove(index));
            }
        });
        removed
    }

    pub fn replace_instructions(&self, instructions: Vec<Instruction>) {
        self.update(|staged| *staged = instructions);
    }

    pub fn clear(&self) {
        self.update(Vec::clear);
    }

    /// Notified whenever the staged instructions change.
    pub fn subscribe_instructions<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.changes.subscribe(listener)
    }

    fn update(&self, edit: impl FnOnce(&mut Vec<Instruction>)) {
        {
            let mut staged = self.staged.lock();
            edit(&mut staged.instructions);
            staged.prepared = None;
        }
        self.changes.emit();
    }

    // -- prepare ------------------------------------------------------------

    pub fn prepare_state(&self) -> AsyncState<TransactionMessage> {
        self.prepare_controller.get_state()
    }

    pub fn subscribe_prepare<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.prepare_controller.subscribe(listener)
    }

    pub fn reset_prepare(&self) {
        self.prepare_controller.reset();
    }

    /// Build a message from the staged instructions, paid by the authority,
    /// and prepare it.
    pub async fn prepare(
        &self,
        authority: Option<Arc<dyn TransactionSigner>>,
    ) -> Result<TransactionMessage, HookError> {
        let authority = resolve_authority(
            authority,
            self.authority_provider.as_ref(),
            "preparing transactions",
        )?;
        let message = self.staged_message(&authority, "preparing")?;
        self.prepare_message(message).await
    }

    fn staged_message(
        &self,
        authority: &Arc<dyn TransactionSigner>,
        action: &'static str,
    ) -> Result<TransactionMessage, HookError> {
        let instructions = self.instructions();
        if instructions.is_empty() {
            return Err(HookError::EmptyTransactionPool(action));
        }
        Ok(TransactionMessage::new()
            .with_fee_payer(authority.address())
            .with_instructions(instructions))
    }

    async fn prepare_message(
        &self,
        message: TransactionMessage,
    ) -> Result<TransactionMessage, HookError> {
        let prepared = self
            .prepare_controller
            .run(async {
                prepare_transaction(self.rpc.as_ref(), &message, &self.options.prepare)
                    .await
                    .map_err(HookError::from)
            })
            .await?;

        let mut staged = self.staged.lock();
        // Keep the result only if the staged instructions did not change
        // while preparing.
        if staged.instructions.as_slice() == message.instructions() {
            staged.prepared = Some(prepared.clone());
        }
        Ok(prepared)
    }

    // -- send ---------------------------------------------------------------

    pub fn send_state(&self) -> AsyncState<Signature> {
        self.send_controller.get_state()
    }

    pub fn subscribe_send<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.send_controller.subscribe(listener)
    }

    pub fn reset_send(&self) {
        self.send_controller.reset();
    }

    /// Sign and send the prepared transaction, preparing it first when
    /// nothing is prepared or it was prepared for a different fee payer.
    pub async fn send(
        &self,
        authority: Option<Arc<dyn TransactionSigner>>,
    ) -> Result<Signature, HookError> {
        let authority = resolve_authority(
            authority,
            self.authority_provider.as_ref(),
            "sending transactions",
        )?;
        let payer = authority.address();
        let (message, needs_prepare) = match self
            .prepared()
            .filter(|message| message.fee_payer() == Some(&payer))
        {
            Some(prepared) => (prepared, false),
            None => (self.staged_message(&authority, "sending")?, true),
        };

        self.send_controller
            .run(async move {
                let message = if needs_prepare {
                    self.prepare_message(message).await?
                } else {
                    message
                };
                sign_and_send(
                    self.rpc.as_ref(),
                    &message,
                    authority.as_ref(),
                    &self.options.send,
                )
                .await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::KeypairSigner;
    use crate::state::AsyncStatus;
    use chain_sol::testing::MockRpc;
    use chain_sol::{build_sol_transfer, find_compute_unit_limit, Address};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transfer(from: &Address, lamports: u64) -> Instruction {
        build_sol_transfer(from, &Address::new([9; 32]), lamports).unwrap()
    }

    fn signer() -> Arc<dyn TransactionSigner> {
        Arc::new(KeypairSigner::generate())
    }

    #[test]
    fn staging_operations_edit_the_list() {
        let pool = TransactionPool::new(Arc::new(MockRpc::new()));
        let from = Address::new([1; 32]);

        pool.add_instruction(transfer(&from, 1));
        pool.add_instructions([transfer(&from, 2), transfer(&from, 3)]);
        assert_eq!(pool.instructions().len(), 3);

        assert_eq!(pool.remove_instruction(1), Some(transfer(&from, 2)));
        assert_eq!(pool.remove_instruction(5), None);
        assert_eq!(
            pool.instructions(),
            vec![transfer(&from, 1), transfer(&from, 3)]
        );

        pool.replace_instructions(vec![transfer(&from, 4)]);
        assert_eq!(pool.instructions(), vec![transfer(&from, 4)]);

        pool.clear();
        assert!(pool.instructions().is_empty());
    }

    #[test]
    fn instruction_changes_notify_listeners() {
        let pool = TransactionPool::new(Arc::new(MockRpc::new()));
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&hits);
        let _sub = pool.subscribe_instructions(move || {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        pool.add_instruction(transfer(&Address::new([1; 32]), 1));
        pool.clear();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_pool_is_rejected() {
        let rpc = Arc::new(MockRpc::new());
        let pool = TransactionPool::new(rpc.clone());

        let err = pool.prepare(Some(signer())).await.unwrap_err();
        assert!(matches!(err, HookError::EmptyTransactionPool(_)));
        let err = pool.send(Some(signer())).await.unwrap_err();
        assert!(matches!(err, HookError::EmptyTransactionPool(_)));

        assert!(rpc.calls().is_empty());
        assert_eq!(pool.send_state().status(), AsyncStatus::Idle);
    }

    #[tokio::test]
    async fn missing_authority_is_rejected() {
        let pool = TransactionPool::new(Arc::new(MockRpc::new()));
        pool.add_instruction(transfer(&Address::new([1; 32]), 1));

        let err = pool.send(None).await.unwrap_err();
        assert!(matches!(err, HookError::MissingAuthority(_)));
    }

    #[tokio::test]
    async fn prepare_stores_result_and_publishes_state() {
        let rpc = Arc::new(MockRpc::new());
        rpc.push_units_consumed(500_000);
        let authority = signer();
        let pool = TransactionPool::new(rpc.clone());
        pool.add_instruction(transfer(&authority.address(), 5));

        let prepared = pool.prepare(Some(Arc::clone(&authority))).await.unwrap();

        assert_eq!(find_compute_unit_limit(&prepared), Some(1));
        assert_eq!(pool.prepared(), Some(prepared));
        assert_eq!(pool.prepare_state().status(), AsyncStatus::Success);
    }

    #[tokio::test]
    async fn send_reuses_prepared_transaction() {
        let rpc = Arc::new(MockRpc::new());
        let authority = signer();
        let pool = TransactionPool::new(rpc.clone());
        pool.add_instruction(transfer(&authority.address(), 5));

        pool.prepare(Some(Arc::clone(&authority))).await.unwrap();
        let simulations = rpc.simulate_calls();
        pool.send(Some(Arc::clone(&authority))).await.unwrap();

        assert_eq!(rpc.simulate_calls(), simulations);
        assert_eq!(rpc.sent_transactions().len(), 1);
        assert_eq!(pool.send_state().status(), AsyncStatus::Success);
    }

    #[tokio::test]
    async fn send_prepares_first_when_needed() {
        let rpc = Arc::new(MockRpc::new());
        let authority = signer();
        let provided = Arc::clone(&authority);
        let pool = TransactionPool::new(rpc.clone())
            .with_authority_provider(Arc::new(move || Some(Arc::clone(&provided))));
        pool.add_instruction(transfer(&authority.address(), 5));

        pool.send(None).await.unwrap();

        assert_eq!(rpc.simulate_calls(), 1);
        assert_eq!(pool.prepare_state().status(), AsyncStatus::Success);
        assert_eq!(pool.send_state().status(), AsyncStatus::Success);
    }

    #[tokio::test]
    async fn staging_change_discards_prepared_transaction() {
        let rpc = Arc::new(MockRpc::new());
        let authority = signer();
        let pool = TransactionPool::new(rpc.clone());
        pool.add_instruction(transfer(&authority.address(), 5));
        pool.prepare(Some(Arc::clone(&authority))).await.unwrap();

        pool.add_instruction(transfer(&authority.address(), 6));
        assert!(pool.prepared().is_none());

        pool.send(Some(authority)).await.unwrap();
        assert_eq!(rpc.simulate_calls(), 2);
    }

    #[tokio::test]
    async fn different_authority_triggers_new_preparation() {
        let rpc = Arc::new(MockRpc::new());
        let first = signer();
        let second = signer();
        let pool = TransactionPool::new(rpc.clone());
        pool.add_instruction(build_sol_transfer(&second.address(), &Address::new([9; 32]), 5).unwrap());
        pool.prepare(Some(first)).await.unwrap();

        pool.send(Some(Arc::clone(&second))).await.unwrap();

        assert_eq!(rpc.simulate_calls(), 2);
        assert_eq!(
            pool.prepared().and_then(|m| m.fee_payer().copied()),
            Some(second.address())
        );
    }
}
