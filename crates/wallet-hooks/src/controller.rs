//! Observable wrapper around a single asynchronous operation.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use chain_sol::Address;

use crate::emitter::{Emitter, Subscription};
use crate::error::HookError;
use crate::signer::TransactionSigner;
use crate::state::AsyncState;

/// Supplies the signing authority when a request omits it.
pub type AuthorityProvider = Arc<dyn Fn() -> Option<Arc<dyn TransactionSigner>> + Send + Sync>;

/// Supplies an address (such as a source owner) when a request omits it.
pub type AddressProvider = Arc<dyn Fn() -> Option<Address> + Send + Sync>;

/// Input resolution: explicit value first, then the provider.
pub(crate) fn resolve_authority(
    explicit: Option<Arc<dyn TransactionSigner>>,
    provider: Option<&AuthorityProvider>,
    action: &'static str,
) -> Result<Arc<dyn TransactionSigner>, HookError> {
    explicit
        .or_else(|| provider.and_then(|p| p()))
        .ok_or(HookError::MissingAuthority(action))
}

/// Tracks one asynchronous operation as `idle → loading → success | error`.
///
/// Every state change notifies each subscriber exactly once. Overlapping
/// [`run`](Self::run) calls are not serialized: whichever finishes last
/// decides the final state.
pub struct AsyncController<T> {
    state: Arc<Mutex<AsyncState<T>>>,
    emitter: Emitter,
    name: &'static str,
}

impl<T> Clone for AsyncController<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            emitter: self.emitter.clone(),
            name: self.name,
        }
    }
}

impl<T: Clone> AsyncController<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            state: Arc::new(Mutex::new(AsyncState::Idle)),
            emitter: Emitter::new(),
            name,
        }
    }

    pub fn get_state(&self) -> AsyncState<T> {
        self.state.lock().clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.emitter.subscribe(listener)
    }

    pub fn reset(&self) {
        self.publish(AsyncState::Idle);
    }

    /// Publish `loading`, await `operation`, then publish its outcome.
    ///
    /// The error is mirrored into the state and returned unchanged.
    pub async fn run<F>(&self, operation: F) -> Result<T, HookError>
    where
        F: Future<Output = Result<T, HookError>>,
    {
        self.publish(AsyncState::Loading);
        match operation.await {
            Ok(data) => {
                self.publish(AsyncState::Success(data.clone()));
                Ok(data)
            }
            Err(err) => {
                tracing::warn!(controller = self.name, error = %err, "operation failed");
                self.publish(AsyncState::Error(err.clone()));
                Err(err)
            }
        }
    }

    fn publish(&self, next: AsyncState<T>) {
        let status = next.status();
        *self.state.lock() = next;
        tracing::debug!(controller = self.name, ?status, "state changed");
        self.emitter.emit();
    }
}
