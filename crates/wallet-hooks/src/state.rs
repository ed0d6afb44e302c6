//! Snapshot of an async operation as seen by subscribers.

use crate::error::HookError;

/// Discriminant of an [`AsyncState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsyncStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Observable state of one asynchronous operation.
#[derive(Debug, Clone)]
pub enum AsyncState<T> {
    Idle,
    Loading,
    Success(T),
    Error(HookError),
}

impl<T> Default for AsyncState<T> {
    fn default() -> Self {
        AsyncState::Idle
    }
}

impl<T> AsyncState<T> {
    pub fn status(&self) -> AsyncStatus {
        match self {
            AsyncState::Idle => AsyncStatus::Idle,
            AsyncState::Loading => AsyncStatus::Loading,
            AsyncState::Success(_) => AsyncStatus::Success,
            AsyncState::Error(_) => AsyncStatus::Error,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            AsyncState::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&HookError> {
        match self {
            AsyncState::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AsyncState::Loading)
    }
}
