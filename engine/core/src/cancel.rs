//! Cooperative cancellation
//!
//! One [`CancellationToken`] is minted per top-level user action and shared
//! between the input handler and the interpreter running that action's
//! sequence. Tokens are never reused; starting a new action through
//! [`ActionGate::begin`] cancels whatever token was current before.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Shared cancellation flag for one action
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Fresh, uncancelled token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Hands out one token per action and tracks the one in flight
#[derive(Debug, Default)]
pub struct ActionGate {
    current: Mutex<Option<(u64, CancellationToken)>>,
    next_id: AtomicU64,
}

/// Ticket for an action started through [`ActionGate::begin`]
#[derive(Clone, Debug)]
pub struct ActionTicket {
    id: u64,
    /// Token observed by the action
    pub token: CancellationToken,
}

impl ActionGate {
    /// Create an idle gate
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new action, invalidating the previous one
    pub fn begin(&self) -> ActionTicket {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        let previous = self.current.lock().replace((id, token.clone()));
        if let Some((_, old)) = previous {
            old.cancel();
        }
        ActionTicket { id, token }
    }

    /// Mark an action as finished
    ///
    /// A stale ticket (one superseded by a later `begin`) is ignored.
    pub fn finish(&self, ticket: &ActionTicket) {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|(id, _)| *id == ticket.id) {
            *current = None;
        }
    }

    /// Whether an action is in flight
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Cancel the action in flight, returning whether there was one
    pub fn interrupt(&self) -> bool {
        match self.current.lock().as_ref() {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}
