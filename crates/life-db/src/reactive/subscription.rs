//! Subscription handles returned by the live store.
//!
//! A [`Subscription`] owns its registration: dropping it (or calling
//! [`Subscription::dispose`]) removes the subscription, and any recompute that
//! is still in flight has its result discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// An owned one-shot closure that removes a subscription when called.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

/// Lifecycle of a live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Registered, first computation not started.
    Idle,
    /// First computation running.
    Computing,
    /// Latest result delivered.
    Live,
    /// A write invalidated the result and it is being recomputed.
    Recomputing,
    /// Removed; nothing will be delivered any more.
    Disposed,
}

/// State shared between a [`Subscription`] handle and the live store.
#[derive(Debug)]
pub(crate) struct SubscriptionCore {
    state: Mutex<SubscriptionState>,
    disposed: AtomicBool,
}

impl SubscriptionCore {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SubscriptionState::Idle),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        *self.state.lock()
    }

    /// Enter `Computing` (first run) or `Recomputing`. Returns `false` if the
    /// subscription is already disposed.
    pub(crate) fn begin_compute(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            SubscriptionState::Disposed => false,
            SubscriptionState::Idle => {
                *state = SubscriptionState::Computing;
                true
            }
            _ => {
                *state = SubscriptionState::Recomputing;
                true
            }
        }
    }

    /// Enter `Live` unless disposed meanwhile. Returns whether the result may
    /// be delivered.
    pub(crate) fn finish_compute(&self) -> bool {
        let mut state = self.state.lock();
        if self.is_disposed() || *state == SubscriptionState::Disposed {
            return false;
        }
        *state = SubscriptionState::Live;
        true
    }

    pub(crate) fn mark_disposed(&self) {
        self.disposed.store(true, Ordering::Release);
        *self.state.lock() = SubscriptionState::Disposed;
    }
}

/// Handle to a live subscription. Disposes on drop.
#[must_use = "dropping a Subscription disposes it immediately"]
pub struct Subscription {
    id: u64,
    core: Arc<SubscriptionCore>,
    unsubscribe: Mutex<Option<Unsubscribe>>,
}

impl Subscription {
    pub(crate) fn new(id: u64, core: Arc<SubscriptionCore>, unsubscribe: Unsubscribe) -> Self {
        Self {
            id,
            core,
            unsubscribe: Mutex::new(Some(unsubscribe)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SubscriptionState {
        self.core.state()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// Remove the subscription. Idempotent.
    pub fn dispose(&self) {
        self.core.mark_disposed();
        let unsubscribe = self.unsubscribe.lock().take();
        if let Some(unsubscribe) = unsubscribe {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
