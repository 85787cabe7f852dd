//! Repository state and the cell that publishes it.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ErrorInfo, LifeDbError};
use crate::reactive::{EventEmitter, Unsubscribe};

/// What a consumer renders: the last good data, whether a load is
/// outstanding, and the last error.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryState<T> {
    pub data: Vec<T>,
    pub is_loading: bool,
    pub error: Option<ErrorInfo>,
}

impl<T> Default for RepositoryState<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            is_loading: false,
            error: None,
        }
    }
}

impl<T> RepositoryState<T> {
    pub(crate) fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }
}

/// Holds a [`RepositoryState`] and notifies listeners after each change.
///
/// Listeners run after the state lock is released, so they may read the
/// state again.
pub(crate) struct StateCell<T> {
    state: Mutex<RepositoryState<T>>,
    emitter: Arc<EventEmitter<RepositoryState<T>>>,
}

impl<T: Clone + Send + Sync + 'static> StateCell<T> {
    pub(crate) fn new(initial: RepositoryState<T>) -> Self {
        Self {
            state: Mutex::new(initial),
            emitter: Arc::new(EventEmitter::new()),
        }
    }

    pub(crate) fn get(&self) -> RepositoryState<T> {
        self.state.lock().clone()
    }

    /// Mutate without notifying; returns the new snapshot for [`Self::notify`].
    pub(crate) fn apply(&self, f: impl FnOnce(&mut RepositoryState<T>)) -> RepositoryState<T> {
        let mut state = self.state.lock();
        f(&mut state);
        state.clone()
    }

    pub(crate) fn notify(&self, snapshot: &RepositoryState<T>) {
        self.emitter.emit(snapshot);
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut RepositoryState<T>)) {
        let snapshot = self.apply(f);
        self.notify(&snapshot);
    }

    /// Record a failed operation. Data is kept.
    pub(crate) fn fail(&self, error: &LifeDbError) {
        let info = ErrorInfo::from(error);
        self.update(|s| s.error = Some(info));
    }

    pub(crate) fn subscribe(
        &self,
        listener: impl Fn(&RepositoryState<T>) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let id = self.emitter.on(listener);
        let emitter = Arc::clone(&self.emitter);
        Box::new(move || emitter.off(id))
    }
}
