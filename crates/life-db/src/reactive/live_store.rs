//! LiveStore<B>: wraps `Store<B>` with subscription and flush semantics so
//! that registered callbacks are notified synchronously whenever the data
//! they depend on changes.
//!
//! # Threading model
//!
//! `LiveStore<B>` is `Send + Sync`. Three independent locks are used:
//!   - `inner`: the wrapped `Store<B>` (`parking_lot::Mutex`).
//!   - `state`: all subscription bookkeeping (`Arc<Mutex<..>>`; cloned into
//!     unsubscribe closures).
//!   - `emitter`: the change-event emitter (`EventEmitter` uses its own
//!     internal `parking_lot::Mutex`).
//!
//! The critical rule is **never hold both `inner` and `state` simultaneously**,
//! and never hold either while a user callback runs.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    error::{LifeDbError, Result},
    index::planner::{explain_plan, plan_query},
    query::{
        execute::execute_query,
        types::{Query, QueryResult},
    },
    schema::registry::SchemaRegistry,
    storage::{store::Store, traits::StorageBackend},
    types::{RecordKey, ScanRequest, StoredRecord},
};

use super::{
    event::ChangeEvent,
    event_emitter::EventEmitter,
    subscription::{Subscription, SubscriptionCore, Unsubscribe},
};

// ============================================================================
// Dependencies
// ============================================================================

/// What a subscription reads: a whole table, or one record of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub table: String,
    pub key: Option<RecordKey>,
}

impl Dependency {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: None,
        }
    }

    pub fn record(table: impl Into<String>, key: RecordKey) -> Self {
        Self {
            table: table.into(),
            key: Some(key),
        }
    }

    fn is_affected_by(&self, event: &ChangeEvent) -> bool {
        if self.table != event.table() {
            return false;
        }
        match (self.key, event.key()) {
            (Some(mine), Some(changed)) => mine == changed,
            _ => true,
        }
    }
}

// ============================================================================
// Internal subscription types
// ============================================================================

/// Runs the compute step against the store and packages the delivery, so the
/// callback can run after the store lock is released.
type RunFn<B> = dyn Fn(&Store<B>) -> Delivery + Send + Sync;
type Delivery = Box<dyn FnOnce() + Send>;

struct LiveSub<B: StorageBackend> {
    id: u64,
    deps: Vec<Dependency>,
    core: Arc<SubscriptionCore>,
    run: Arc<RunFn<B>>,
}

// ============================================================================
// Reactive state (held behind an Arc<Mutex<...>>)
// ============================================================================

struct ReactiveState<B: StorageBackend> {
    subs: Vec<Arc<LiveSub<B>>>,
    /// Subscriptions pending flush, in invalidation order.
    dirty: Vec<Arc<LiveSub<B>>>,
    /// Monotonically increasing subscription ID counter.
    next_id: u64,
}

impl<B: StorageBackend> ReactiveState<B> {
    fn new() -> Self {
        Self {
            subs: Vec::new(),
            dirty: Vec::new(),
            next_id: 1,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn mark_dirty(&mut self, event: &ChangeEvent) {
        for sub in &self.subs {
            if !sub.deps.iter().any(|d| d.is_affected_by(event)) {
                continue;
            }
            if !self.dirty.iter().any(|s| s.id == sub.id) {
                self.dirty.push(Arc::clone(sub));
            }
        }
    }

    fn remove(&mut self, id: u64) {
        self.subs.retain(|s| s.id != id);
        self.dirty.retain(|s| s.id != id);
    }
}

// ============================================================================
// Transaction handle
// ============================================================================

/// Write access to the store inside [`LiveStore::transaction`]. Changes are
/// recorded and announced only after the transaction commits.
pub struct LiveTransaction<'a, B: StorageBackend> {
    store: &'a Store<B>,
    events: Vec<ChangeEvent>,
}

impl<B: StorageBackend> LiveTransaction<'_, B> {
    pub fn add(&mut self, table: &str, record: Value) -> Result<RecordKey> {
        let key = self.store.add(table, record)?;
        self.events.push(ChangeEvent::Added {
            table: table.to_string(),
            key,
        });
        Ok(key)
    }

    pub fn update(&mut self, table: &str, key: RecordKey, partial: Value) -> Result<Value> {
        let merged = self.store.update(table, key, partial)?;
        self.events.push(ChangeEvent::Updated {
            table: table.to_string(),
            key,
        });
        Ok(merged)
    }

    pub fn remove(&mut self, table: &str, key: RecordKey) -> Result<bool> {
        let existed = self.store.remove(table, key)?;
        if existed {
            self.events.push(ChangeEvent::Removed {
                table: table.to_string(),
                key,
            });
        }
        Ok(existed)
    }

    pub fn get(&self, table: &str, key: RecordKey) -> Result<Option<Value>> {
        self.store.get(table, key)
    }

    pub fn scan(&self, table: &str, request: &ScanRequest) -> Result<Vec<StoredRecord>> {
        self.store.scan(table, request)
    }

    pub fn query(&self, table: &str, query: &Query) -> Result<QueryResult> {
        execute_query(self.store, table, query)
    }
}

// ============================================================================
// LiveStore
// ============================================================================

/// Wraps `Store<B>` with synchronous reactive subscriptions.
pub struct LiveStore<B: StorageBackend> {
    inner: Mutex<Store<B>>,
    state: Arc<Mutex<ReactiveState<B>>>,
    /// Change-event emitter: separate from `state` so that `on_change`
    /// callbacks can safely re-enter the live store.
    emitter: Arc<EventEmitter<ChangeEvent>>,
}

impl<B: StorageBackend + 'static> LiveStore<B> {
    /// Wrap an open store.
    pub fn new(store: Store<B>) -> Self {
        Self {
            inner: Mutex::new(store),
            state: Arc::new(Mutex::new(ReactiveState::new())),
            emitter: Arc::new(EventEmitter::new()),
        }
    }

    /// Open `backend` with `registry` and wrap the resulting store.
    pub fn open(backend: B, registry: &SchemaRegistry) -> Result<Self> {
        Ok(Self::new(Store::open(backend, registry)?))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, table: &str, key: RecordKey) -> Result<Option<Value>> {
        self.inner.lock().get(table, key)
    }

    pub fn scan(&self, table: &str, request: &ScanRequest) -> Result<Vec<StoredRecord>> {
        self.inner.lock().scan(table, request)
    }

    pub fn count(&self, table: &str) -> Result<usize> {
        self.inner.lock().count(table)
    }

    pub fn query(&self, table: &str, query: &Query) -> Result<QueryResult> {
        execute_query(&self.inner.lock(), table, query)
    }

    /// Human-readable plan for `query`.
    pub fn explain(&self, table: &str, query: &Query) -> Result<String> {
        let store = self.inner.lock();
        let def = store
            .schema()
            .table(table)
            .ok_or_else(|| crate::error::StorageError::UnknownTable(table.to_string()))?;
        Ok(explain_plan(&plan_query(def, query)?))
    }

    /// Run a read-only closure against the store.
    pub fn read<T>(&self, f: impl FnOnce(&Store<B>) -> Result<T>) -> Result<T> {
        f(&self.inner.lock())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub fn add(&self, table: &str, record: Value) -> Result<RecordKey> {
        let key = self.inner.lock().add(table, record)?;
        self.after_write(vec![ChangeEvent::Added {
            table: table.to_string(),
            key,
        }]);
        Ok(key)
    }

    pub fn update(&self, table: &str, key: RecordKey, partial: Value) -> Result<Value> {
        let merged = self.inner.lock().update(table, key, partial)?;
        self.after_write(vec![ChangeEvent::Updated {
            table: table.to_string(),
            key,
        }]);
        Ok(merged)
    }

    /// Remove a record. A no-op removal announces nothing.
    pub fn remove(&self, table: &str, key: RecordKey) -> Result<bool> {
        let existed = self.inner.lock().remove(table, key)?;
        if existed {
            self.after_write(vec![ChangeEvent::Removed {
                table: table.to_string(),
                key,
            }]);
        }
        Ok(existed)
    }

    pub fn clear(&self, table: &str) -> Result<usize> {
        let removed = self.inner.lock().clear(table)?;
        self.after_write(vec![ChangeEvent::Cleared {
            table: table.to_string(),
        }]);
        Ok(removed)
    }

    /// Run `f` atomically. Subscribers are notified once, after commit, of
    /// every change made through the transaction handle.
    ///
    /// The store lock is held while `f` runs: `f` must use the handle, not
    /// call back into this `LiveStore`.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut LiveTransaction<'_, B>) -> Result<T>,
    {
        let (value, events) = {
            let store = self.inner.lock();
            store.transaction(|s| {
                let mut tx = LiveTransaction {
                    store: s,
                    events: Vec::new(),
                };
                let value = f(&mut tx)?;
                Ok((value, tx.events))
            })?
        };
        if !events.is_empty() {
            self.after_write(events);
        }
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Register a computation over the store that is re-run whenever one of
    /// `deps` changes. `callback` receives every result, including errors.
    ///
    /// The first computation runs before this method returns.
    pub fn observe<T, C, F>(&self, deps: Vec<Dependency>, compute: C, callback: F) -> Subscription
    where
        T: Send + 'static,
        C: Fn(&Store<B>) -> Result<T> + Send + Sync + 'static,
        F: Fn(Result<T>) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let run: Arc<RunFn<B>> = Arc::new(move |store: &Store<B>| -> Delivery {
            let result = match catch_unwind(AssertUnwindSafe(|| compute(store))) {
                Ok(result) => result,
                Err(_) => Err(LifeDbError::Internal("subscription compute panicked".into())),
            };
            let callback = Arc::clone(&callback);
            Box::new(move || callback(result))
        });

        let core = Arc::new(SubscriptionCore::new());
        let sub = {
            let mut st = self.state.lock();
            let sub = Arc::new(LiveSub {
                id: st.next_id(),
                deps,
                core: Arc::clone(&core),
                run,
            });
            st.subs.push(Arc::clone(&sub));
            sub
        };
        let sub_id = sub.id;

        let state_arc = Arc::clone(&self.state);
        let unsubscribe: Unsubscribe = Box::new(move || {
            state_arc.lock().remove(sub_id);
        });
        let handle = Subscription::new(sub_id, core, unsubscribe);

        self.run_sub(&sub);
        handle
    }

    /// Observe the records a query returns on `table`.
    pub fn observe_query<F>(&self, table: &str, query: Query, callback: F) -> Subscription
    where
        F: Fn(Result<QueryResult>) + Send + Sync + 'static,
    {
        let owned_table = table.to_string();
        self.observe(
            vec![Dependency::table(table)],
            move |store| execute_query(store, &owned_table, &query),
            callback,
        )
    }

    /// Observe a single record; `None` while it does not exist.
    pub fn observe_record<F>(&self, table: &str, key: RecordKey, callback: F) -> Subscription
    where
        F: Fn(Result<Option<Value>>) + Send + Sync + 'static,
    {
        let owned_table = table.to_string();
        self.observe(
            vec![Dependency::record(table, key)],
            move |store| store.get(&owned_table, key),
            callback,
        )
    }

    /// Register a callback to be called on every [`ChangeEvent`].
    ///
    /// Returns an [`Unsubscribe`] closure.
    pub fn on_change(&self, callback: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> Unsubscribe {
        let listener_id = self.emitter.on(callback);
        let emitter = Arc::clone(&self.emitter);

        Box::new(move || {
            emitter.off(listener_id);
        })
    }

    /// Number of registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.state.lock().subs.len()
    }

    // -----------------------------------------------------------------------
    // Flush
    // -----------------------------------------------------------------------

    /// Recompute every dirty subscription and deliver the results.
    ///
    /// Dirty subscriptions are snapshotted and drained under the state lock.
    /// Each is recomputed under the store lock, then its callback runs with
    /// no lock held. A subscription disposed after the snapshot is skipped,
    /// and a result computed for a subscription disposed meanwhile is dropped.
    pub fn flush(&self) {
        let dirty: Vec<Arc<LiveSub<B>>> = {
            let mut st = self.state.lock();
            st.dirty.drain(..).collect()
        };

        for sub in dirty {
            self.run_sub(&sub);
        }
    }

    fn run_sub(&self, sub: &LiveSub<B>) {
        if !sub.core.begin_compute() {
            return;
        }

        let delivery = {
            let store = self.inner.lock();
            (sub.run)(&store)
        };

        if !sub.core.finish_compute() {
            debug!(subscription = sub.id, "discarding result for disposed subscription");
            return;
        }

        if catch_unwind(AssertUnwindSafe(delivery)).is_err() {
            warn!(subscription = sub.id, "subscription callback panicked");
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Dispose every subscription and close the store.
    pub fn close(&self) {
        let subs: Vec<Arc<LiveSub<B>>> = {
            let mut st = self.state.lock();
            st.dirty.clear();
            st.subs.drain(..).collect()
        };
        for sub in subs {
            sub.core.mark_disposed();
        }
        self.emitter.clear();
        self.inner.lock().close();
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Announce committed changes: emit events, mark dependents dirty, flush.
    ///
    /// Listener panics are caught inside the emitter so that a misbehaving
    /// `on_change` callback can never prevent `mark_dirty` + `flush` from
    /// running after a committed write.
    fn after_write(&self, events: Vec<ChangeEvent>) {
        for event in &events {
            self.emitter.emit(event);
        }
        {
            let mut st = self.state.lock();
            for event in &events {
                st.mark_dirty(event);
            }
        }
        self.flush();
    }
}

// ============================================================================
// Tests
// ============================================================================
