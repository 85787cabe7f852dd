//! Repository over a table of the embedded store.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::entities::LocalEntity;
use crate::error::{ErrorInfo, LifeDbError, Result, StorageError};
use crate::query::types::Query;
use crate::reactive::{LiveStore, Subscription, SubscriptionState, Unsubscribe};
use crate::storage::traits::StorageBackend;
use crate::types::RecordKey;

use super::state::{RepositoryState, StateCell};
use super::{merge_fields, Repository};

/// Follows a live query on `T::TABLE`. Writes made through this repository,
/// another repository or the store itself all show up in [`Self::state`]
/// without an explicit refresh.
pub struct LocalRepository<T: LocalEntity, B: StorageBackend + 'static> {
    store: Arc<LiveStore<B>>,
    query: Query,
    state: Arc<StateCell<T>>,
    subscription: Subscription,
}

impl<T: LocalEntity, B: StorageBackend + 'static> LocalRepository<T, B> {
    /// Follow every record of the table, in key order.
    pub fn new(store: Arc<LiveStore<B>>) -> Self {
        Self::with_query(store, Query::default())
    }

    /// Follow the records `query` returns.
    pub fn with_query(store: Arc<LiveStore<B>>, query: Query) -> Self {
        let state = Arc::new(StateCell::new(RepositoryState::loading()));
        let cell = Arc::clone(&state);
        let subscription = store.observe_query(T::TABLE, query.clone(), move |result| {
            publish(&cell, result.and_then(|r| decode_all::<T>(r.records)));
        });
        Self {
            store,
            query,
            state,
            subscription,
        }
    }

    pub fn get(&self, key: RecordKey) -> Result<Option<T>> {
        self.store
            .get(T::TABLE, key)?
            .map(|v| serde_json::from_value(v).map_err(Into::into))
            .transpose()
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.subscription.state()
    }

    /// Stop following the table. The state keeps its last value.
    pub fn dispose(&self) {
        self.subscription.dispose();
    }

    fn track<R>(&self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            self.state.fail(e);
        }
        result
    }

    fn create_now(&self, item: &T) -> Result<T> {
        item.validate()?;
        let key = self.store.add(T::TABLE, serde_json::to_value(item)?)?;
        let stored = self
            .store
            .get(T::TABLE, key)?
            .ok_or_else(|| StorageError::NotFound {
                table: T::TABLE.to_string(),
                key,
            })?;
        Ok(serde_json::from_value(stored)?)
    }

    /// Validate the merged record before writing; nothing is written when
    /// it does not hold.
    fn update_now(&self, key: RecordKey, partial: Value) -> Result<T> {
        self.store.transaction(move |tx| {
            let mut merged = tx
                .get(T::TABLE, key)?
                .ok_or_else(|| StorageError::NotFound {
                    table: T::TABLE.to_string(),
                    key,
                })?;
            merge_fields(&mut merged, &partial);
            let candidate: T = serde_json::from_value(merged)?;
            candidate.validate()?;
            let stored = tx.update(T::TABLE, key, partial)?;
            Ok(serde_json::from_value(stored)?)
        })
    }
}

fn decode_all<T: LocalEntity>(records: Vec<Value>) -> Result<Vec<T>> {
    records
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(Into::into))
        .collect()
}

/// Store a query outcome in `cell`. A failure keeps the previous data.
fn publish<T: LocalEntity>(cell: &StateCell<T>, result: Result<Vec<T>>) {
    match result {
        Ok(items) => publish_items(cell, items),
        Err(e) => publish_error(cell, &e),
    }
}

fn publish_items<T: LocalEntity>(cell: &StateCell<T>, items: Vec<T>) {
    cell.update(|s| {
        s.data = items;
        s.is_loading = false;
        s.error = None;
    });
}

fn publish_error<T: LocalEntity>(cell: &StateCell<T>, e: &LifeDbError) {
    warn!(table = T::TABLE, error = %e, "live query failed");
    let info = ErrorInfo::from(e);
    cell.update(|s| {
        s.is_loading = false;
        s.error = Some(info);
    });
}

#[async_trait]
impl<T: LocalEntity, B: StorageBackend + 'static> Repository for LocalRepository<T, B> {
    type Item = T;
    type Key = RecordKey;

    fn state(&self) -> RepositoryState<T> {
        self.state.get()
    }

    fn on_state_change<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&RepositoryState<T>) + Send + Sync + 'static,
    {
        self.state.subscribe(listener)
    }

    /// Re-run the query now. Not needed for freshness; useful after an error.
    async fn refresh(&self) -> Result<()> {
        let result = self
            .store
            .query(T::TABLE, &self.query)
            .and_then(|r| decode_all::<T>(r.records));
        match result {
            Ok(items) => {
                publish_items(&self.state, items);
                Ok(())
            }
            Err(e) => {
                publish_error(&self.state, &e);
                Err(e)
            }
        }
    }

    async fn create(&self, item: T) -> Result<T> {
        let result = self.create_now(&item);
        self.track(result)
    }

    async fn update(&self, key: RecordKey, partial: Value) -> Result<T> {
        let result = self.update_now(key, partial);
        self.track(result)
    }

    /// Removing an absent key is not an error.
    async fn delete(&self, key: RecordKey) -> Result<()> {
        let result = self.store.remove(T::TABLE, key).map(|_| ());
        self.track(result)
    }
}
