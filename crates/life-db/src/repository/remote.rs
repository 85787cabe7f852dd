//! Repository over a remote resource.
//!
//! The state only ever holds the last successfully fetched snapshot; a
//! mutation is never applied locally. Overlapping refreshes are sequenced:
//! each takes a ticket, and a response older than the newest one already
//! applied is dropped.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::entities::RemoteEntity;
use crate::error::{ErrorInfo, Result};
use crate::reactive::Unsubscribe;
use crate::remote::types::{RemoteSource, TypedRemote};

use super::state::{RepositoryState, StateCell};
use super::{merge_fields, Repository};

#[derive(Debug, Default)]
struct RefreshSequence {
    /// Last ticket handed out.
    issued: u64,
    /// Newest ticket whose response was applied.
    applied: u64,
}

pub struct RemoteRepository<T: RemoteEntity> {
    remote: TypedRemote<T>,
    state: Arc<StateCell<T>>,
    sequence: Mutex<RefreshSequence>,
}

impl<T: RemoteEntity> RemoteRepository<T> {
    /// Starts empty and idle; call [`Repository::refresh`] to load.
    pub fn new(source: Arc<dyn RemoteSource>) -> Self {
        Self {
            remote: TypedRemote::new(source),
            state: Arc::new(StateCell::new(RepositoryState::default())),
            sequence: Mutex::new(RefreshSequence::default()),
        }
    }

    /// Fetch one entity from the service. The state is not changed unless
    /// the request fails.
    pub async fn get(&self, id: &str) -> Result<T> {
        let result = self.remote.get(id).await;
        self.track(result)
    }

    fn track<R>(&self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            self.state.fail(e);
        }
        result
    }

    /// Refresh after a successful mutation. A failed refresh is already
    /// recorded in the state; the mutation itself still succeeded.
    async fn refresh_after_mutation(&self) {
        if let Err(e) = self.refresh().await {
            warn!(resource = T::RESOURCE, error = %e, "refresh after mutation failed");
        }
    }

    fn validate_merged(&self, id: &str, partial: &Value) -> Result<()> {
        let current = self
            .state
            .get()
            .data
            .into_iter()
            .find(|item| item.remote_id() == Some(id));
        let Some(current) = current else {
            return Ok(());
        };
        let mut merged = serde_json::to_value(&current)?;
        merge_fields(&mut merged, partial);
        let candidate: T = serde_json::from_value(merged)?;
        candidate.validate()?;
        Ok(())
    }
}

#[async_trait]
impl<T: RemoteEntity> Repository for RemoteRepository<T> {
    type Item = T;
    type Key = String;

    fn state(&self) -> RepositoryState<T> {
        self.state.get()
    }

    fn on_state_change<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&RepositoryState<T>) + Send + Sync + 'static,
    {
        self.state.subscribe(listener)
    }

    async fn refresh(&self) -> Result<()> {
        let ticket = {
            let mut seq = self.sequence.lock();
            seq.issued += 1;
            seq.issued
        };
        self.state.update(|s| s.is_loading = true);

        let result = self.remote.list().await;

        let snapshot = {
            let mut seq = self.sequence.lock();
            if ticket < seq.applied {
                debug!(
                    resource = T::RESOURCE,
                    ticket,
                    applied = seq.applied,
                    "discarding stale refresh response"
                );
                return result.map(|_| ());
            }
            seq.applied = ticket;
            let newer_outstanding = seq.issued > ticket;
            match &result {
                Ok(items) => self.state.apply(|s| {
                    s.data = items.clone();
                    s.error = None;
                    s.is_loading = newer_outstanding;
                }),
                Err(e) => {
                    let info = ErrorInfo::from(e);
                    self.state.apply(|s| {
                        s.error = Some(info);
                        s.is_loading = newer_outstanding;
                    })
                }
            }
        };
        self.state.notify(&snapshot);
        result.map(|_| ())
    }

    async fn create(&self, item: T) -> Result<T> {
        if let Err(e) = item.validate() {
            return self.track(Err(e.into()));
        }
        let created = self.track(self.remote.create(&item).await)?;
        self.refresh_after_mutation().await;
        Ok(created)
    }

    async fn update(&self, key: String, partial: Value) -> Result<T> {
        self.track(self.validate_merged(&key, &partial))?;
        let updated = self.track(self.remote.update(&key, partial).await)?;
        self.refresh_after_mutation().await;
        Ok(updated)
    }

    async fn delete(&self, key: String) -> Result<()> {
        self.track(self.remote.delete(&key).await)?;
        self.refresh_after_mutation().await;
        Ok(())
    }
}
