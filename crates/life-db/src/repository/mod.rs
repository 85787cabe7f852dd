//! Repository layer: one uniform contract per entity, whether the entity
//! lives in the embedded store or behind a remote service.
//!
//! - [`LocalRepository`] follows a live query; its data changes on its own
//!   after every write to the entity's table.
//! - [`RemoteRepository`] holds the last fetched snapshot and refreshes after
//!   every successful mutation.
//!
//! Both record a failed operation in [`RepositoryState::error`], keep the
//! previous data and return the error to the caller.

pub mod local;
pub mod queries;
pub mod remote;
pub mod routines;
pub mod state;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::reactive::Unsubscribe;

pub use local::LocalRepository;
pub use remote::RemoteRepository;
pub use state::RepositoryState;

#[async_trait]
pub trait Repository: Send + Sync {
    type Item: Clone + Send + Sync + 'static;
    type Key: Send + Sync + 'static;

    /// Snapshot of the current state.
    fn state(&self) -> RepositoryState<Self::Item>;

    /// Call `listener` after every state change.
    fn on_state_change<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&RepositoryState<Self::Item>) + Send + Sync + 'static,
        Self: Sized;

    async fn refresh(&self) -> Result<()>;

    async fn create(&self, item: Self::Item) -> Result<Self::Item>;

    /// Merge `partial` into the item identified by `key`.
    async fn update(&self, key: Self::Key, partial: Value) -> Result<Self::Item>;

    async fn delete(&self, key: Self::Key) -> Result<()>;
}

/// Shallow merge of the fields of `partial` into `base`.
pub(crate) fn merge_fields(base: &mut Value, partial: &Value) {
    if let (Value::Object(target), Value::Object(fields)) = (base, partial) {
        for (k, v) in fields {
            target.insert(k.clone(), v.clone());
        }
    }
}
