//! Remote source abstraction and its typed wrapper.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::entities::RemoteEntity;
use crate::error::{RemoteError, Result};

/// CRUD over JSON resources owned by a remote service.
///
/// Each call is one request. Implementations never retry and never cache.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn list(&self, resource: &str) -> Result<Vec<Value>>;

    async fn get(&self, resource: &str, id: &str) -> Result<Value>;

    /// Create a resource and return the service's representation of it.
    async fn create(&self, resource: &str, body: Value) -> Result<Value>;

    async fn update(&self, resource: &str, id: &str, patch: Value) -> Result<Value>;

    async fn delete(&self, resource: &str, id: &str) -> Result<()>;
}

/// A [`RemoteSource`] bound to one entity type.
pub struct TypedRemote<T> {
    source: Arc<dyn RemoteSource>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedRemote<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            _marker: PhantomData,
        }
    }
}

impl<T: RemoteEntity> TypedRemote<T> {
    pub fn new(source: Arc<dyn RemoteSource>) -> Self {
        Self {
            source,
            _marker: PhantomData,
        }
    }

    pub fn source(&self) -> &Arc<dyn RemoteSource> {
        &self.source
    }

    pub async fn list(&self) -> Result<Vec<T>> {
        self.source
            .list(T::RESOURCE)
            .await?
            .into_iter()
            .map(decode::<T>)
            .collect()
    }

    pub async fn get(&self, id: &str) -> Result<T> {
        decode(self.source.get(T::RESOURCE, id).await?)
    }

    pub async fn create(&self, item: &T) -> Result<T> {
        let body = serde_json::to_value(item)?;
        decode(self.source.create(T::RESOURCE, body).await?)
    }

    pub async fn update(&self, id: &str, patch: Value) -> Result<T> {
        decode(self.source.update(T::RESOURCE, id, patch).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.source.delete(T::RESOURCE, id).await
    }
}

fn decode<T: RemoteEntity>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        RemoteError::Decode(format!("{} payload: {e}", T::RESOURCE)).into()
    })
}
