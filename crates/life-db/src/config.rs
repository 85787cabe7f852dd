//! Option structs for opening stores and remote sources.
//!
//! Both are plain serde structs with `Default`, so they can be embedded in a
//! host application's own configuration file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::registry::SchemaRegistry;
use crate::storage::{MemoryBackend, Store};
#[cfg(feature = "sqlite")]
use crate::storage::SqliteBackend;

/// Where and how the embedded store keeps its data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite database file. `None` keeps the database in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Maximum number of records the in-memory backend accepts.
    #[serde(default)]
    pub memory_quota: Option<usize>,
}

impl StoreConfig {
    /// Open a SQLite-backed store at `path`, or an in-memory SQLite
    /// database when no path is configured.
    #[cfg(feature = "sqlite")]
    pub fn open_sqlite(&self, registry: &SchemaRegistry) -> Result<Store<SqliteBackend>> {
        let backend = match &self.path {
            Some(path) => SqliteBackend::open(path)?,
            None => SqliteBackend::open_in_memory()?,
        };
        Store::open(backend, registry)
    }

    /// Open a store over the in-process backend.
    pub fn open_memory(&self, registry: &SchemaRegistry) -> Result<Store<MemoryBackend>> {
        let backend = match self.memory_quota {
            Some(quota) => MemoryBackend::with_quota(quota),
            None => MemoryBackend::new(),
        };
        Store::open(backend, registry)
    }
}

/// Connection settings for a remote REST service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Base URL; resources are addressed as `{base_url}/{resource}`.
    pub base_url: String,

    /// Sent as `Authorization: Bearer <token>` when present.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Per-request timeout. No timeout when absent.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_token: None,
            timeout_ms: None,
        }
    }
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}
