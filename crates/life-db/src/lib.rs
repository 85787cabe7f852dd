//! Local-first data layer for a personal life-management client.
//!
//! An embedded store with a versioned schema and secondary indexes, a query
//! engine over it, live subscriptions that re-run after writes, a REST
//! source for remotely owned records, and repositories that put both behind
//! one `{data, is_loading, error}` contract.

pub mod config;
pub mod entities;
pub mod error;
pub mod index;
pub mod query;
pub mod reactive;
pub mod remote;
pub mod repository;
pub mod schema;
pub mod storage;
pub mod types;

pub use error::{LifeDbError, Result};
