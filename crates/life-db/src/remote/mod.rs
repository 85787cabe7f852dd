//! Remote data sources for entities owned by a network service.

#[cfg(feature = "http")]
pub mod http;
pub mod types;

#[cfg(feature = "http")]
pub use http::HttpRemoteSource;
pub use types::{RemoteSource, TypedRemote};
