//! Reactive layer: synchronous subscriptions over `Store<B>`.
//!
//! # Overview
//!
//! [`LiveStore`] wraps a [`Store`](crate::storage::Store) and adds `observe` /
//! `observe_query` / `observe_record` / `on_change` subscriptions. Callbacks
//! fire synchronously during `flush()`, which is called automatically after
//! every committed write.
//!
//! # Modules
//!
//! - [`event`]: [`ChangeEvent`] enum.
//! - [`event_emitter`]: Generic typed pub/sub ([`EventEmitter<T>`]).
//! - [`subscription`]: [`Subscription`] handles and their lifecycle.
//! - [`live_store`]: [`LiveStore<B>`] and [`LiveTransaction`].

pub mod event;
pub mod event_emitter;
pub mod live_store;
pub mod subscription;

pub use event::ChangeEvent;
pub use event_emitter::{EventEmitter, ListenerId};
pub use live_store::{Dependency, LiveStore, LiveTransaction};
pub use subscription::{Subscription, SubscriptionState, Unsubscribe};
