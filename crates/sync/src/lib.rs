//! Shopfront Sync - Optimistic mirror of a remote wishlist and cart.
//!
//! User mutations are applied to a local mirror immediately, sent to the
//! remote store, then either committed with the server's canonical
//! collection or rolled back to the value captured before the mutation.
//! Every mutation ends with a settle read so the mirror converges on the
//! server's truth even when responses arrive out of order.
//!
//! # Architecture
//!
//! - [`mirror`] - Keyed local store; the only writer of values and pending flags
//! - [`coordinator`] - Drives the optimistic lifecycle of each mutation
//! - [`reconciler`] - Commit, rollback and settle paths back to server truth
//! - [`remote`] - The remote store trait with HTTP and in-memory clients
//! - [`engine`] - [`MirrorEngine`], the facade a presentation layer binds to
//!
//! # Modules
//!
//! - [`apply`] - Pure optimistic-apply functions
//! - [`config`] - Environment-driven configuration
//! - [`error`] - Remote store errors
//! - [`events`] - Change and notice events
//! - [`model`] - Domain collections and keys

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod apply;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod mirror;
pub mod model;
pub mod reconciler;
pub mod remote;

pub use config::{ConfigError, EngineConfig, RemoteStoreConfig, ShopfrontConfig};
pub use coordinator::{KeyState, MutationKind, MutationOutcome, PendingOperation};
pub use engine::MirrorEngine;
pub use error::RemoteError;
pub use events::{MirrorEvent, NoticeLevel, Notification};
pub use model::{Cart, CartLine, EntityCollection, EntityKind, MirrorKey, Product};
pub use remote::{HttpRemoteStore, RemoteStore};
