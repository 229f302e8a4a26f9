//! Remote store clients.
//!
//! # Architecture
//!
//! - The remote store is the source of truth; the mirror only caches it
//! - Every mutating call returns the *entire* updated collection, never a
//!   delta, so a successful mutation is committed as a full replace
//! - Calls are scoped by the caller's [`IdentityToken`]
//!
//! # Implementations
//!
//! - [`HttpRemoteStore`] - JSON-over-HTTP client built on `reqwest`
//! - `InMemoryRemoteStore` - authoritative in-process store with latency and
//!   failure injection (feature `test-util`)

mod conversions;
mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;

use std::future::Future;

use shopfront_core::{IdentityToken, ProductId, Quantity};

pub use http::HttpRemoteStore;

use crate::error::RemoteError;
use crate::model::{Cart, Product};

/// Capability to read and mutate the authoritative wishlist and cart.
pub trait RemoteStore: Send + Sync {
    /// Fetch the wishlist for `identity`.
    fn fetch_wishlist(
        &self,
        identity: &IdentityToken,
    ) -> impl Future<Output = Result<Vec<Product>, RemoteError>> + Send;

    /// Add a product to the wishlist; returns the full updated wishlist.
    fn add_wishlist_item(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<Vec<Product>, RemoteError>> + Send;

    /// Remove a product from the wishlist; returns the full updated wishlist.
    fn remove_wishlist_item(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<Vec<Product>, RemoteError>> + Send;

    /// Fetch the cart for `identity`.
    fn fetch_cart(
        &self,
        identity: &IdentityToken,
    ) -> impl Future<Output = Result<Cart, RemoteError>> + Send;

    /// Add one of a product to the cart; returns the full updated cart.
    fn add_cart_item(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<Cart, RemoteError>> + Send;

    /// Set a cart line's absolute quantity; returns the full updated cart.
    fn set_cart_item_quantity(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Cart, RemoteError>> + Send;

    /// Remove a cart line; returns the full updated cart.
    fn remove_cart_item(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<Cart, RemoteError>> + Send;
}
