//! Integration tests for Shopfront.
//!
//! Scenario tests drive the public [`MirrorEngine`] API against the
//! in-memory remote store, using paused tokio time to force remote
//! responses to resolve in a chosen order.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `wishlist_scenarios` - Optimistic add/remove, rollback, racing toggles
//! - `cart_quantities` - Quantity floor, steppers, server totals
//! - `identity_scope` - Scope isolation across identity changes
//! - `read_supersession` - Stale reads never clobber optimistic values

use rust_decimal::Decimal;
use shopfront_core::{IdentityToken, ProductId};
use shopfront_sync::remote::memory::InMemoryRemoteStore;
use shopfront_sync::{EngineConfig, MirrorEngine, MirrorEvent, Notification, Product};
use tokio::sync::broadcast::{self, error::TryRecvError};

/// A catalog product with a whole-number price.
#[must_use]
pub fn product(id: &str, price: i64) -> Product {
    Product {
        title: format!("Product {id}"),
        price: Some(Decimal::from(price)),
        ..Product::from_id(ProductId::new(id))
    }
}

/// The catalog every harness starts with: `P1` at 20, `P2` at 5, `P3` at 12.
#[must_use]
pub fn catalog() -> Vec<Product> {
    vec![product("P1", 20), product("P2", 5), product("P3", 12)]
}

/// IDs of `products`, in order.
#[must_use]
pub fn ids(products: &[Product]) -> Vec<&str> {
    products.iter().map(|product| product.id.as_str()).collect()
}

/// Every notice waiting on `events`.
pub fn drain_notices(events: &mut broadcast::Receiver<MirrorEvent>) -> Vec<Notification> {
    let mut notices = Vec::new();
    loop {
        match events.try_recv() {
            Ok(MirrorEvent::Notice(notice)) => notices.push(notice),
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    notices
}

/// An engine signed in as `alice` over an in-memory remote store.
pub struct Harness {
    /// The engine under test.
    pub engine: MirrorEngine<InMemoryRemoteStore>,
    /// The signed-in identity.
    pub alice: IdentityToken,
}

impl Harness {
    /// Create a harness with the default catalog and empty collections.
    #[must_use]
    pub fn new() -> Self {
        let engine = MirrorEngine::new(
            InMemoryRemoteStore::with_products(catalog()),
            EngineConfig::default(),
        );
        let alice = IdentityToken::new("alice-session-token");
        engine.set_identity(Some(alice.clone()));
        Self { engine, alice }
    }

    /// The authoritative store behind the engine.
    #[must_use]
    pub fn remote(&self) -> &InMemoryRemoteStore {
        self.engine.remote()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
