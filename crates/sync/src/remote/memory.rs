//! In-process remote store for tests and offline demos.
//!
//! Holds the authoritative wishlist and cart per identity scope. A mutation
//! takes effect the moment it is dispatched; only its *response* can be
//! delayed, which lets tests force responses to resolve out of issuance
//! order the way a real network does.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rust_decimal::Decimal;
use shopfront_core::{IdentityScope, IdentityToken, ProductId, Quantity};
use tracing::debug;

use super::RemoteStore;
use crate::error::RemoteError;
use crate::model::{Cart, CartLine, Product};

/// Which remote call a delay or failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCall {
    FetchWishlist,
    AddWishlistItem,
    RemoveWishlistItem,
    FetchCart,
    AddCartItem,
    SetCartItemQuantity,
    RemoveCartItem,
}

/// A call observed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Which endpoint was hit.
    pub call: RemoteCall,
    /// Scope of the caller.
    pub scope: IdentityScope,
    /// Target product, for mutations.
    pub product_id: Option<ProductId>,
    /// Requested quantity, for quantity changes.
    pub quantity: Option<u32>,
}

#[derive(Default)]
struct MemoryState {
    catalog: HashMap<ProductId, Product>,
    wishlists: HashMap<IdentityScope, Vec<ProductId>>,
    carts: HashMap<IdentityScope, Vec<(ProductId, u32)>>,
    delays: HashMap<RemoteCall, VecDeque<Duration>>,
    failures: HashMap<RemoteCall, usize>,
    calls: Vec<RecordedCall>,
}

/// Authoritative in-memory remote store.
#[derive(Clone, Default)]
pub struct InMemoryRemoteStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRemoteStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose catalog holds `products`.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        for product in products {
            store.insert_product(product);
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Seeding and Inspection
    // =========================================================================

    /// Add a product to the catalog.
    pub fn insert_product(&self, product: Product) {
        self.lock().catalog.insert(product.id.clone(), product);
    }

    /// Replace the authoritative wishlist for `identity`.
    pub fn seed_wishlist(&self, identity: &IdentityToken, ids: &[&str]) {
        self.lock().wishlists.insert(
            identity.scope().clone(),
            ids.iter().map(|id| ProductId::new(*id)).collect(),
        );
    }

    /// Replace the authoritative cart for `identity`.
    pub fn seed_cart(&self, identity: &IdentityToken, lines: &[(&str, u32)]) {
        self.lock().carts.insert(
            identity.scope().clone(),
            lines
                .iter()
                .map(|(id, quantity)| (ProductId::new(*id), *quantity))
                .collect(),
        );
    }

    /// Delay the response of the next `call` by `delay`. Delays queue up.
    pub fn delay_next(&self, call: RemoteCall, delay: Duration) {
        self.lock().delays.entry(call).or_default().push_back(delay);
    }

    /// Make the next `count` invocations of `call` fail without effect.
    pub fn fail_next(&self, call: RemoteCall, count: usize) {
        *self.lock().failures.entry(call).or_default() += count;
    }

    /// Current authoritative wishlist for `identity`.
    #[must_use]
    pub fn wishlist_of(&self, identity: &IdentityToken) -> Vec<Product> {
        let state = self.lock();
        state.wishlist_view(identity.scope())
    }

    /// Current authoritative cart for `identity`.
    #[must_use]
    pub fn cart_of(&self, identity: &IdentityToken) -> Cart {
        let state = self.lock();
        state.cart_view(identity.scope())
    }

    /// Every call observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Number of times `call` was invoked.
    #[must_use]
    pub fn call_count(&self, call: RemoteCall) -> usize {
        self.lock().calls.iter().filter(|c| c.call == call).count()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Record the call, consume any injected failure and delay, and apply
    /// `effect` to the state unless the call fails.
    async fn dispatch<T>(
        &self,
        call: RecordedCall,
        effect: impl FnOnce(&mut MemoryState, &IdentityScope) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let (delay, result) = {
            let mut state = self.lock();
            let kind = call.call;
            let scope = call.scope.clone();
            state.calls.push(call);

            let delay = state
                .delays
                .get_mut(&kind)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Duration::ZERO);

            let fail = state.failures.get_mut(&kind).is_some_and(|remaining| {
                if *remaining > 0 {
                    *remaining -= 1;
                    true
                } else {
                    false
                }
            });

            let result = if fail {
                debug!(call = ?kind, "Injected remote failure");
                Err(RemoteError::Unavailable(format!("injected failure for {kind:?}")))
            } else {
                effect(&mut state, &scope)
            };
            (delay, result)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    fn record(
        call: RemoteCall,
        identity: &IdentityToken,
        product_id: Option<&ProductId>,
        quantity: Option<u32>,
    ) -> RecordedCall {
        RecordedCall {
            call,
            scope: identity.scope().clone(),
            product_id: product_id.cloned(),
            quantity,
        }
    }
}

impl MemoryState {
    fn product(&self, id: &ProductId) -> Product {
        self.catalog
            .get(id)
            .cloned()
            .unwrap_or_else(|| Product::from_id(id.clone()))
    }

    fn require_product(&self, id: &ProductId) -> Result<(), RemoteError> {
        if self.catalog.contains_key(id) {
            Ok(())
        } else {
            Err(RemoteError::Rejected(format!("No product found for id {id}")))
        }
    }

    fn wishlist_view(&self, scope: &IdentityScope) -> Vec<Product> {
        self.wishlists
            .get(scope)
            .map(|ids| ids.iter().map(|id| self.product(id)).collect())
            .unwrap_or_default()
    }

    fn cart_view(&self, scope: &IdentityScope) -> Cart {
        let lines: Vec<CartLine> = self
            .carts
            .get(scope)
            .map(|lines| {
                lines
                    .iter()
                    .map(|(id, quantity)| {
                        let product = self.product(id);
                        let line_total =
                            product.price.unwrap_or(Decimal::ZERO) * Decimal::from(*quantity);
                        CartLine {
                            product,
                            quantity: *quantity,
                            line_total,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut cart = Cart {
            id: None,
            lines,
            item_count: 0,
            subtotal: Decimal::ZERO,
        };
        cart.recompute_totals();
        cart
    }
}

impl RemoteStore for InMemoryRemoteStore {
    async fn fetch_wishlist(&self, identity: &IdentityToken) -> Result<Vec<Product>, RemoteError> {
        let call = Self::record(RemoteCall::FetchWishlist, identity, None, None);
        self.dispatch(call, |state, scope| Ok(state.wishlist_view(scope)))
            .await
    }

    async fn add_wishlist_item(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
    ) -> Result<Vec<Product>, RemoteError> {
        let call = Self::record(RemoteCall::AddWishlistItem, identity, Some(product_id), None);
        self.dispatch(call, |state, scope| {
            state.require_product(product_id)?;
            let ids = state.wishlists.entry(scope.clone()).or_default();
            if !ids.contains(product_id) {
                ids.push(product_id.clone());
            }
            Ok(state.wishlist_view(scope))
        })
        .await
    }

    async fn remove_wishlist_item(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
    ) -> Result<Vec<Product>, RemoteError> {
        let call = Self::record(
            RemoteCall::RemoveWishlistItem,
            identity,
            Some(product_id),
            None,
        );
        self.dispatch(call, |state, scope| {
            if let Some(ids) = state.wishlists.get_mut(scope) {
                ids.retain(|id| id != product_id);
            }
            Ok(state.wishlist_view(scope))
        })
        .await
    }

    async fn fetch_cart(&self, identity: &IdentityToken) -> Result<Cart, RemoteError> {
        let call = Self::record(RemoteCall::FetchCart, identity, None, None);
        self.dispatch(call, |state, scope| Ok(state.cart_view(scope)))
            .await
    }

    async fn add_cart_item(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
    ) -> Result<Cart, RemoteError> {
        let call = Self::record(RemoteCall::AddCartItem, identity, Some(product_id), None);
        self.dispatch(call, |state, scope| {
            state.require_product(product_id)?;
            let lines = state.carts.entry(scope.clone()).or_default();
            match lines.iter_mut().find(|(id, _)| id == product_id) {
                Some((_, quantity)) => *quantity = quantity.saturating_add(1),
                None => lines.push((product_id.clone(), 1)),
            }
            Ok(state.cart_view(scope))
        })
        .await
    }

    async fn set_cart_item_quantity(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<Cart, RemoteError> {
        let call = Self::record(
            RemoteCall::SetCartItemQuantity,
            identity,
            Some(product_id),
            Some(quantity.get()),
        );
        self.dispatch(call, |state, scope| {
            state.require_product(product_id)?;
            let lines = state.carts.entry(scope.clone()).or_default();
            match lines.iter_mut().find(|(id, _)| id == product_id) {
                Some((_, current)) => *current = quantity.get(),
                None => lines.push((product_id.clone(), quantity.get())),
            }
            Ok(state.cart_view(scope))
        })
        .await
    }

    async fn remove_cart_item(
        &self,
        identity: &IdentityToken,
        product_id: &ProductId,
    ) -> Result<Cart, RemoteError> {
        let call = Self::record(RemoteCall::RemoveCartItem, identity, Some(product_id), None);
        self.dispatch(call, |state, scope| {
            if let Some(lines) = state.carts.get_mut(scope) {
                lines.retain(|(id, _)| id != product_id);
            }
            Ok(state.cart_view(scope))
        })
        .await
    }
}
