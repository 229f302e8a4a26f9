//! The presentation-facing mirror engine.
//!
//! [`MirrorEngine`] owns the mirror, the coordinator and the remote client,
//! and exposes the reads and mutation entry points a UI binds to. It is
//! cheap to clone; every clone shares the same state.
//!
//! # Example
//!
//! ```ignore
//! let engine = MirrorEngine::new(HttpRemoteStore::new(&config.remote)?, config.engine);
//! engine.set_identity(config.identity());
//! engine.load(EntityKind::Wishlist).await?;
//!
//! let outcome = engine.toggle_wishlist(product).await;
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use shopfront_core::{IdentityScope, IdentityToken, ProductId, Quantity};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::apply;
use crate::config::EngineConfig;
use crate::coordinator::{
    KeyState, Mutation, MutationCoordinator, MutationKind, MutationOutcome, PendingOperation,
};
use crate::error::RemoteError;
use crate::events::MirrorEvent;
use crate::mirror::MirrorStore;
use crate::model::{Cart, EntityCollection, EntityKind, MirrorKey, Product};
use crate::reconciler::Reconciler;
use crate::remote::RemoteStore;

struct EngineInner<R> {
    mirror: MirrorStore,
    coordinator: MutationCoordinator,
    remote: R,
    config: EngineConfig,
    identity: RwLock<Option<IdentityToken>>,
}

/// Optimistic mirror of the signed-in user's wishlist and cart.
pub struct MirrorEngine<R> {
    inner: Arc<EngineInner<R>>,
}

impl<R> Clone for MirrorEngine<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: RemoteStore> MirrorEngine<R> {
    /// Create an engine with no identity.
    #[must_use]
    pub fn new(remote: R, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                mirror: MirrorStore::new(config.event_buffer),
                coordinator: MutationCoordinator::new(),
                remote,
                config,
                identity: RwLock::new(None),
            }),
        }
    }

    /// The remote store this engine talks to.
    #[must_use]
    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Switch the signed-in identity.
    ///
    /// Entries of the previous identity are retired, and any response still
    /// in flight for it is dropped when it resolves. Returns `true` if the
    /// scope changed.
    pub fn set_identity(&self, identity: Option<IdentityToken>) -> bool {
        let scope = identity.as_ref().map(|token| token.scope().clone());
        let changed = {
            // The mirror scope only moves while the identity is locked, so
            // reads and mutations always agree on the active scope.
            let mut current = self
                .inner
                .identity
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let changed = self.inner.mirror.activate_scope(scope.clone());
            *current = identity;
            changed
        };
        if changed {
            match scope {
                Some(scope) => info!(scope = %scope, "Identity scope activated"),
                None => info!("Identity cleared"),
            }
        }
        changed
    }

    /// Fingerprint of the current identity.
    #[must_use]
    pub fn identity_scope(&self) -> Option<IdentityScope> {
        self.inner
            .identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|token| token.scope().clone())
    }

    fn scoped(&self, kind: EntityKind) -> Option<(IdentityToken, MirrorKey)> {
        let identity = self
            .inner
            .identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        let key = MirrorKey::new(kind, identity.scope().clone());
        Some((identity, key))
    }

    fn key(&self, kind: EntityKind) -> Option<MirrorKey> {
        self.identity_scope().map(|scope| MirrorKey::new(kind, scope))
    }

    fn reconciler(&self) -> Reconciler<'_, R> {
        Reconciler::new(&self.inner.mirror, &self.inner.remote)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Latest locally known value for `kind`. Never blocks.
    #[must_use]
    pub fn read(&self, kind: EntityKind) -> Option<EntityCollection> {
        self.key(kind).and_then(|key| self.inner.mirror.read(&key))
    }

    /// Products currently shown in the wishlist.
    #[must_use]
    pub fn wishlist(&self) -> Vec<Product> {
        self.read(EntityKind::Wishlist)
            .and_then(|value| value.as_wishlist().map(<[Product]>::to_vec))
            .unwrap_or_default()
    }

    /// The cart currently shown, if loaded.
    #[must_use]
    pub fn cart(&self) -> Option<Cart> {
        self.read(EntityKind::Cart)
            .and_then(|value| value.as_cart().cloned())
    }

    /// Whether `product_id` is in the displayed wishlist.
    #[must_use]
    pub fn contains_in_wishlist(&self, product_id: &ProductId) -> bool {
        self.wishlist()
            .iter()
            .any(|product| &product.id == product_id)
    }

    /// Whether a mutation on `kind` is in flight.
    #[must_use]
    pub fn is_pending(&self, kind: EntityKind) -> bool {
        self.key(kind)
            .is_some_and(|key| self.inner.mirror.is_pending(&key))
    }

    /// Message of the last failed mutation on `kind`.
    #[must_use]
    pub fn last_error(&self, kind: EntityKind) -> Option<String> {
        self.key(kind)
            .and_then(|key| self.inner.mirror.last_error(&key))
    }

    /// Lifecycle state of `kind`.
    #[must_use]
    pub fn key_state(&self, kind: EntityKind) -> KeyState {
        self.key(kind)
            .map_or(KeyState::Idle, |key| self.inner.coordinator.key_state(&key))
    }

    /// Mutations issued but not yet resolved.
    #[must_use]
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        self.inner.coordinator.pending_operations()
    }

    /// Subscribe to mirror events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MirrorEvent> {
        self.inner.mirror.subscribe()
    }

    // =========================================================================
    // Loads
    // =========================================================================

    /// Fetch `kind` if it was never loaded or has been invalidated.
    ///
    /// # Errors
    ///
    /// Returns the remote error if every attempt failed. The mirror keeps its
    /// current value.
    pub async fn load(&self, kind: EntityKind) -> Result<(), RemoteError> {
        let Some((identity, key)) = self.scoped(kind) else {
            debug!(kind = %kind, "No identity, skipping load");
            return Ok(());
        };
        if !self.inner.mirror.needs_fetch(&key) {
            return Ok(());
        }
        self.fetch(&identity, &key).await
    }

    /// Mark `kind` for re-fetch on the next [`load`](Self::load).
    ///
    /// Reads already in flight for it are discarded when they resolve.
    pub fn invalidate(&self, kind: EntityKind) {
        if let Some(key) = self.key(kind) {
            self.inner.mirror.invalidate(&key);
        }
    }

    /// Fetch `kind` unconditionally.
    ///
    /// # Errors
    ///
    /// Returns the remote error if every attempt failed. The mirror keeps its
    /// current value.
    pub async fn refresh(&self, kind: EntityKind) -> Result<(), RemoteError> {
        let Some((identity, key)) = self.scoped(kind) else {
            debug!(kind = %kind, "No identity, skipping refresh");
            return Ok(());
        };
        self.fetch(&identity, &key).await
    }

    async fn fetch(&self, identity: &IdentityToken, key: &MirrorKey) -> Result<(), RemoteError> {
        let applied = self
            .reconciler()
            .fetch(key, identity, self.inner.config.read_retries)
            .await?;
        debug!(key = %key, applied, "Read fetch resolved");
        Ok(())
    }

    // =========================================================================
    // Wishlist Mutations
    // =========================================================================

    /// Add `product` to the wishlist.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_wishlist(&self, product: Product) -> MutationOutcome {
        let Some((identity, key)) = self.scoped(EntityKind::Wishlist) else {
            return skipped();
        };
        let identity = &identity;
        let remote = &self.inner.remote;
        let mutation = Mutation {
            key,
            kind: MutationKind::Add,
            target_id: product.id.clone(),
        };

        self.inner
            .coordinator
            .perform(
                &self.reconciler(),
                identity,
                mutation,
                |current, _, _| apply::wishlist_add(current, &product),
                |target_id, _| async move {
                    remote
                        .add_wishlist_item(identity, &target_id)
                        .await
                        .map(EntityCollection::Wishlist)
                },
            )
            .await
    }

    /// Remove `product_id` from the wishlist.
    #[instrument(skip(self))]
    pub async fn remove_from_wishlist(&self, product_id: &ProductId) -> MutationOutcome {
        let Some((identity, key)) = self.scoped(EntityKind::Wishlist) else {
            return skipped();
        };
        let identity = &identity;
        let remote = &self.inner.remote;
        let mutation = Mutation {
            key,
            kind: MutationKind::Remove,
            target_id: product_id.clone(),
        };

        self.inner
            .coordinator
            .perform(
                &self.reconciler(),
                identity,
                mutation,
                |current, _, target_id| apply::wishlist_remove(current, target_id),
                |target_id, _| async move {
                    remote
                        .remove_wishlist_item(identity, &target_id)
                        .await
                        .map(EntityCollection::Wishlist)
                },
            )
            .await
    }

    /// Add `product` if it is not displayed in the wishlist, remove it if it
    /// is. Decides from the optimistic value, so repeated taps alternate.
    pub async fn toggle_wishlist(&self, product: Product) -> MutationOutcome {
        if self.contains_in_wishlist(&product.id) {
            self.remove_from_wishlist(&product.id).await
        } else {
            self.add_to_wishlist(product).await
        }
    }

    // =========================================================================
    // Cart Mutations
    // =========================================================================

    /// Add one of `product` to the cart.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_cart(&self, product: Product) -> MutationOutcome {
        let Some((identity, key)) = self.scoped(EntityKind::Cart) else {
            return skipped();
        };
        let identity = &identity;
        let remote = &self.inner.remote;
        let mutation = Mutation {
            key,
            kind: MutationKind::Add,
            target_id: product.id.clone(),
        };

        self.inner
            .coordinator
            .perform(
                &self.reconciler(),
                identity,
                mutation,
                |current, _, _| apply::cart_add(current, &product),
                |target_id, _| async move {
                    remote
                        .add_cart_item(identity, &target_id)
                        .await
                        .map(EntityCollection::Cart)
                },
            )
            .await
    }

    /// Set the absolute quantity of a cart line. Values below one are
    /// clamped to one.
    #[instrument(skip(self))]
    pub async fn set_cart_quantity(&self, product_id: &ProductId, quantity: i64) -> MutationOutcome {
        self.update_cart_quantity(product_id, Quantity::clamped(quantity))
            .await
    }

    /// One more of a cart line.
    pub async fn increment_cart_quantity(&self, product_id: &ProductId) -> MutationOutcome {
        let quantity = self.displayed_quantity(product_id).incremented();
        self.update_cart_quantity(product_id, quantity).await
    }

    /// One fewer of a cart line, never below one.
    pub async fn decrement_cart_quantity(&self, product_id: &ProductId) -> MutationOutcome {
        let quantity = self.displayed_quantity(product_id).decremented();
        self.update_cart_quantity(product_id, quantity).await
    }

    /// Remove a cart line.
    #[instrument(skip(self))]
    pub async fn remove_from_cart(&self, product_id: &ProductId) -> MutationOutcome {
        let Some((identity, key)) = self.scoped(EntityKind::Cart) else {
            return skipped();
        };
        let identity = &identity;
        let remote = &self.inner.remote;
        let mutation = Mutation {
            key,
            kind: MutationKind::Remove,
            target_id: product_id.clone(),
        };

        self.inner
            .coordinator
            .perform(
                &self.reconciler(),
                identity,
                mutation,
                |current, _, target_id| apply::cart_remove(current, target_id),
                |target_id, _| async move {
                    remote
                        .remove_cart_item(identity, &target_id)
                        .await
                        .map(EntityCollection::Cart)
                },
            )
            .await
    }

    async fn update_cart_quantity(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> MutationOutcome {
        let Some((identity, key)) = self.scoped(EntityKind::Cart) else {
            return skipped();
        };
        let identity = &identity;
        let remote = &self.inner.remote;
        let mutation = Mutation {
            key,
            kind: MutationKind::SetQuantity(quantity),
            target_id: product_id.clone(),
        };

        self.inner
            .coordinator
            .perform(
                &self.reconciler(),
                identity,
                mutation,
                |current, _, target_id| apply::cart_set_quantity(current, target_id, quantity),
                |target_id, _| async move {
                    remote
                        .set_cart_item_quantity(identity, &target_id, quantity)
                        .await
                        .map(EntityCollection::Cart)
                },
            )
            .await
    }

    /// Quantity of the displayed cart line, or the minimum when absent.
    fn displayed_quantity(&self, product_id: &ProductId) -> Quantity {
        self.cart()
            .and_then(|cart| cart.line(product_id).map(|line| line.quantity))
            .and_then(Quantity::new)
            .unwrap_or(Quantity::MIN)
    }
}

fn skipped() -> MutationOutcome {
    debug!("No identity, mutation skipped");
    MutationOutcome::Skipped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    use super::*;
    use crate::remote::memory::{InMemoryRemoteStore, RemoteCall};

    fn product(id: &str, price: i64) -> Product {
        Product {
            price: Some(Decimal::from(price)),
            ..Product::from_id(ProductId::new(id))
        }
    }

    fn engine() -> (MirrorEngine<InMemoryRemoteStore>, IdentityToken) {
        let remote = InMemoryRemoteStore::with_products([product("p1", 20), product("p2", 5)]);
        let engine = MirrorEngine::new(remote, EngineConfig::default());
        let identity = IdentityToken::new("token-a");
        engine.set_identity(Some(identity.clone()));
        (engine, identity)
    }

    #[tokio::test]
    async fn test_load_populates_mirror_once() {
        let (engine, identity) = engine();
        engine.remote().seed_wishlist(&identity, &["p1"]);

        engine.load(EntityKind::Wishlist).await.unwrap();
        engine.load(EntityKind::Wishlist).await.unwrap();

        assert_eq!(engine.wishlist(), vec![product("p1", 20)]);
        assert_eq!(engine.remote().call_count(RemoteCall::FetchWishlist), 1);
    }

    #[tokio::test]
    async fn test_refresh_always_fetches() {
        let (engine, identity) = engine();
        engine.load(EntityKind::Wishlist).await.unwrap();
        engine.remote().seed_wishlist(&identity, &["p2"]);

        engine.refresh(EntityKind::Wishlist).await.unwrap();

        assert_eq!(engine.wishlist(), vec![product("p2", 5)]);
        assert_eq!(engine.remote().call_count(RemoteCall::FetchWishlist), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_next_load() {
        let (engine, identity) = engine();
        engine.load(EntityKind::Wishlist).await.unwrap();
        engine.remote().seed_wishlist(&identity, &["p1"]);

        engine.invalidate(EntityKind::Wishlist);
        assert!(engine.wishlist().is_empty());
        engine.load(EntityKind::Wishlist).await.unwrap();
        engine.load(EntityKind::Wishlist).await.unwrap();

        assert_eq!(engine.wishlist(), vec![product("p1", 20)]);
        assert_eq!(engine.remote().call_count(RemoteCall::FetchWishlist), 2);
    }

    #[test]
    fn test_identity_scope_follows_set_identity() {
        let (engine, identity) = engine();
        assert_eq!(engine.identity_scope().as_ref(), Some(identity.scope()));
        assert_eq!(engine.inner.mirror.active_scope(), engine.identity_scope());

        let other = IdentityToken::new("token-b");
        assert!(engine.set_identity(Some(other.clone())));
        assert!(!engine.set_identity(Some(other.clone())));
        assert_eq!(engine.identity_scope().as_ref(), Some(other.scope()));
        assert_eq!(engine.inner.mirror.active_scope(), engine.identity_scope());

        assert!(engine.set_identity(None));
        assert_eq!(engine.identity_scope(), None);
        assert_eq!(engine.inner.mirror.active_scope(), None);
    }

    #[tokio::test]
    async fn test_toggle_alternates() {
        let (engine, _identity) = engine();

        assert_eq!(
            engine.toggle_wishlist(product("p1", 20)).await,
            MutationOutcome::Committed
        );
        assert!(engine.contains_in_wishlist(&ProductId::new("p1")));

        engine.toggle_wishlist(product("p1", 20)).await;
        assert!(!engine.contains_in_wishlist(&ProductId::new("p1")));
    }

    #[tokio::test]
    async fn test_cart_add_and_steppers() {
        let (engine, _identity) = engine();
        let id = ProductId::new("p1");

        engine.add_to_cart(product("p1", 20)).await;
        engine.increment_cart_quantity(&id).await;
        engine.increment_cart_quantity(&id).await;
        engine.decrement_cart_quantity(&id).await;

        let cart = engine.cart().unwrap();
        assert_eq!(cart.line(&id).unwrap().quantity, 2);
        assert_eq!(cart.subtotal, Decimal::from(40));
    }

    #[tokio::test]
    async fn test_no_identity_skips_everything() {
        let remote = InMemoryRemoteStore::with_products([product("p1", 20)]);
        let engine = MirrorEngine::new(remote, EngineConfig::default());

        assert_eq!(
            engine.add_to_wishlist(product("p1", 20)).await,
            MutationOutcome::Skipped
        );
        assert_eq!(
            engine.set_cart_quantity(&ProductId::new("p1"), 3).await,
            MutationOutcome::Skipped
        );
        engine.load(EntityKind::Cart).await.unwrap();

        assert!(engine.remote().calls().is_empty());
        assert_eq!(engine.read(EntityKind::Wishlist), None);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_value() {
        let (engine, _identity) = engine();
        engine.add_to_wishlist(product("p1", 20)).await;
        engine.remote().fail_next(RemoteCall::FetchWishlist, 2);

        let result = engine.refresh(EntityKind::Wishlist).await;

        assert!(result.is_err());
        assert_eq!(engine.wishlist(), vec![product("p1", 20)]);
    }
}
