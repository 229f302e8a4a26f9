//! The mirror is partitioned by identity; nothing crosses a scope change.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use shopfront_core::{IdentityToken, ProductId};
use shopfront_integration_tests::{Harness, catalog, ids, product};
use shopfront_sync::remote::memory::{InMemoryRemoteStore, RemoteCall};
use shopfront_sync::{EngineConfig, EntityKind, MirrorEngine, MutationOutcome};

#[tokio::test]
async fn switching_identity_retires_the_previous_scope() {
    let h = Harness::new();
    let bob = IdentityToken::new("bob-session-token");
    h.remote().seed_wishlist(&h.alice, &["P1"]);
    h.remote().seed_wishlist(&bob, &["P2", "P3"]);
    h.engine.load(EntityKind::Wishlist).await.unwrap();
    assert_eq!(ids(&h.engine.wishlist()), vec!["P1"]);

    assert!(h.engine.set_identity(Some(bob.clone())));
    assert_eq!(h.engine.identity_scope().as_ref(), Some(bob.scope()));
    assert_eq!(h.engine.read(EntityKind::Wishlist), None);

    h.engine.load(EntityKind::Wishlist).await.unwrap();
    assert_eq!(ids(&h.engine.wishlist()), vec!["P2", "P3"]);

    // Coming back requires a fresh load; the old entries were retired.
    h.engine.set_identity(Some(h.alice.clone()));
    assert_eq!(h.engine.read(EntityKind::Wishlist), None);
    h.engine.load(EntityKind::Wishlist).await.unwrap();
    assert_eq!(ids(&h.engine.wishlist()), vec!["P1"]);
}

#[tokio::test(start_paused = true)]
async fn late_response_for_a_previous_identity_is_dropped() {
    let h = Harness::new();
    let bob = IdentityToken::new("bob-session-token");
    h.remote().seed_wishlist(&bob, &["P3"]);
    h.engine.load(EntityKind::Wishlist).await.unwrap();
    h.remote()
        .delay_next(RemoteCall::AddWishlistItem, Duration::from_millis(50));

    let (outcome, ()) = tokio::join!(h.engine.add_to_wishlist(product("P1", 20)), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.engine.set_identity(Some(bob.clone()));
        h.engine.load(EntityKind::Wishlist).await.unwrap();
    });

    assert_eq!(outcome, MutationOutcome::Committed);
    assert_eq!(ids(&h.engine.wishlist()), vec!["P3"]);
    assert!(!h.engine.is_pending(EntityKind::Wishlist));

    // Alice's mutation still happened on the server.
    assert_eq!(ids(&h.remote().wishlist_of(&h.alice)), vec!["P1"]);
}

#[tokio::test]
async fn no_identity_disables_every_entry_point() {
    let engine = MirrorEngine::new(
        InMemoryRemoteStore::with_products(catalog()),
        EngineConfig::default(),
    );
    let p1 = ProductId::new("P1");

    assert_eq!(
        engine.add_to_wishlist(product("P1", 20)).await,
        MutationOutcome::Skipped
    );
    assert_eq!(
        engine.remove_from_wishlist(&p1).await,
        MutationOutcome::Skipped
    );
    assert_eq!(
        engine.toggle_wishlist(product("P1", 20)).await,
        MutationOutcome::Skipped
    );
    assert_eq!(
        engine.add_to_cart(product("P1", 20)).await,
        MutationOutcome::Skipped
    );
    assert_eq!(
        engine.set_cart_quantity(&p1, 2).await,
        MutationOutcome::Skipped
    );
    assert_eq!(
        engine.increment_cart_quantity(&p1).await,
        MutationOutcome::Skipped
    );
    assert_eq!(
        engine.remove_from_cart(&p1).await,
        MutationOutcome::Skipped
    );
    engine.load(EntityKind::Wishlist).await.unwrap();
    engine.refresh(EntityKind::Cart).await.unwrap();

    assert!(engine.remote().calls().is_empty());
    assert!(engine.wishlist().is_empty());
    assert_eq!(engine.cart(), None);
    assert_eq!(engine.identity_scope(), None);
}

#[tokio::test]
async fn signing_out_empties_the_mirror() {
    let h = Harness::new();
    h.remote().seed_cart(&h.alice, &[("P2", 1)]);
    h.engine.load(EntityKind::Cart).await.unwrap();
    assert!(h.engine.cart().is_some());

    assert!(h.engine.set_identity(None));

    assert_eq!(h.engine.cart(), None);
    assert_eq!(
        h.engine.remove_from_cart(&ProductId::new("P2")).await,
        MutationOutcome::Skipped
    );
    assert_eq!(h.remote().call_count(RemoteCall::RemoveCartItem), 0);
}
