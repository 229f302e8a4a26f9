//! Optimistic wishlist mutations against the in-memory remote store.
//!
//! Response delays run on paused tokio time, so `join!` plus a sleep in a
//! probe future observes the mirror while a mutation is still in flight.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use shopfront_core::ProductId;
use shopfront_integration_tests::{Harness, drain_notices, ids, product};
use shopfront_sync::remote::memory::RemoteCall;
use shopfront_sync::{EntityKind, KeyState, MutationOutcome, NoticeLevel};

#[tokio::test(start_paused = true)]
async fn optimistic_add_is_visible_before_the_remote_resolves() {
    let h = Harness::new();
    h.engine.load(EntityKind::Wishlist).await.unwrap();
    h.remote()
        .delay_next(RemoteCall::AddWishlistItem, Duration::from_millis(100));

    let ((), outcome) = tokio::join!(
        async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            assert_eq!(ids(&h.engine.wishlist()), vec!["P1"]);
            assert!(h.engine.is_pending(EntityKind::Wishlist));
            assert_eq!(h.engine.key_state(EntityKind::Wishlist), KeyState::Pending);
            assert_eq!(h.engine.pending_operations().len(), 1);
        },
        h.engine.add_to_wishlist(product("P1", 20))
    );

    assert_eq!(outcome, MutationOutcome::Committed);
    assert_eq!(ids(&h.engine.wishlist()), vec!["P1"]);
    assert!(!h.engine.is_pending(EntityKind::Wishlist));
    assert_eq!(h.engine.key_state(EntityKind::Wishlist), KeyState::Idle);
    assert!(h.engine.pending_operations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_add_rolls_back_and_notifies() {
    let h = Harness::new();
    h.engine.load(EntityKind::Wishlist).await.unwrap();
    let mut events = h.engine.subscribe();
    h.remote().fail_next(RemoteCall::AddWishlistItem, 1);
    h.remote()
        .delay_next(RemoteCall::AddWishlistItem, Duration::from_millis(50));

    let ((), outcome) = tokio::join!(
        async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            assert_eq!(ids(&h.engine.wishlist()), vec!["P1"]);
        },
        h.engine.add_to_wishlist(product("P1", 20))
    );

    assert_eq!(outcome, MutationOutcome::RolledBack);
    assert!(h.engine.wishlist().is_empty());

    let notices = drain_notices(&mut events);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Failure);
    assert_eq!(notices[0].message, "Failed to add to wishlist");
    assert_eq!(
        h.engine.last_error(EntityKind::Wishlist).as_deref(),
        Some("Failed to add to wishlist")
    );
}

#[tokio::test(start_paused = true)]
async fn racing_add_and_remove_converge_when_add_resolves_last() {
    let h = Harness::new();
    h.remote().seed_wishlist(&h.alice, &["P2"]);
    h.engine.load(EntityKind::Wishlist).await.unwrap();
    h.remote()
        .delay_next(RemoteCall::AddWishlistItem, Duration::from_millis(50));
    h.remote()
        .delay_next(RemoteCall::RemoveWishlistItem, Duration::from_millis(10));

    let p1 = ProductId::new("P1");
    let (added, removed) = tokio::join!(
        h.engine.add_to_wishlist(product("P1", 20)),
        h.engine.remove_from_wishlist(&p1)
    );

    assert_eq!(added, MutationOutcome::Committed);
    assert_eq!(removed, MutationOutcome::Committed);
    assert_eq!(ids(&h.engine.wishlist()), vec!["P2"]);
    assert_eq!(ids(&h.remote().wishlist_of(&h.alice)), vec!["P2"]);
}

#[tokio::test(start_paused = true)]
async fn racing_add_and_remove_converge_when_remove_resolves_last() {
    let h = Harness::new();
    h.remote().seed_wishlist(&h.alice, &["P2"]);
    h.engine.load(EntityKind::Wishlist).await.unwrap();
    h.remote()
        .delay_next(RemoteCall::AddWishlistItem, Duration::from_millis(10));
    h.remote()
        .delay_next(RemoteCall::RemoveWishlistItem, Duration::from_millis(50));

    let p1 = ProductId::new("P1");
    tokio::join!(
        h.engine.add_to_wishlist(product("P1", 20)),
        h.engine.remove_from_wishlist(&p1)
    );

    assert_eq!(ids(&h.engine.wishlist()), vec!["P2"]);
}

#[tokio::test]
async fn add_then_remove_restores_the_original_set() {
    let h = Harness::new();
    h.remote().seed_wishlist(&h.alice, &["P2", "P3"]);
    h.engine.load(EntityKind::Wishlist).await.unwrap();
    let before = h.engine.wishlist();

    h.engine.add_to_wishlist(product("P1", 20)).await;
    h.engine.remove_from_wishlist(&ProductId::new("P1")).await;

    let after_products = h.engine.wishlist();
    let mut after = ids(&after_products);
    let mut expected = ids(&before);
    after.sort_unstable();
    expected.sort_unstable();
    assert_eq!(after, expected);
}

#[tokio::test(start_paused = true)]
async fn redundant_membership_changes_leave_the_value_unchanged() {
    let h = Harness::new();
    h.remote().seed_wishlist(&h.alice, &["P1"]);
    h.engine.load(EntityKind::Wishlist).await.unwrap();
    let before = h.engine.read(EntityKind::Wishlist);
    h.remote()
        .delay_next(RemoteCall::AddWishlistItem, Duration::from_millis(20));
    h.remote()
        .delay_next(RemoteCall::RemoveWishlistItem, Duration::from_millis(20));

    let ((), _) = tokio::join!(
        async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            assert_eq!(h.engine.read(EntityKind::Wishlist), before);
        },
        h.engine.add_to_wishlist(product("P1", 20))
    );

    let p9 = ProductId::new("P9");
    let ((), _) = tokio::join!(
        async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            assert_eq!(ids(&h.engine.wishlist()), vec!["P1"]);
        },
        h.engine.remove_from_wishlist(&p9)
    );

    // Redundant mutations still reach the server.
    assert_eq!(h.remote().call_count(RemoteCall::AddWishlistItem), 1);
    assert_eq!(h.remote().call_count(RemoteCall::RemoveWishlistItem), 1);
}

#[tokio::test]
async fn toggle_follows_the_optimistic_value() {
    let h = Harness::new();
    h.engine.load(EntityKind::Wishlist).await.unwrap();
    let mut events = h.engine.subscribe();

    h.engine.toggle_wishlist(product("P3", 12)).await;
    assert!(h.engine.contains_in_wishlist(&ProductId::new("P3")));

    h.engine.toggle_wishlist(product("P3", 12)).await;
    assert!(!h.engine.contains_in_wishlist(&ProductId::new("P3")));

    let messages: Vec<String> = drain_notices(&mut events)
        .into_iter()
        .map(|notice| notice.message)
        .collect();
    assert_eq!(messages, vec!["Added to wishlist", "Removed from wishlist"]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_mutations_settle_to_the_remote_truth() {
    let h = Harness::new();
    h.remote().seed_wishlist(&h.alice, &["P3"]);
    h.engine.load(EntityKind::Wishlist).await.unwrap();

    // First add fails, second add succeeds; every response arrives out of order.
    h.remote().fail_next(RemoteCall::AddWishlistItem, 1);
    h.remote()
        .delay_next(RemoteCall::AddWishlistItem, Duration::from_millis(40));
    h.remote()
        .delay_next(RemoteCall::AddWishlistItem, Duration::from_millis(5));
    h.remote()
        .delay_next(RemoteCall::RemoveWishlistItem, Duration::from_millis(20));

    let p3 = ProductId::new("P3");
    let (first, second, third) = tokio::join!(
        h.engine.add_to_wishlist(product("P1", 20)),
        h.engine.add_to_wishlist(product("P2", 5)),
        h.engine.remove_from_wishlist(&p3),
    );

    assert_eq!(first, MutationOutcome::RolledBack);
    assert_eq!(second, MutationOutcome::Committed);
    assert_eq!(third, MutationOutcome::Committed);
    assert_eq!(h.engine.wishlist(), h.remote().wishlist_of(&h.alice));
    assert_eq!(ids(&h.engine.wishlist()), vec!["P2"]);
    assert!(!h.engine.is_pending(EntityKind::Wishlist));
}
