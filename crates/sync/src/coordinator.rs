//! Optimistic mutation lifecycle.
//!
//! Every user mutation runs through [`MutationCoordinator::perform`]:
//!
//! 1. Snapshot the live mirror value for the key
//! 2. Discard in-flight reads and write the optimistic value
//! 3. Record the pending operation and raise the pending flag
//! 4. Issue the remote call
//! 5. On success, commit the canonical collection and emit a success notice
//! 6. On failure, restore the snapshot and emit a failure notice
//! 7. Clear the operation, lowering the pending flag once the key has
//!    nothing else in flight
//! 8. Settle the key with a fresh read
//!
//! Mutations are never retried. Concurrent mutations on the same key each
//! run this sequence independently; the settle read is what converges the
//! mirror when their responses resolve out of order.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use shopfront_core::{IdentityToken, ProductId, Quantity};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::RemoteError;
use crate::events::{MirrorEvent, NoticeLevel, Notification};
use crate::mirror::MirrorStore;
use crate::model::{EntityCollection, EntityKind, MirrorKey};
use crate::reconciler::{MutationSnapshot, Reconciler};
use crate::remote::RemoteStore;

// =============================================================================
// Types
// =============================================================================

/// Where a key sits in its mutation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    /// Nothing in flight.
    Idle,
    /// An optimistic value is shown and a remote call is outstanding.
    Pending,
    /// The server confirmed a mutation.
    Committed,
    /// A mutation failed and the snapshot was restored.
    RolledBack,
    /// A settle read is outstanding.
    Reconciling,
}

/// The kind of a mutation and its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "quantity", rename_all = "snake_case")]
pub enum MutationKind {
    Add,
    Remove,
    SetQuantity(Quantity),
}

impl MutationKind {
    /// Notice text for a settled mutation of this kind on `entity`.
    #[must_use]
    pub const fn notice(self, entity: EntityKind, level: NoticeLevel) -> &'static str {
        match (entity, self, level) {
            (EntityKind::Wishlist, Self::Add, NoticeLevel::Success) => "Added to wishlist",
            (EntityKind::Wishlist, Self::Add, NoticeLevel::Failure) => "Failed to add to wishlist",
            (EntityKind::Wishlist, Self::Remove, NoticeLevel::Success) => "Removed from wishlist",
            (EntityKind::Wishlist, Self::Remove, NoticeLevel::Failure) => {
                "Failed to remove from wishlist"
            }
            (EntityKind::Cart, Self::Add, NoticeLevel::Success) => "Added to cart",
            (EntityKind::Cart, Self::Add, NoticeLevel::Failure) => "Failed to add to cart",
            (EntityKind::Cart, Self::Remove, NoticeLevel::Success) => "Removed from cart",
            (EntityKind::Cart, Self::Remove, NoticeLevel::Failure) => "Failed to remove from cart",
            (_, Self::SetQuantity(_), NoticeLevel::Success) => "Cart updated",
            (_, Self::SetQuantity(_), NoticeLevel::Failure) => "Failed to update cart",
        }
    }
}

/// A mutation issued but not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingOperation {
    /// Unique operation ID.
    pub id: Uuid,
    /// Key the mutation targets.
    pub key: MirrorKey,
    /// Mutation kind and arguments.
    pub kind: MutationKind,
    /// Product the mutation targets.
    pub target_id: ProductId,
    /// When the mutation was issued.
    pub issued_at: DateTime<Utc>,
}

/// A mutation request handed to [`MutationCoordinator::perform`].
#[derive(Debug, Clone)]
pub struct Mutation {
    /// Key the mutation targets.
    pub key: MirrorKey,
    /// Mutation kind and arguments.
    pub kind: MutationKind,
    /// Product the mutation targets.
    pub target_id: ProductId,
}

/// How a mutation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    /// The server accepted the mutation.
    Committed,
    /// The server rejected the mutation; the previous value was restored.
    RolledBack,
    /// No identity was active, so nothing was applied or sent.
    Skipped,
}

#[derive(Debug, Default, Clone, Copy)]
struct KeyActivity {
    in_flight: usize,
    reconciling: usize,
}

// =============================================================================
// Coordinator
// =============================================================================

/// Tracks in-flight mutations and drives their lifecycle.
#[derive(Debug, Default)]
pub struct MutationCoordinator {
    operations: Mutex<HashMap<Uuid, PendingOperation>>,
    activity: Mutex<HashMap<MirrorKey, KeyActivity>>,
}

impl MutationCoordinator {
    /// Create a coordinator with nothing in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations that have been issued but not yet resolved, oldest first.
    #[must_use]
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        let mut operations: Vec<PendingOperation> = self
            .operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        operations.sort_by_key(|op| op.issued_at);
        operations
    }

    /// Aggregate lifecycle state of `key`.
    #[must_use]
    pub fn key_state(&self, key: &MirrorKey) -> KeyState {
        let activity = self.activity(key);
        if activity.in_flight > 0 {
            KeyState::Pending
        } else if activity.reconciling > 0 {
            KeyState::Reconciling
        } else {
            KeyState::Idle
        }
    }

    /// Run one optimistic mutation to completion.
    ///
    /// `optimistic_apply` receives the live mirror value and returns the
    /// presumed result. `remote_call` issues the mutation and resolves to
    /// the full canonical collection.
    #[instrument(
        skip_all,
        fields(key = %mutation.key, kind = ?mutation.kind, target = %mutation.target_id)
    )]
    pub async fn perform<R, A, F, Fut>(
        &self,
        reconciler: &Reconciler<'_, R>,
        identity: &IdentityToken,
        mutation: Mutation,
        optimistic_apply: A,
        remote_call: F,
    ) -> MutationOutcome
    where
        R: RemoteStore,
        A: FnOnce(Option<&EntityCollection>, MutationKind, &ProductId) -> EntityCollection,
        F: FnOnce(ProductId, MutationKind) -> Fut,
        Fut: Future<Output = Result<EntityCollection, RemoteError>>,
    {
        let mirror = reconciler.mirror();
        let Mutation {
            key,
            kind,
            target_id,
        } = mutation;

        let snapshot = MutationSnapshot {
            key: key.clone(),
            value: mirror.read(&key),
        };

        mirror.supersede_reads(&key);
        let optimistic = optimistic_apply(snapshot.value.as_ref(), kind, &target_id);
        mirror.write(&key, Some(optimistic));

        let op_id = self.begin(&key, kind, &target_id);
        mirror.set_pending(&key, true);
        mirror.publish(MirrorEvent::StateChanged {
            key: key.clone(),
            state: KeyState::Pending,
        });
        debug!(op_id = %op_id, "Optimistic value applied");

        let outcome = match remote_call(target_id, kind).await {
            Ok(canonical) => {
                info!(op_id = %op_id, "Mutation committed");
                reconciler.commit(&key, canonical);
                mirror.set_last_error(&key, None);
                announce(mirror, &key, kind, NoticeLevel::Success);
                MutationOutcome::Committed
            }
            Err(e) => {
                warn!(op_id = %op_id, error = %e, "Mutation failed, rolling back");
                reconciler.rollback(snapshot);
                let message = kind.notice(key.kind, NoticeLevel::Failure);
                mirror.set_last_error(&key, Some(message.to_string()));
                announce(mirror, &key, kind, NoticeLevel::Failure);
                MutationOutcome::RolledBack
            }
        };

        self.end(&key, op_id, reconciler);

        if let Err(e) = reconciler.settle(&key, identity).await {
            warn!(error = %e, "Settle fetch failed, keeping current value");
        }

        self.settled(&key, reconciler);
        outcome
    }

    // =========================================================================
    // Bookkeeping
    // =========================================================================

    fn activity(&self, key: &MirrorKey) -> KeyActivity {
        self.activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or_default()
    }

    fn update_activity(
        &self,
        key: &MirrorKey,
        f: impl FnOnce(&mut KeyActivity),
    ) -> KeyActivity {
        let mut activity = self
            .activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = activity.entry(key.clone()).or_default();
        f(entry);
        let current = *entry;
        if current.in_flight == 0 && current.reconciling == 0 {
            activity.remove(key);
        }
        current
    }

    fn begin(&self, key: &MirrorKey, kind: MutationKind, target_id: &ProductId) -> Uuid {
        let op = PendingOperation {
            id: Uuid::new_v4(),
            key: key.clone(),
            kind,
            target_id: target_id.clone(),
            issued_at: Utc::now(),
        };
        let id = op.id;
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, op);
        self.update_activity(key, |activity| activity.in_flight += 1);
        id
    }

    fn end<R: RemoteStore>(&self, key: &MirrorKey, op_id: Uuid, reconciler: &Reconciler<'_, R>) {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&op_id);

        let activity = self.update_activity(key, |activity| {
            activity.in_flight = activity.in_flight.saturating_sub(1);
            activity.reconciling += 1;
        });

        let mirror = reconciler.mirror();
        if activity.in_flight == 0 {
            mirror.set_pending(key, false);
            mirror.publish(MirrorEvent::StateChanged {
                key: key.clone(),
                state: KeyState::Reconciling,
            });
        }
    }

    fn settled<R: RemoteStore>(&self, key: &MirrorKey, reconciler: &Reconciler<'_, R>) {
        let activity = self.update_activity(key, |activity| {
            activity.reconciling = activity.reconciling.saturating_sub(1);
        });
        if activity.in_flight == 0 && activity.reconciling == 0 {
            reconciler.mirror().publish(MirrorEvent::StateChanged {
                key: key.clone(),
                state: KeyState::Idle,
            });
        }
    }
}

/// Publish the outcome state and the user-facing notice for a mutation.
fn announce(mirror: &MirrorStore, key: &MirrorKey, kind: MutationKind, level: NoticeLevel) {
    let state = match level {
        NoticeLevel::Success => KeyState::Committed,
        NoticeLevel::Failure => KeyState::RolledBack,
    };
    mirror.publish(MirrorEvent::StateChanged {
        key: key.clone(),
        state,
    });
    mirror.publish(MirrorEvent::Notice(Notification {
        key: key.clone(),
        level,
        message: kind.notice(key.kind, level).to_string(),
    }));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::apply;
    use crate::model::Product;
    use crate::remote::memory::{InMemoryRemoteStore, RemoteCall};

    fn product(id: &str) -> Product {
        Product {
            price: Some(Decimal::from(10)),
            ..Product::from_id(ProductId::new(id))
        }
    }

    fn setup() -> (MirrorStore, InMemoryRemoteStore, IdentityToken, MirrorKey) {
        let identity = IdentityToken::new("token-a");
        let mirror = MirrorStore::default();
        mirror.activate_scope(Some(identity.scope().clone()));
        let remote = InMemoryRemoteStore::with_products([product("p1"), product("p2")]);
        let key = MirrorKey::new(EntityKind::Wishlist, identity.scope().clone());
        (mirror, remote, identity, key)
    }

    async fn add(
        coordinator: &MutationCoordinator,
        reconciler: &Reconciler<'_, InMemoryRemoteStore>,
        remote: &InMemoryRemoteStore,
        identity: &IdentityToken,
        key: &MirrorKey,
        id: &str,
    ) -> MutationOutcome {
        let target = product(id);
        coordinator
            .perform(
                reconciler,
                identity,
                Mutation {
                    key: key.clone(),
                    kind: MutationKind::Add,
                    target_id: target.id.clone(),
                },
                |current, _, _| apply::wishlist_add(current, &target),
                |target_id, _| async move {
                    remote
                        .add_wishlist_item(identity, &target_id)
                        .await
                        .map(EntityCollection::Wishlist)
                },
            )
            .await
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<MirrorEvent>) -> Vec<MirrorEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => {}
            }
        }
        events
    }

    #[tokio::test]
    async fn test_successful_mutation_commits_and_notifies() {
        let (mirror, remote, identity, key) = setup();
        let coordinator = MutationCoordinator::new();
        let reconciler = Reconciler::new(&mirror, &remote);
        let mut rx = mirror.subscribe();

        let outcome = add(&coordinator, &reconciler, &remote, &identity, &key, "p1").await;

        assert_eq!(outcome, MutationOutcome::Committed);
        assert_eq!(
            mirror.read(&key),
            Some(EntityCollection::Wishlist(vec![product("p1")]))
        );
        assert!(!mirror.is_pending(&key));
        assert!(coordinator.pending_operations().is_empty());
        assert_eq!(coordinator.key_state(&key), KeyState::Idle);

        let states: Vec<KeyState> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                MirrorEvent::StateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                KeyState::Pending,
                KeyState::Committed,
                KeyState::Reconciling,
                KeyState::Idle
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_mutation_rolls_back_with_notice() {
        let (mirror, remote, identity, key) = setup();
        let before = EntityCollection::Wishlist(vec![product("p2")]);
        remote.seed_wishlist(&identity, &["p2"]);
        mirror.write(&key, Some(before.clone()));
        remote.fail_next(RemoteCall::AddWishlistItem, 1);

        let coordinator = MutationCoordinator::new();
        let reconciler = Reconciler::new(&mirror, &remote);
        let mut rx = mirror.subscribe();

        let outcome = add(&coordinator, &reconciler, &remote, &identity, &key, "p1").await;

        assert_eq!(outcome, MutationOutcome::RolledBack);
        assert_eq!(mirror.read(&key), Some(before));
        assert_eq!(
            mirror.last_error(&key).as_deref(),
            Some("Failed to add to wishlist")
        );
        assert_eq!(remote.call_count(RemoteCall::AddWishlistItem), 1);

        let notices: Vec<Notification> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                MirrorEvent::Notice(notice) => Some(notice),
                _ => None,
            })
            .collect();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Failure);
        assert_eq!(notices[0].message, "Failed to add to wishlist");
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimistic_value_visible_while_pending() {
        let (mirror, remote, identity, key) = setup();
        remote.delay_next(RemoteCall::AddWishlistItem, Duration::from_millis(100));
        let coordinator = MutationCoordinator::new();
        let reconciler = Reconciler::new(&mirror, &remote);

        let ((), outcome) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                assert!(mirror.is_pending(&key));
                assert_eq!(
                    mirror.read(&key),
                    Some(EntityCollection::Wishlist(vec![product("p1")]))
                );
                let pending = coordinator.pending_operations();
                assert_eq!(pending.len(), 1);
                assert_eq!(pending[0].kind, MutationKind::Add);
                assert_eq!(pending[0].target_id, ProductId::new("p1"));
                assert_eq!(coordinator.key_state(&key), KeyState::Pending);
            },
            add(&coordinator, &reconciler, &remote, &identity, &key, "p1")
        );

        assert_eq!(outcome, MutationOutcome::Committed);
        assert!(!mirror.is_pending(&key));
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let (mirror, remote, identity, key) = setup();
        remote.fail_next(RemoteCall::AddWishlistItem, 1);
        let coordinator = MutationCoordinator::new();
        let reconciler = Reconciler::new(&mirror, &remote);

        add(&coordinator, &reconciler, &remote, &identity, &key, "p1").await;
        assert_eq!(
            mirror.last_error(&key).as_deref(),
            Some("Failed to add to wishlist")
        );

        add(&coordinator, &reconciler, &remote, &identity, &key, "p1").await;
        assert_eq!(mirror.last_error(&key), None);
    }

    #[test]
    fn test_notice_text() {
        assert_eq!(
            MutationKind::Remove.notice(EntityKind::Wishlist, NoticeLevel::Success),
            "Removed from wishlist"
        );
        assert_eq!(
            MutationKind::SetQuantity(Quantity::MIN).notice(EntityKind::Cart, NoticeLevel::Failure),
            "Failed to update cart"
        );
        assert_eq!(
            MutationKind::Remove.notice(EntityKind::Cart, NoticeLevel::Failure),
            "Failed to remove from cart"
        );
    }
}
