//! Local mirror of remote collections.
//!
//! Entries are keyed by (entity kind, identity scope) and held in a `moka`
//! cache with no capacity bound or TTL: the mirror is the source of display
//! data and must never silently evict a value. Freshness is handled by
//! explicit invalidation and settle-triggered re-fetches instead.
//!
//! Every write is published on a broadcast channel so the presentation layer
//! sees optimistic values in the same tick they are applied.

use std::sync::{PoisonError, RwLock};

use moka::sync::Cache;
use shopfront_core::IdentityScope;
use tokio::sync::broadcast;
use tracing::debug;

use crate::events::MirrorEvent;
use crate::model::{EntityCollection, MirrorKey};

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// A single mirror entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorEntry {
    /// Latest locally known value (optimistic or confirmed).
    pub value: Option<EntityCollection>,
    /// Whether a mutation on this key is in flight.
    pub pending: bool,
    /// Whether the entry must be re-fetched before it is trusted.
    pub stale: bool,
    /// Message of the most recent failed mutation, cleared on success.
    pub last_error: Option<String>,
    /// Bumped whenever in-flight reads for this key must be discarded.
    generation: u64,
}

impl MirrorEntry {
    /// The read generation of this entry.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// Keyed in-memory store of mirrored collections.
///
/// The store is the only component that writes entry values or pending
/// flags. Writes addressed to a scope other than the active one are dropped,
/// so a late response for a previous identity can never leak into the
/// current one.
pub struct MirrorStore {
    entries: Cache<MirrorKey, MirrorEntry>,
    active_scope: RwLock<Option<IdentityScope>>,
    events: broadcast::Sender<MirrorEvent>,
}

impl MirrorStore {
    /// Create an empty store with no active scope.
    #[must_use]
    pub fn new(event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            entries: Cache::builder().build(),
            active_scope: RwLock::new(None),
            events,
        }
    }

    // =========================================================================
    // Scope Lifecycle
    // =========================================================================

    /// The currently active identity scope.
    #[must_use]
    pub fn active_scope(&self) -> Option<IdentityScope> {
        self.active_scope
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Switch the active scope, retiring every entry of the previous one.
    ///
    /// Returns `true` if the scope actually changed.
    pub fn activate_scope(&self, scope: Option<IdentityScope>) -> bool {
        let previous = {
            let mut active = self
                .active_scope
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if *active == scope {
                return false;
            }
            std::mem::replace(&mut *active, scope)
        };

        if let Some(previous) = previous {
            self.retire_scope(&previous);
        }
        true
    }

    fn retire_scope(&self, scope: &IdentityScope) {
        let retired: Vec<MirrorKey> = self
            .entries
            .iter()
            .filter(|(key, _)| &key.scope == scope)
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in retired {
            self.entries.invalidate(&key);
            self.publish(MirrorEvent::ValueChanged { key });
        }
        debug!(scope = %scope, "Retired mirror scope");
    }

    fn is_active(&self, key: &MirrorKey) -> bool {
        self.active_scope
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            == Some(&key.scope)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Latest locally known value for `key`. Never blocks.
    #[must_use]
    pub fn read(&self, key: &MirrorKey) -> Option<EntityCollection> {
        if !self.is_active(key) {
            return None;
        }
        self.entries.get(key).and_then(|entry| entry.value)
    }

    /// Snapshot of the full entry for `key`.
    #[must_use]
    pub fn entry(&self, key: &MirrorKey) -> Option<MirrorEntry> {
        if !self.is_active(key) {
            return None;
        }
        self.entries.get(key)
    }

    /// Whether `key` has never been loaded or was invalidated.
    #[must_use]
    pub fn needs_fetch(&self, key: &MirrorKey) -> bool {
        self.entries
            .get(key)
            .is_none_or(|entry| entry.stale || entry.value.is_none())
    }

    /// Whether a mutation on `key` is in flight.
    #[must_use]
    pub fn is_pending(&self, key: &MirrorKey) -> bool {
        self.entry(key).is_some_and(|entry| entry.pending)
    }

    /// Message of the last failed mutation on `key`.
    #[must_use]
    pub fn last_error(&self, key: &MirrorKey) -> Option<String> {
        self.entry(key).and_then(|entry| entry.last_error)
    }

    /// Current read generation of `key`.
    #[must_use]
    pub fn generation(&self, key: &MirrorKey) -> u64 {
        self.entries
            .get(key)
            .map_or(0, |entry| entry.generation)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Replace the value for `key` and notify subscribers.
    ///
    /// Returns `false` if the key's scope is no longer active.
    pub fn write(&self, key: &MirrorKey, value: Option<EntityCollection>) -> bool {
        if !self.is_active(key) {
            debug!(key = %key, "Dropped write to inactive scope");
            return false;
        }
        self.update(key, |entry| {
            entry.value = value;
            entry.stale = false;
        });
        self.publish(MirrorEvent::ValueChanged { key: key.clone() });
        true
    }

    /// Replace the value only if no newer mutation superseded the read that
    /// produced it.
    ///
    /// Returns `true` if the value was written.
    pub fn write_if_current(
        &self,
        key: &MirrorKey,
        value: Option<EntityCollection>,
        generation: u64,
    ) -> bool {
        if !self.is_active(key) {
            debug!(key = %key, "Dropped read result for inactive scope");
            return false;
        }

        let mut applied = false;
        self.update(key, |entry| {
            if entry.generation == generation {
                entry.value = value;
                entry.stale = false;
                applied = true;
            }
        });

        if applied {
            self.publish(MirrorEvent::ValueChanged { key: key.clone() });
        } else {
            debug!(key = %key, generation, "Discarded superseded read result");
        }
        applied
    }

    /// Mark `key` for mandatory re-fetch and discard in-flight reads.
    pub fn invalidate(&self, key: &MirrorKey) {
        self.update(key, |entry| {
            entry.stale = true;
            entry.generation = entry.generation.wrapping_add(1);
        });
        self.publish(MirrorEvent::ValueChanged { key: key.clone() });
    }

    /// Discard every read for `key` that is still in flight.
    ///
    /// Returns the new generation.
    pub fn supersede_reads(&self, key: &MirrorKey) -> u64 {
        self.update(key, |entry| {
            entry.generation = entry.generation.wrapping_add(1);
        })
        .generation
    }

    /// Set the pending flag, notifying subscribers on change.
    pub fn set_pending(&self, key: &MirrorKey, pending: bool) {
        if !self.is_active(key) {
            return;
        }
        let mut changed = false;
        self.update(key, |entry| {
            changed = entry.pending != pending;
            entry.pending = pending;
        });
        if changed {
            self.publish(MirrorEvent::PendingChanged {
                key: key.clone(),
                pending,
            });
        }
    }

    /// Record or clear the last mutation error for `key`.
    pub fn set_last_error(&self, key: &MirrorKey, message: Option<String>) {
        if !self.is_active(key) {
            return;
        }
        self.update(key, |entry| entry.last_error = message);
    }

    fn update(&self, key: &MirrorKey, f: impl FnOnce(&mut MirrorEntry)) -> MirrorEntry {
        self.entries
            .entry(key.clone())
            .and_upsert_with(|existing| {
                let mut entry = existing.map(moka::Entry::into_value).unwrap_or_default();
                f(&mut entry);
                entry
            })
            .into_value()
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribe to mirror events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MirrorEvent> {
        self.events.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: MirrorEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for MirrorStore {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}
