//! Moves the mirror from an optimistic value to a confirmed one.
//!
//! Three paths lead back to the server's truth:
//!
//! - **commit**: a mutation succeeded; its response is the full canonical
//!   collection and replaces the mirror value outright
//! - **rollback**: a mutation failed; the value captured just before the
//!   optimistic write is restored
//! - **settle**: after either outcome, the collection is re-read from the
//!   server so that responses which arrived out of order still converge
//!
//! Settle and explicit loads go through [`MirrorStore::write_if_current`]:
//! if a mutation is issued while the read is in flight, the read result is
//! discarded instead of clobbering the newer optimistic value.

use shopfront_core::IdentityToken;
use tracing::{debug, instrument, warn};

use crate::error::RemoteError;
use crate::mirror::MirrorStore;
use crate::model::{EntityCollection, EntityKind, MirrorKey};
use crate::remote::RemoteStore;

/// The value of a key captured just before an optimistic write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSnapshot {
    /// Key the snapshot belongs to.
    pub key: MirrorKey,
    /// Value at capture time; `None` if the key was never loaded.
    pub value: Option<EntityCollection>,
}

/// Borrowed view over the mirror and remote used to confirm values.
pub struct Reconciler<'a, R> {
    mirror: &'a MirrorStore,
    remote: &'a R,
}

impl<'a, R: RemoteStore> Reconciler<'a, R> {
    /// Create a reconciler over `mirror` and `remote`.
    #[must_use]
    pub const fn new(mirror: &'a MirrorStore, remote: &'a R) -> Self {
        Self { mirror, remote }
    }

    /// The mirror this reconciler writes to.
    #[must_use]
    pub const fn mirror(&self) -> &'a MirrorStore {
        self.mirror
    }

    /// Replace the value for `key` with the canonical collection.
    pub fn commit(&self, key: &MirrorKey, canonical: EntityCollection) -> bool {
        self.mirror.write(key, Some(canonical))
    }

    /// Restore the value captured before the optimistic write.
    pub fn rollback(&self, snapshot: MutationSnapshot) -> bool {
        self.mirror.write(&snapshot.key, snapshot.value)
    }

    /// Re-read `key` from the server once and write the result unless a
    /// newer mutation superseded it.
    ///
    /// Returns `Ok(true)` if the mirror took the fetched value.
    ///
    /// # Errors
    ///
    /// Returns the remote error if the fetch fails. The mirror keeps its
    /// current value in that case.
    #[instrument(skip(self, key, identity), fields(key = %key))]
    pub async fn settle(
        &self,
        key: &MirrorKey,
        identity: &IdentityToken,
    ) -> Result<bool, RemoteError> {
        if self.mirror.active_scope().as_ref() != Some(&key.scope) {
            debug!("Skipping settle for inactive scope");
            return Ok(false);
        }

        let generation = self.mirror.generation(key);
        let fetched = self.fetch_once(key.kind, identity).await?;
        let applied = self.mirror.write_if_current(key, Some(fetched), generation);
        debug!(applied, "Settle fetch resolved");
        Ok(applied)
    }

    /// Load `key` from the server, retrying any failure up to `retries`
    /// extra times.
    ///
    /// Returns `Ok(true)` if the mirror took the fetched value.
    ///
    /// # Errors
    ///
    /// Returns the last remote error once attempts are exhausted.
    #[instrument(skip(self, key, identity), fields(key = %key))]
    pub async fn fetch(
        &self,
        key: &MirrorKey,
        identity: &IdentityToken,
        retries: u32,
    ) -> Result<bool, RemoteError> {
        let generation = self.mirror.generation(key);
        let mut attempt = 0;

        let fetched = loop {
            match self.fetch_once(key.kind, identity).await {
                Ok(value) => break value,
                Err(e) if attempt < retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, "Read fetch failed, retrying");
                }
                Err(e) => return Err(e),
            }
        };

        Ok(self.mirror.write_if_current(key, Some(fetched), generation))
    }

    async fn fetch_once(
        &self,
        kind: EntityKind,
        identity: &IdentityToken,
    ) -> Result<EntityCollection, RemoteError> {
        match kind {
            EntityKind::Wishlist => self
                .remote
                .fetch_wishlist(identity)
                .await
                .map(EntityCollection::Wishlist),
            EntityKind::Cart => self
                .remote
                .fetch_cart(identity)
                .await
                .map(EntityCollection::Cart),
        }
    }
}
