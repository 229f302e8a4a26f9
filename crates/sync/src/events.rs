//! Events published to the presentation layer.

use serde::Serialize;

use crate::coordinator::KeyState;
use crate::model::MirrorKey;

/// Something observable changed in the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MirrorEvent {
    /// The value for `key` was replaced.
    ValueChanged {
        /// Affected key.
        key: MirrorKey,
    },
    /// The pending flag for `key` flipped.
    PendingChanged {
        /// Affected key.
        key: MirrorKey,
        /// New flag value.
        pending: bool,
    },
    /// The per-key state machine moved.
    StateChanged {
        /// Affected key.
        key: MirrorKey,
        /// State entered.
        state: KeyState,
    },
    /// A user-facing notice (toast).
    Notice(Notification),
}

/// Severity of a [`Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// The mutation was confirmed.
    Success,
    /// The mutation failed and was rolled back.
    Failure,
}

/// A user-facing message about a settled mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Key the mutation targeted.
    pub key: MirrorKey,
    /// Success or failure.
    pub level: NoticeLevel,
    /// Display text, e.g. "Failed to add to wishlist".
    pub message: String,
}
