//! Identity token and the mirror scope derived from it.

use core::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the token digest.
const SCOPE_FINGERPRINT_LEN: usize = 16;

/// An opaque session token issued by the remote store.
///
/// The raw value is kept in a [`SecretString`] and only exposed when a
/// request is built. `Debug` output is redacted; use [`IdentityToken::scope`]
/// when a loggable handle is needed.
#[derive(Clone)]
pub struct IdentityToken {
    secret: SecretString,
    scope: IdentityScope,
}

impl IdentityToken {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        let token: String = token.into();
        let scope = IdentityScope::fingerprint(&token);
        Self {
            secret: SecretString::from(token),
            scope,
        }
    }

    /// The mirror scope this token partitions.
    #[must_use]
    pub const fn scope(&self) -> &IdentityScope {
        &self.scope
    }

    /// Expose the raw token for an outgoing request.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityToken")
            .field("secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

impl From<SecretString> for IdentityToken {
    fn from(secret: SecretString) -> Self {
        let scope = IdentityScope::fingerprint(secret.expose_secret());
        Self { secret, scope }
    }
}

/// Loggable fingerprint of an [`IdentityToken`].
///
/// Two tokens map to the same scope only if they are equal (up to the
/// collision resistance of a truncated SHA-256), so a token rotation is a
/// scope change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityScope(String);

impl IdentityScope {
    fn fingerprint(token: &str) -> Self {
        let digest = Sha256::digest(token.as_bytes());
        let hex: String = digest
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>()
            .chars()
            .take(SCOPE_FINGERPRINT_LEN)
            .collect();
        Self(hex)
    }

    /// The fingerprint as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
