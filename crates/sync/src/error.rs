//! Errors raised at the remote store boundary.
//!
//! None of these escape the engine's mutation entry points: a failed remote
//! call is recovered at the key level (rollback plus a failure notice). They
//! surface only from explicit loads and from the remote client itself.

use thiserror::Error;

/// Errors that can occur when talking to the remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The identity token was rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// Rate limited by the remote store.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Non-success status code.
    #[error("HTTP {status}: {message}")]
    Status {
        /// Response status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The remote store rejected the request (e.g., unknown product).
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The remote store could not be reached.
    #[error("Unavailable: {0}")]
    Unavailable(String),
}
