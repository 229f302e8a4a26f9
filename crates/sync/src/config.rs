//! Mirror configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_API_BASE_URL` - Base URL of the remote store API
//!   (e.g., `https://shop.example.com/api/v1`)
//!
//! ## Optional
//! - `SHOPFRONT_API_TOKEN` - Session token used as the identity scope
//! - `SHOPFRONT_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `SHOPFRONT_READ_RETRIES` - Extra attempts for read fetches (default: 1)
//! - `SHOPFRONT_EVENT_BUFFER` - Capacity of the mirror event channel (default: 256)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use shopfront_core::IdentityToken;
use thiserror::Error;
use url::Url;

use crate::mirror::DEFAULT_EVENT_BUFFER;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Full configuration for a mirror session.
#[derive(Debug, Clone)]
pub struct ShopfrontConfig {
    /// Remote store connection settings
    pub remote: RemoteStoreConfig,
    /// Engine tuning
    pub engine: EngineConfig,
    /// Session token, if one is configured
    pub api_token: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Remote store connection settings.
#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    /// API base URL
    pub base_url: Url,
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Extra attempts granted to a failed read fetch. Mutations are never
    /// retried and settle fetches are single-shot.
    pub read_retries: u32,
    /// Capacity of the mirror event channel.
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_retries: 1,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ShopfrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let remote = RemoteStoreConfig::from_env()?;
        let engine = EngineConfig::from_env()?;
        let api_token = session_token(std::env::var("SHOPFRONT_API_TOKEN").ok());
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            remote,
            engine,
            api_token,
            sentry_dsn,
        })
    }

    /// The configured identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<IdentityToken> {
        self.api_token.clone().map(IdentityToken::from)
    }
}

impl RemoteStoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw = get_required_env("SHOPFRONT_API_BASE_URL")?;
        let base_url = Url::parse(&raw).map_err(|e| {
            ConfigError::InvalidEnvVar("SHOPFRONT_API_BASE_URL".to_string(), e.to_string())
        })?;
        let timeout_secs: u64 = get_parsed_or_default("SHOPFRONT_REQUEST_TIMEOUT_SECS", 10)?;

        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl EngineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            read_retries: get_parsed_or_default("SHOPFRONT_READ_RETRIES", defaults.read_retries)?,
            event_buffer: get_parsed_or_default("SHOPFRONT_EVENT_BUFFER", defaults.event_buffer)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Parse an environment variable, falling back to a default when unset.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Wrap a server-issued session token.
///
/// The token is opaque; only surrounding whitespace is stripped and a blank
/// value counts as signed out.
fn session_token(raw: Option<String>) -> Option<SecretString> {
    let token = raw?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(SecretString::from(token.to_string()))
}
