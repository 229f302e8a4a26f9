//! Command implementations.
//!
//! Each command opens a mirror session for the configured identity, loads
//! the collection it touches, performs at most one mutation, and prints a
//! JSON report of the outcome, the notices raised, and the settled value.

pub mod cart;
pub mod wishlist;

use serde::Serialize;
use shopfront_sync::{
    ConfigError, EntityKind, HttpRemoteStore, MirrorEngine, MirrorEvent, MutationOutcome,
    Notification, RemoteError, ShopfrontConfig,
};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The remote store could not be reached or rejected a read.
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// No session token is configured.
    #[error("No identity configured; set SHOPFRONT_API_TOKEN")]
    MissingIdentity,

    /// A mutation was rolled back.
    #[error("{0}")]
    RolledBack(String),

    /// The report could not be serialized.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// What a command prints.
#[derive(Debug, Serialize)]
pub struct Report<T> {
    /// How the mutation ended, if the command issued one.
    pub outcome: Option<MutationOutcome>,
    /// Notices raised while the command ran.
    pub notices: Vec<Notification>,
    /// The settled collection.
    pub value: T,
}

/// A mirror session bound to the configured identity.
pub struct Session {
    engine: MirrorEngine<HttpRemoteStore>,
    events: broadcast::Receiver<MirrorEvent>,
}

impl Session {
    /// Open a session and load `kind`.
    ///
    /// # Errors
    ///
    /// Returns `CliError` if no identity is configured, the client cannot be
    /// built, or the initial load fails.
    pub async fn open(config: &ShopfrontConfig, kind: EntityKind) -> Result<Self, CliError> {
        let identity = config.identity().ok_or(CliError::MissingIdentity)?;
        let remote = HttpRemoteStore::new(&config.remote)?;
        let engine = MirrorEngine::new(remote, config.engine);
        engine.set_identity(Some(identity));
        let events = engine.subscribe();

        engine.load(kind).await?;
        tracing::debug!(kind = %kind, "Session loaded");

        Ok(Self { engine, events })
    }

    /// The engine driving this session.
    #[must_use]
    pub const fn engine(&self) -> &MirrorEngine<HttpRemoteStore> {
        &self.engine
    }

    /// Build the report for a finished command.
    ///
    /// # Errors
    ///
    /// Returns `CliError::RolledBack` with the failure notice when the
    /// mutation was rolled back.
    pub fn finish<T>(
        mut self,
        outcome: Option<MutationOutcome>,
        value: impl FnOnce(&MirrorEngine<HttpRemoteStore>) -> T,
    ) -> Result<Report<T>, CliError> {
        let notices = self.drain_notices();

        if outcome == Some(MutationOutcome::RolledBack) {
            let message = notices
                .last()
                .map_or_else(|| "Mutation rolled back".to_string(), |n| n.message.clone());
            return Err(CliError::RolledBack(message));
        }

        Ok(Report {
            outcome,
            notices,
            value: value(&self.engine),
        })
    }

    fn drain_notices(&mut self) -> Vec<Notification> {
        let mut notices = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(MirrorEvent::Notice(notice)) => notices.push(notice),
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        notices
    }
}

/// Print a report as pretty JSON.
///
/// # Errors
///
/// Returns `CliError::Output` if serialization fails.
#[allow(clippy::print_stdout)]
pub fn print<T: Serialize>(report: &Report<T>) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
