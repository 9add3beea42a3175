//! Error kinds surfaced by the store, the queue and reconciliation.
//!
//! Every kind is distinguishable so the HTTP layer can map it to a status
//! (not found, bad request, server error) without string matching.

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type for store, queue and reconciliation operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No row exists for the lookup key.
    #[error("not found: {0}")]
    NotFound(String),

    /// A row with the same unique key already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The course query key is not one of the queryable keys.
    #[error("key {0} is not queryable")]
    InvalidKey(String),

    /// Malformed caller input (missing query values and the like).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation could not be enqueued before the timeout elapsed.
    #[error("timed out after {0:?} waiting to enqueue store operation")]
    QueueTimeout(Duration),

    /// The store worker has stopped, or dropped the operation before replying.
    #[error("store worker is not accepting operations")]
    QueueClosed,

    /// The underlying SQLite operation failed.
    #[error("database error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Fetching the upstream course dataset failed.
    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the same call may succeed.
    ///
    /// Only enqueue timeouts qualify; an action's own failure is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QueueTimeout(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::UpstreamFetch(err.to_string())
    }
}
