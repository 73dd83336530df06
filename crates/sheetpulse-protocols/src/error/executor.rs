//! Sync executor errors.

use thiserror::Error;

/// Error raised by a [`SyncExecutor`](crate::SyncExecutor).
///
/// Executors that can tell a token expiry or a quota rejection apart
/// should use the dedicated variants; everything else lands in `Failed`
/// and is classified from its message.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Access token expired: {0}")]
    TokenExpired(String),

    #[error("Rate limited by upstream API: {0}")]
    RateLimited(String),

    #[error("Sync failed: {0}")]
    Failed(String),

    /// The executor could not be reached at all.
    #[error("Executor unavailable: {0}")]
    Unavailable(String),
}
