//! Notification errors.

use thiserror::Error;

/// Notification error types.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Request to the channel could not be sent.
    #[error("{channel} request failed: {message}")]
    Request { channel: String, message: String },

    /// Channel answered with a non-success status.
    #[error("{channel} returned {status}: {body}")]
    Rejected {
        channel: String,
        status: u16,
        body: String,
    },

    /// Channel did not finish within the manager's deadline.
    #[error("{channel} timed out after {timeout_ms}ms")]
    Timeout { channel: String, timeout_ms: u64 },
}

impl NotifyError {
    pub(crate) fn request(channel: &str, err: impl std::fmt::Display) -> Self {
        NotifyError::Request {
            channel: channel.to_string(),
            message: err.to_string(),
        }
    }
}
