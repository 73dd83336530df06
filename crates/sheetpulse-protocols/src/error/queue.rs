//! Queue errors.

use thiserror::Error;

use super::StoreError;

/// Queue error types.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The job could not be admitted to the queue.
    #[error("Enqueue failed: {0}")]
    EnqueueFailure(String),

    /// Queue is at its configured capacity.
    #[error("Queue is full")]
    QueueFull,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Broker or its backing store is unreachable.
    #[error("Queue storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Worker error: {0}")]
    WorkerError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_display() {
        assert_eq!(QueueError::QueueFull.to_string(), "Queue is full");
    }

    #[test]
    fn test_storage_from_store_error() {
        let err: QueueError = StoreError::Unavailable("db locked".to_string()).into();
        assert!(err.to_string().contains("db locked"));
        assert!(matches!(err, QueueError::Storage(_)));
    }
}
