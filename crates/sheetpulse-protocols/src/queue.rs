//! Queue broker protocol.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::QueueError;
use crate::job::{SyncJob, SyncRequest};
use crate::service::Service;

/// What the queue did with a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Job will be redelivered no earlier than `run_at`.
    Retry { attempt: u32, run_at: DateTime<Utc> },
    /// Attempts exhausted; the job was dead-lettered.
    DeadLetter { attempts: u32 },
}

/// Durable queue of sync jobs with at-least-once delivery.
///
/// Consumers must tolerate duplicate delivery.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Admit a job; returns the queue-assigned ID.
    async fn enqueue(&self, service: Service, request: SyncRequest) -> Result<Uuid, QueueError>;

    /// Claim the oldest ready job, if any.
    async fn dequeue(&self) -> Result<Option<SyncJob>, QueueError>;

    /// Acknowledge a successful delivery.
    async fn complete(&self, job: &SyncJob) -> Result<(), QueueError>;

    /// Record a failed delivery and apply the retry/backoff policy.
    async fn fail(&self, job: &SyncJob, error: &str) -> Result<RetryDecision, QueueError>;

    /// Put a claimed job back without consuming an attempt.
    async fn release(&self, job: &SyncJob) -> Result<(), QueueError>;

    /// Flag running jobs claimed longer than `window` ago. Flagged jobs keep running.
    async fn detect_stalled(&self, window: Duration) -> Result<Vec<SyncJob>, QueueError>;

    /// Return jobs left running by a previous process to the queue.
    async fn recover_in_flight(&self) -> Result<usize, QueueError>;

    /// Drop completed jobs finished more than `retention` ago.
    async fn purge_completed(&self, retention: Duration) -> Result<u64, QueueError>;
}
