//! Durable FIFO queue with retry and dead-letter handling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sheetpulse_config::QueueConfig;
use sheetpulse_protocols::{
    JobQueue, JobStatus, QueueError, RetryDecision, Service, StoreError, SyncJob, SyncRequest,
};

use crate::store::{JobStore, MemoryJobStore};

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

/// [`JobQueue`] over a [`JobStore`].
pub struct DurableQueue {
    store: Arc<dyn JobStore>,
    max_attempts: u32,
    backoff: Duration,
    max_queue_size: u64,
}

impl DurableQueue {
    pub fn new(config: &QueueConfig, store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_secs(config.backoff_secs),
            max_queue_size: config.max_queue_size,
        }
    }

    /// A queue backed by [`MemoryJobStore`].
    pub fn in_memory(config: &QueueConfig) -> Self {
        Self::new(config, Arc::new(MemoryJobStore::new()))
    }

    /// Delay before delivery number `attempt + 1`: `backoff * 2^(attempt - 1)`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1u32 << exponent)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<SyncJob>, QueueError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn pending_len(&self) -> Result<u64, QueueError> {
        Ok(self.store.count_pending().await?)
    }

    /// Jobs whose attempts are exhausted.
    pub async fn dead_letters(&self) -> Result<Vec<SyncJob>, QueueError> {
        Ok(self.store.list_by_status(JobStatus::Dead).await?)
    }

    async fn write(&self, job: &SyncJob) -> Result<(), QueueError> {
        self.store.update(job).await.map_err(|e| match e {
            StoreError::NotFound(id) => QueueError::JobNotFound(id),
            other => QueueError::Storage(other),
        })
    }
}

#[async_trait]
impl JobQueue for DurableQueue {
    async fn enqueue(&self, service: Service, request: SyncRequest) -> Result<Uuid, QueueError> {
        if self.max_queue_size > 0 {
            let pending = self.store.count_pending().await?;
            if pending >= self.max_queue_size {
                return Err(QueueError::QueueFull);
            }
        }

        let job = SyncJob::new(service, request).with_max_attempts(self.max_attempts);
        self.store
            .insert(&job)
            .await
            .map_err(|e| QueueError::EnqueueFailure(e.to_string()))?;

        debug!("Enqueued {} job {} for tenant {}", service, job.id, job.tenant_id());
        Ok(job.id)
    }

    async fn dequeue(&self) -> Result<Option<SyncJob>, QueueError> {
        let job = self.store.claim_next(Utc::now()).await?;
        if let Some(ref job) = job {
            debug!("Dequeued job {} (attempt {})", job.id, job.attempts + 1);
        }
        Ok(job)
    }

    async fn complete(&self, job: &SyncJob) -> Result<(), QueueError> {
        let mut job = job.clone();
        job.status = JobStatus::Completed;
        job.updated_at = Utc::now();
        job.last_error = None;
        self.write(&job).await
    }

    async fn fail(&self, job: &SyncJob, error: &str) -> Result<RetryDecision, QueueError> {
        let mut job = job.clone();
        let now = Utc::now();
        job.attempts += 1;
        job.last_error = Some(error.to_string());
        job.started_at = None;
        job.updated_at = now;

        let decision = if job.can_retry() {
            let delay = chrono::Duration::from_std(self.backoff_for(job.attempts))
                .unwrap_or_else(|_| chrono::Duration::days(1));
            job.status = JobStatus::Pending;
            job.run_at = now + delay;
            RetryDecision::Retry {
                attempt: job.attempts,
                run_at: job.run_at,
            }
        } else {
            job.status = JobStatus::Dead;
            warn!(
                "Job {} ({} / tenant {}) dead-lettered after {} attempts: {}",
                job.id,
                job.service,
                job.tenant_id(),
                job.attempts,
                error
            );
            RetryDecision::DeadLetter {
                attempts: job.attempts,
            }
        };

        self.write(&job).await?;
        Ok(decision)
    }

    async fn release(&self, job: &SyncJob) -> Result<(), QueueError> {
        let mut job = job.clone();
        job.status = JobStatus::Pending;
        job.started_at = None;
        job.stalled = false;
        job.updated_at = Utc::now();
        self.write(&job).await
    }

    async fn detect_stalled(&self, window: Duration) -> Result<Vec<SyncJob>, QueueError> {
        let window = chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::days(1));
        let stalled = self.store.flag_stalled(Utc::now() - window).await?;
        for job in &stalled {
            warn!(
                "Job {} ({} / tenant {}) stalled: running since {}",
                job.id,
                job.service,
                job.tenant_id(),
                job.started_at.map(|t| t.to_rfc3339()).unwrap_or_default()
            );
        }
        Ok(stalled)
    }

    async fn recover_in_flight(&self) -> Result<usize, QueueError> {
        let count = self.store.reset_running().await?;
        if count > 0 {
            info!("Recovered {} in-flight jobs from a previous run", count);
        }
        Ok(count)
    }

    async fn purge_completed(&self, retention: Duration) -> Result<u64, QueueError> {
        let cutoff = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention));
        let Some(cutoff) = cutoff else {
            return Ok(0);
        };
        let purged = self.store.purge_completed(cutoff).await?;
        if purged > 0 {
            debug!("Purged {} completed jobs", purged);
        }
        Ok(purged)
    }
}
