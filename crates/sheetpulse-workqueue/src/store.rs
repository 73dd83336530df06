//! Job persistence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use sheetpulse_protocols::{JobStatus, StoreError, SyncJob};

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

/// Storage behind [`DurableQueue`](crate::DurableQueue).
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job.
    async fn insert(&self, job: &SyncJob) -> Result<(), StoreError>;

    /// Atomically claim the ready pending job with the earliest `run_at`
    /// (ties broken by insertion order) and mark it running.
    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<SyncJob>, StoreError>;

    /// Overwrite the mutable fields of a job.
    async fn update(&self, job: &SyncJob) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<SyncJob>, StoreError>;

    async fn count_pending(&self) -> Result<u64, StoreError>;

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<SyncJob>, StoreError>;

    /// Flag running jobs started before `cutoff`; returns the newly flagged ones.
    async fn flag_stalled(&self, cutoff: DateTime<Utc>) -> Result<Vec<SyncJob>, StoreError>;

    /// Move every running job back to pending; returns how many moved.
    async fn reset_running(&self) -> Result<usize, StoreError>;

    /// Delete completed jobs last updated before `cutoff`; returns how many went.
    /// Dead-lettered jobs are kept.
    async fn purge_completed(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// In-memory job store.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, (u64, SyncJob)>>,
    seq: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("job store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &SyncJob) -> Result<(), StoreError> {
        self.check()?;
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(format!("job {} already exists", job.id)));
        }
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        jobs.insert(job.id, (seq, job.clone()));
        Ok(())
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<SyncJob>, StoreError> {
        self.check()?;
        let mut jobs = self.jobs.write().await;
        let next = jobs
            .values()
            .filter(|(_, job)| job.is_ready(now))
            .min_by_key(|(seq, job)| (job.run_at, *seq))
            .map(|(_, job)| job.id);

        Ok(next.and_then(|id| jobs.get_mut(&id)).map(|(_, job)| {
            job.status = JobStatus::Running;
            job.started_at = Some(now);
            job.stalled = false;
            job.updated_at = now;
            job.clone()
        }))
    }

    async fn update(&self, job: &SyncJob) -> Result<(), StoreError> {
        self.check()?;
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some((_, stored)) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(job.id.to_string())),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<SyncJob>, StoreError> {
        self.check()?;
        Ok(self.jobs.read().await.get(&id).map(|(_, job)| job.clone()))
    }

    async fn count_pending(&self) -> Result<u64, StoreError> {
        self.check()?;
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|(_, job)| job.status == JobStatus::Pending)
            .count() as u64)
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<SyncJob>, StoreError> {
        self.check()?;
        let jobs = self.jobs.read().await;
        let mut matching: Vec<_> = jobs.values().filter(|(_, job)| job.status == status).collect();
        matching.sort_by_key(|(seq, _)| *seq);
        Ok(matching.into_iter().map(|(_, job)| job.clone()).collect())
    }

    async fn flag_stalled(&self, cutoff: DateTime<Utc>) -> Result<Vec<SyncJob>, StoreError> {
        self.check()?;
        let mut jobs = self.jobs.write().await;
        let now = Utc::now();
        let mut flagged = Vec::new();
        for (_, job) in jobs.values_mut() {
            let started_before = job.started_at.is_some_and(|t| t < cutoff);
            if job.status == JobStatus::Running && !job.stalled && started_before {
                job.stalled = true;
                job.updated_at = now;
                flagged.push(job.clone());
            }
        }
        Ok(flagged)
    }

    async fn reset_running(&self) -> Result<usize, StoreError> {
        self.check()?;
        let mut jobs = self.jobs.write().await;
        let now = Utc::now();
        let mut count = 0;
        for (_, job) in jobs.values_mut() {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Pending;
                job.started_at = None;
                job.stalled = false;
                job.updated_at = now;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn purge_completed(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check()?;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, (_, job)| !(job.status == JobStatus::Completed && job.updated_at < cutoff));
        Ok((before - jobs.len()) as u64)
    }
}
