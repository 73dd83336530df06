//! Worker pool draining the sync queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use sheetpulse_config::QueueConfig;
use sheetpulse_protocols::{JobQueue, RetryDecision, SyncJob};

use crate::handler::JobHandler;
use crate::rate_limit::RateLimiter;

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

/// Processes one job at a time and keeps per-worker counters.
pub struct Worker {
    id: u64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
}

impl Worker {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed.load(Ordering::SeqCst)
    }

    pub fn jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::SeqCst)
    }

    /// Run the handler and acknowledge the outcome to the queue.
    ///
    /// Returns whether the delivery succeeded.
    pub async fn process(&self, job: &SyncJob, handler: &dyn JobHandler, queue: &dyn JobQueue) -> bool {
        debug!("Worker {} processing job {}", self.id, job.id);

        match handler.handle(job).await {
            Ok(_) => {
                self.jobs_completed.fetch_add(1, Ordering::SeqCst);
                if let Err(e) = queue.complete(job).await {
                    warn!("Failed to acknowledge job {}: {}", job.id, e);
                }
                true
            }
            Err(e) => {
                self.jobs_failed.fetch_add(1, Ordering::SeqCst);
                match queue.fail(job, &e.to_string()).await {
                    Ok(RetryDecision::Retry { attempt, run_at }) => {
                        info!("Job {} will retry after attempt {} at {}", job.id, attempt, run_at);
                    }
                    Ok(RetryDecision::DeadLetter { attempts }) => {
                        error!("Job {} dead-lettered after {} attempts", job.id, attempts);
                    }
                    Err(qe) => warn!("Failed to record failure of job {}: {}", job.id, qe),
                }
                false
            }
        }
    }
}

/// Semaphore-bounded pool of workers.
pub struct WorkerPool {
    config: QueueConfig,
    semaphore: Arc<Semaphore>,
    limiter: Arc<RateLimiter>,
    running: Arc<AtomicBool>,
    next_worker_id: AtomicU64,
    total_completed: Arc<AtomicU64>,
    total_failed: Arc<AtomicU64>,
    in_flight: Arc<Mutex<HashMap<Uuid, SyncJob>>>,
}

impl WorkerPool {
    pub fn new(config: QueueConfig) -> Self {
        let permits = config.concurrency.max(1) as usize;
        let limiter = RateLimiter::new(
            config.rate_limit_max,
            Duration::from_secs(config.rate_limit_window_secs),
        );
        Self {
            config,
            semaphore: Arc::new(Semaphore::new(permits)),
            limiter: Arc::new(limiter),
            running: Arc::new(AtomicBool::new(false)),
            next_worker_id: AtomicU64::new(1),
            total_completed: Arc::new(AtomicU64::new(0)),
            total_failed: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn total_completed(&self) -> u64 {
        self.total_completed.load(Ordering::SeqCst)
    }

    pub fn total_failed(&self) -> u64 {
        self.total_failed.load(Ordering::SeqCst)
    }

    pub fn available_workers(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms.max(1))
    }

    /// Recover jobs left running by a crashed process, then process jobs
    /// until `shutdown_rx` fires.
    ///
    /// On shutdown, in-flight jobs get the configured grace period; jobs
    /// still running afterwards are aborted and released back to the queue.
    pub async fn run_loop(
        self: Arc<Self>,
        queue: Arc<dyn JobQueue>,
        handler: Arc<dyn JobHandler>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        if let Err(e) = queue.recover_in_flight().await {
            warn!("Failed to recover in-flight jobs: {}", e);
        }

        self.running.store(true, Ordering::SeqCst);
        info!(
            "Worker pool started with {} workers ({} starts per {}s)",
            self.config.concurrency, self.config.rate_limit_max, self.config.rate_limit_window_secs
        );

        let janitor = tokio::spawn(stall_janitor(
            queue.clone(),
            Duration::from_secs(self.config.stall_timeout_secs),
            Duration::from_secs(self.config.retention_secs),
            Duration::from_secs(self.config.stall_check_interval_secs.max(1)),
            shutdown_rx.resubscribe(),
        ));

        let mut tasks = JoinSet::new();

        loop {
            while tasks.try_join_next().is_some() {}

            let permit = tokio::select! {
                _ = shutdown_rx.recv() => break,
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = self.limiter.ready() => {}
            }

            match queue.dequeue().await {
                Ok(Some(job)) => {
                    self.limiter.record();
                    self.in_flight.lock().insert(job.id, job.clone());

                    let worker = Worker::new(self.next_worker_id.fetch_add(1, Ordering::SeqCst));
                    let queue = queue.clone();
                    let handler = handler.clone();
                    let in_flight = self.in_flight.clone();
                    let total_completed = self.total_completed.clone();
                    let total_failed = self.total_failed.clone();

                    tasks.spawn(async move {
                        let succeeded = worker.process(&job, handler.as_ref(), queue.as_ref()).await;
                        if succeeded {
                            total_completed.fetch_add(1, Ordering::SeqCst);
                        } else {
                            total_failed.fetch_add(1, Ordering::SeqCst);
                        }
                        in_flight.lock().remove(&job.id);
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(self.poll_interval()) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    error!("Failed to dequeue job: {}", e);
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(self.poll_interval()) => {}
                    }
                }
            }
        }

        info!("Worker pool shutting down");
        self.drain(tasks, queue.as_ref()).await;
        janitor.abort();
        self.running.store(false, Ordering::SeqCst);
        info!("Worker pool stopped");
    }

    async fn drain(&self, mut tasks: JoinSet<()>, queue: &dyn JobQueue) {
        let grace = Duration::from_secs(self.config.shutdown_grace_secs);
        let waited = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if waited.is_ok() {
            return;
        }

        warn!("Shutdown grace of {:?} elapsed with {} jobs running", grace, tasks.len());
        tasks.shutdown().await;

        let abandoned: Vec<SyncJob> = self.in_flight.lock().drain().map(|(_, job)| job).collect();
        for job in abandoned {
            match queue.release(&job).await {
                Ok(()) => info!("Released job {} back to the queue", job.id),
                Err(e) => warn!("Failed to release job {}: {}", job.id, e),
            }
        }
    }
}

async fn stall_janitor(
    queue: Arc<dyn JobQueue>,
    window: Duration,
    retention: Duration,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                if let Err(e) = queue.detect_stalled(window).await {
                    warn!("Stall check failed: {}", e);
                }
                // Zero retention keeps completed jobs forever.
                if !retention.is_zero() {
                    if let Err(e) = queue.purge_completed(retention).await {
                        warn!("Job retention sweep failed: {}", e);
                    }
                }
            }
        }
    }
}
