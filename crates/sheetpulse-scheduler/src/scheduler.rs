//! Cron-driven scheduler.
//!
//! One tokio task per active `(tenant, service)` schedule sleeps until the
//! next matching wall-clock instant and enqueues a sync job. Every timer is
//! a child of the scheduler's shutdown token, so stopping the scheduler
//! stops all of them.
//!
//! ## Lifecycle
//!
//! - [`Scheduler::start`] enqueues one catch-up job per schedule that missed
//!   its run while the process was down, then registers timers.
//! - [`Scheduler::refresh`] reconciles timers with the registry after any
//!   schedule mutation.
//! - [`Scheduler::shutdown`] cancels timers and pending retries.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use sheetpulse_audit::{AuditAction, AuditEvent, AuditLog};
use sheetpulse_config::SchedulerConfig;
use sheetpulse_notify::Notifier;
use sheetpulse_protocols::{JobQueue, QueueError, Service, SyncRequest};

use crate::cron::{CronSpec, parse_timezone};
use crate::error::SchedulerError;
use crate::registry::ScheduleRegistry;
use crate::schedule::{Schedule, ScheduleKey};

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

/// Wall-clock time that never falls behind the tokio clock elapsed since
/// the scheduler was created.
struct SchedulerClock {
    origin_wall: DateTime<Utc>,
    origin: Instant,
}

impl SchedulerClock {
    fn new() -> Self {
        Self {
            origin_wall: Utc::now(),
            origin: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        Utc::now().max(self.origin_wall + elapsed)
    }
}

/// A registered timer task.
struct TimerEntry {
    id: u64,
    cron_expression: String,
    timezone: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TimerEntry {
    fn matches(&self, schedule: &Schedule) -> bool {
        self.cron_expression == schedule.cron_expression && self.timezone == schedule.timezone
    }
}

struct SchedulerInner {
    registry: ScheduleRegistry,
    queue: Arc<dyn JobQueue>,
    audit: AuditLog,
    notifier: Arc<Notifier>,
    retry_delay: Duration,
    clock: SchedulerClock,
    timers: Mutex<HashMap<ScheduleKey, TimerEntry>>,
    refresh_lock: tokio::sync::Mutex<()>,
    retries: TaskTracker,
    shutdown: CancellationToken,
    next_timer_id: AtomicU64,
}

/// Owns the timer registry for every active schedule.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(
        registry: ScheduleRegistry,
        queue: Arc<dyn JobQueue>,
        audit: AuditLog,
        notifier: Arc<Notifier>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                registry,
                queue,
                audit,
                notifier,
                retry_delay: Duration::from_secs(config.enqueue_retry_delay_secs),
                clock: SchedulerClock::new(),
                timers: Mutex::new(HashMap::new()),
                refresh_lock: tokio::sync::Mutex::new(()),
                retries: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                next_timer_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn registry(&self) -> &ScheduleRegistry {
        &self.inner.registry
    }

    /// Delay before the single retry of a failed enqueue.
    pub fn retry_delay(&self) -> Duration {
        self.inner.retry_delay
    }

    /// Recover missed runs, then register a timer per active schedule.
    ///
    /// Returns the number of catch-up jobs attempted.
    pub async fn start(&self) -> Result<usize, SchedulerError> {
        if self.is_shut_down() {
            return Err(SchedulerError::ShutDown);
        }

        let now = self.inner.clock.now();
        let due = self.inner.registry.list_due(now).await?;
        let recovered = due.len();
        for schedule in due {
            info!(
                "Schedule {} missed its run at {:?}, enqueueing catch-up",
                schedule.key(),
                schedule.next_run_at
            );
            if let Err(e) = self.inner.trigger(&schedule).await {
                warn!("Catch-up for {} failed: {}", schedule.key(), e);
            }
        }

        self.refresh().await?;
        info!(
            "Scheduler started: {} timers, {} missed runs recovered",
            self.active_timer_count(),
            recovered
        );
        Ok(recovered)
    }

    /// Reconcile timers with the registry's active schedules.
    ///
    /// Timers whose key vanished are stopped. A timer whose cron expression
    /// and timezone are unchanged is kept; everything else is (re)created.
    pub async fn refresh(&self) -> Result<(), SchedulerError> {
        let _guard = self.inner.refresh_lock.lock().await;
        if self.is_shut_down() {
            debug!("Refresh skipped, scheduler is shut down");
            return Ok(());
        }

        let active = self.inner.registry.list_active().await?;
        let wanted: HashSet<ScheduleKey> = active.iter().map(Schedule::key).collect();

        let mut timers = self.inner.timers.lock();
        timers.retain(|key, entry| {
            let keep = wanted.contains(key);
            if !keep {
                debug!("Stopping timer {} for {}", entry.id, key);
                entry.cancel.cancel();
            }
            keep
        });

        for schedule in &active {
            let key = schedule.key();
            if let Some(entry) = timers.get(&key) {
                if entry.matches(schedule) && !entry.handle.is_finished() {
                    continue;
                }
            }
            match self.inner.spawn_timer(schedule) {
                Ok(entry) => {
                    if let Some(old) = timers.insert(key, entry) {
                        old.cancel.cancel();
                    }
                }
                Err(e) => {
                    warn!("Not scheduling {}: {}", key, e);
                    if let Some(old) = timers.remove(&key) {
                        old.cancel.cancel();
                    }
                }
            }
        }

        debug!("Refreshed schedules: {} active timers", timers.len());
        Ok(())
    }

    /// Run a schedule now as if its timer had fired.
    pub async fn trigger(&self, schedule: &Schedule) -> Result<Uuid, SchedulerError> {
        self.inner.trigger(schedule).await
    }

    /// Enqueue a sync outside the schedule. `next_run_at` is not touched.
    pub async fn trigger_now(&self, tenant_id: &str, service: Service) -> Result<Uuid, SchedulerError> {
        self.trigger_now_with(service, SyncRequest::new(tenant_id)).await
    }

    /// Like [`trigger_now`](Self::trigger_now) with explicit sync parameters.
    pub async fn trigger_now_with(&self, service: Service, request: SyncRequest) -> Result<Uuid, SchedulerError> {
        if self.is_shut_down() {
            return Err(SchedulerError::ShutDown);
        }
        let tenant_id = request.tenant_id.clone();
        let id = self.inner.queue.enqueue(service, request).await?;
        info!("Manual {} sync for tenant {} enqueued as job {}", service, tenant_id, id);
        Ok(id)
    }

    /// Cancel every timer and pending retry and wait for them to exit.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let _guard = self.inner.refresh_lock.lock().await;

        let entries: Vec<(ScheduleKey, TimerEntry)> = self.inner.timers.lock().drain().collect();
        let count = entries.len();
        for (key, entry) in entries {
            entry.cancel.cancel();
            if let Err(e) = entry.handle.await {
                if !e.is_cancelled() {
                    warn!("Timer for {} ended abnormally: {}", key, e);
                }
            }
        }

        self.inner.retries.close();
        self.inner.retries.wait().await;
        info!("Scheduler stopped ({} timers cancelled)", count);
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    pub fn active_timer_count(&self) -> usize {
        self.inner.timers.lock().len()
    }

    /// Keys with a registered timer, sorted.
    pub fn active_keys(&self) -> Vec<ScheduleKey> {
        let mut keys: Vec<ScheduleKey> = self.inner.timers.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Enqueue retries waiting for their delay.
    pub fn pending_retries(&self) -> usize {
        self.inner.retries.len()
    }
}

impl SchedulerInner {
    fn spawn_timer(self: &Arc<Self>, schedule: &Schedule) -> Result<TimerEntry, SchedulerError> {
        let spec = CronSpec::parse(&schedule.cron_expression)?;
        let tz = parse_timezone(&schedule.timezone)?;
        let id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();
        let key = schedule.key();

        debug!(
            "Starting timer {} for {} ({} {})",
            id, key, schedule.cron_expression, schedule.timezone
        );
        let handle = tokio::spawn(run_timer(
            Arc::downgrade(self),
            schedule.clone(),
            spec,
            tz,
            cancel.clone(),
        ));

        Ok(TimerEntry {
            id,
            cron_expression: schedule.cron_expression.clone(),
            timezone: schedule.timezone.clone(),
            cancel,
            handle,
        })
    }

    /// Timer fire: reload the schedule and trigger it if still enabled.
    async fn fire(self: &Arc<Self>, snapshot: &Schedule) {
        let key = snapshot.key();
        let schedule = match self.registry.get(&key).await {
            Ok(Some(schedule)) if schedule.enabled => schedule,
            Ok(Some(_)) => {
                debug!("Schedule {} disabled, skipping fire", key);
                return;
            }
            Ok(None) => {
                debug!("Schedule {} removed, skipping fire", key);
                return;
            }
            Err(e) => {
                warn!("Could not reload schedule {}: {}; firing with cached definition", key, e);
                snapshot.clone()
            }
        };

        if let Err(e) = self.trigger(&schedule).await {
            debug!("Scheduled run of {} failed: {}", key, e);
        }
    }

    async fn trigger(self: &Arc<Self>, schedule: &Schedule) -> Result<Uuid, SchedulerError> {
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }

        let key = schedule.key();
        if let Err(e) = self.registry.record_run(&key, self.clock.now()).await {
            warn!("Failed to record run of {}: {}", key, e);
        }

        match self.enqueue_and_advance(schedule).await {
            Ok(id) => Ok(id),
            Err(e) => {
                error!("Failed to enqueue scheduled sync for {}: {}", key, e);
                self.report_enqueue_failure(schedule, &e, Some(self.retry_delay)).await;
                self.schedule_retry(schedule.clone());
                Err(e.into())
            }
        }
    }

    async fn enqueue_and_advance(&self, schedule: &Schedule) -> Result<Uuid, QueueError> {
        let id = self
            .queue
            .enqueue(schedule.service, SyncRequest::new(schedule.tenant_id.clone()))
            .await?;
        info!("Scheduled {} sync enqueued as job {}", schedule.key(), id);
        self.advance(schedule).await;
        Ok(id)
    }

    /// Persist the next run. Errors are logged; the enqueue stands.
    async fn advance(&self, schedule: &Schedule) {
        let key = schedule.key();
        let next = match self.registry.compute_next_run(
            &schedule.cron_expression,
            &schedule.timezone,
            self.clock.now(),
        ) {
            Ok(next) => next,
            Err(e) => {
                warn!("Could not compute next run of {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.registry.record_next_run(&key, Some(next)).await {
            warn!("Failed to record next run of {}: {}", key, e);
        } else {
            debug!("Schedule {} next run at {}", key, next);
        }
    }

    async fn report_enqueue_failure(&self, schedule: &Schedule, err: &QueueError, retry_in: Option<Duration>) {
        let message = format!("Failed to enqueue scheduled sync: {}", err);
        self.notifier
            .send_sync_failure(&schedule.tenant_id, schedule.service, &message)
            .await;

        let metadata = match retry_in {
            Some(delay) => json!({ "phase": "enqueue", "retryInSecs": delay.as_secs() }),
            None => json!({ "phase": "retry" }),
        };
        self.audit
            .record(
                AuditEvent::failure(schedule.tenant_id.clone(), AuditAction::ScheduleFailure, message)
                    .with_service(schedule.service)
                    .with_metadata(metadata),
            )
            .await;
    }

    /// Spawn the single delayed retry for a failed enqueue.
    fn schedule_retry(self: &Arc<Self>, schedule: Schedule) {
        let inner = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        let delay = self.retry_delay;
        info!("Retrying enqueue for {} in {:?}", schedule.key(), delay);

        self.retries.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Retry for {} cancelled", schedule.key());
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match inner.enqueue_and_advance(&schedule).await {
                Ok(id) => info!("Retry for {} enqueued job {}", schedule.key(), id),
                Err(e) => {
                    error!("Retry for {} failed, giving up: {}", schedule.key(), e);
                    inner.report_enqueue_failure(&schedule, &e, None).await;
                }
            }
        });
    }
}

async fn run_timer(
    scheduler: Weak<SchedulerInner>,
    schedule: Schedule,
    spec: CronSpec,
    tz: Tz,
    cancel: CancellationToken,
) {
    let key = schedule.key();
    let mut after = match scheduler.upgrade() {
        Some(inner) => inner.clock.now(),
        None => return,
    };

    loop {
        let Some(next) = spec.next_after(tz, after) else {
            warn!("Schedule {} has no upcoming run, stopping timer", key);
            return;
        };

        let delay = match scheduler.upgrade() {
            Some(inner) => (next - inner.clock.now()).to_std().unwrap_or(Duration::ZERO),
            None => return,
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Timer for {} cancelled", key);
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let Some(inner) = scheduler.upgrade() else {
            return;
        };
        debug!("Timer for {} fired for {}", key, next);
        inner.fire(&schedule).await;
        after = next.max(inner.clock.now());
    }
}
