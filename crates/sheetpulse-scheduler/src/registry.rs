//! Schedule registry: validated CRUD and run bookkeeping over a
//! [`ScheduleStore`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use sheetpulse_protocols::{Service, StoreError};

use crate::cron::{CronSpec, compute_next_run, parse_timezone};
use crate::error::SchedulerError;
use crate::schedule::{Schedule, ScheduleKey};
use crate::store::ScheduleStore;

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

/// Persistent set of tenant schedules.
#[derive(Clone)]
pub struct ScheduleRegistry {
    store: Arc<dyn ScheduleStore>,
}

impl ScheduleRegistry {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    /// Create the schedule for `(tenant_id, service)`.
    ///
    /// The cron expression and timezone are validated before anything is
    /// written. A disabled schedule is stored without a next run.
    pub async fn create(
        &self,
        tenant_id: &str,
        service: Service,
        cron_expression: &str,
        enabled: bool,
        timezone: &str,
    ) -> Result<Schedule, SchedulerError> {
        let now = Utc::now();
        let next_run = compute_next_run(cron_expression, timezone, now)?;

        let mut schedule = Schedule::new(tenant_id, service, cron_expression.trim(), timezone.trim());
        schedule.enabled = enabled;
        schedule.next_run_at = enabled.then_some(next_run);

        match self.store.insert(&schedule).await {
            Ok(()) => {
                info!(
                    "Created schedule {} ({} {}) next run {:?}",
                    schedule.key(),
                    schedule.cron_expression,
                    schedule.timezone,
                    schedule.next_run_at
                );
                Ok(schedule)
            }
            Err(StoreError::Conflict(_)) => Err(SchedulerError::DuplicateSchedule {
                tenant_id: tenant_id.to_string(),
                service: service.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Change a schedule's definition, scoped to its tenant.
    ///
    /// Returns `Ok(None)` when the store is unavailable; the change is
    /// dropped with a warning.
    pub async fn update(
        &self,
        id: &str,
        tenant_id: &str,
        cron_expression: &str,
        enabled: bool,
        timezone: &str,
    ) -> Result<Option<Schedule>, SchedulerError> {
        let now = Utc::now();
        let next_run = compute_next_run(cron_expression, timezone, now)?;

        let existing = match self.store.get_by_id(tenant_id, id).await {
            Ok(Some(schedule)) => schedule,
            Ok(None) => return Err(SchedulerError::ScheduleNotFound(id.to_string())),
            Err(e) if e.is_unavailable() => {
                warn!("Schedule {} not updated, store unavailable: {}", id, e);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let mut schedule = existing;
        schedule.cron_expression = cron_expression.trim().to_string();
        schedule.timezone = timezone.trim().to_string();
        schedule.enabled = enabled;
        schedule.next_run_at = enabled.then_some(next_run);
        schedule.updated_at = now;

        match self.store.update(&schedule).await {
            Ok(true) => {
                info!("Updated schedule {} next run {:?}", schedule.key(), schedule.next_run_at);
                Ok(Some(schedule))
            }
            Ok(false) => Err(SchedulerError::ScheduleNotFound(id.to_string())),
            Err(e) if e.is_unavailable() => {
                warn!("Schedule {} not updated, store unavailable: {}", id, e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, key: &ScheduleKey) -> Result<Option<Schedule>, SchedulerError> {
        Ok(self.store.get(key).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<Schedule>, SchedulerError> {
        Ok(self.store.list_all().await?)
    }

    /// All enabled schedules.
    pub async fn list_active(&self) -> Result<Vec<Schedule>, SchedulerError> {
        Ok(self.store.list_enabled().await?)
    }

    /// Enabled schedules whose next run passed before `now`.
    pub async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, SchedulerError> {
        Ok(self.store.list_due(now).await?)
    }

    pub async fn record_run(&self, key: &ScheduleKey, at: DateTime<Utc>) -> Result<(), SchedulerError> {
        if !self.store.set_last_run(key, at).await? {
            debug!("No schedule {} to record a run on", key);
        }
        Ok(())
    }

    pub async fn record_next_run(
        &self,
        key: &ScheduleKey,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), SchedulerError> {
        if !self.store.set_next_run(key, at).await? {
            debug!("No schedule {} to record a next run on", key);
        }
        Ok(())
    }

    /// Next run of `expression` in `timezone` strictly after `now`.
    pub fn compute_next_run(
        &self,
        expression: &str,
        timezone: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, SchedulerError> {
        compute_next_run(expression, timezone, now)
    }

    /// Parse and validate without touching the store.
    pub fn validate(expression: &str, timezone: &str) -> Result<(), SchedulerError> {
        CronSpec::parse(expression)?;
        parse_timezone(timezone)?;
        Ok(())
    }
}
