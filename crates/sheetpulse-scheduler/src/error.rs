//! Scheduler errors.

use sheetpulse_protocols::{QueueError, StoreError};
use thiserror::Error;

/// Scheduler error types.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A schedule already exists for the tenant and service.
    #[error("Schedule already exists for tenant {tenant_id} and service {service}")]
    DuplicateSchedule { tenant_id: String, service: String },

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Schedule not found: {0}")]
    ScheduleNotFound(String),

    #[error("Failed to enqueue sync: {0}")]
    Enqueue(#[from] QueueError),

    #[error("Schedule store error: {0}")]
    Store(#[from] StoreError),

    #[error("Scheduler is shut down")]
    ShutDown,
}

impl SchedulerError {
    pub(crate) fn invalid_cron(expression: &str, reason: impl Into<String>) -> Self {
        SchedulerError::InvalidCronExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}
