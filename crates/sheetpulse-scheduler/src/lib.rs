//! # SheetPulse Scheduler
//!
//! Per-tenant cron schedules and the timers that turn them into queued
//! sync jobs.
//!
//! - [`ScheduleRegistry`] validates and persists schedules.
//! - [`Scheduler`] owns one timer per active schedule, recovers missed runs
//!   at startup and retries a failed enqueue once.

pub mod cron;
pub mod error;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod sqlite;
pub mod store;

pub use self::cron::{CronSpec, compute_next_run, parse_timezone};
pub use error::SchedulerError;
pub use registry::ScheduleRegistry;
pub use schedule::{Schedule, ScheduleKey};
pub use scheduler::Scheduler;
pub use sqlite::SqliteScheduleStore;
pub use store::{MemoryScheduleStore, ScheduleStore};
