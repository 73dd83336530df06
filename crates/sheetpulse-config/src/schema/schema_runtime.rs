//! Runtime configuration types (queue, workers, scheduler).

use serde::{Deserialize, Serialize};

/// Sync queue and worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of concurrent workers. Kept small to serialize upstream API access.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Maximum job starts per rate limit window, shared by all tenants.
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,

    /// Rolling rate limit window in seconds.
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,

    /// Deliveries per job before it is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff in seconds; doubled on every further attempt.
    #[serde(default = "default_backoff")]
    pub backoff_secs: u64,

    /// Maximum pending jobs (0 = unlimited).
    #[serde(default)]
    pub max_queue_size: u64,

    /// Idle poll interval in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// A running job older than this is flagged as stalled.
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_secs: u64,

    /// How often the stall janitor runs.
    #[serde(default = "default_stall_check_interval")]
    pub stall_check_interval_secs: u64,

    /// How long shutdown waits for in-flight jobs before releasing them.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,

    /// Completed jobs older than this are purged by the janitor (0 = keep forever).
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
}

fn default_concurrency() -> u32 {
    1
}

fn default_rate_limit_max() -> u32 {
    10
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    500
}

fn default_stall_timeout() -> u64 {
    900
}

fn default_stall_check_interval() -> u64 {
    60
}

fn default_shutdown_grace() -> u64 {
    30
}

fn default_retention() -> u64 {
    7 * 24 * 3600
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            rate_limit_max: default_rate_limit_max(),
            rate_limit_window_secs: default_rate_limit_window(),
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff(),
            max_queue_size: 0,
            poll_interval_ms: default_poll_interval(),
            stall_timeout_secs: default_stall_timeout(),
            stall_check_interval_secs: default_stall_check_interval(),
            shutdown_grace_secs: default_shutdown_grace(),
            retention_secs: default_retention(),
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay before the single retry of a failed enqueue.
    #[serde(default = "default_enqueue_retry_delay")]
    pub enqueue_retry_delay_secs: u64,

    /// Timezone used when a schedule is created without one.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
}

fn default_enqueue_retry_delay() -> u64 {
    600
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enqueue_retry_delay_secs: default_enqueue_retry_delay(),
            default_timezone: default_timezone(),
        }
    }
}
