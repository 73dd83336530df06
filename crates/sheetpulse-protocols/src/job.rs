//! Sync job definition and status.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::service::{Service, TenantId};

/// Parameters for one sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub tenant_id: TenantId,
    /// Day to sync instead of the executor's default (usually yesterday).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    /// Spreadsheet/sheet overrides passed through to the executor untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_overrides: Option<serde_json::Value>,
}

impl SyncRequest {
    pub fn new(tenant_id: impl Into<TenantId>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            target_date: None,
            destination_overrides: None,
        }
    }

    pub fn with_target_date(mut self, date: NaiveDate) -> Self {
        self.target_date = Some(date);
        self
    }

    pub fn with_destination_overrides(mut self, overrides: serde_json::Value) -> Self {
        self.destination_overrides = Some(overrides);
        self
    }
}

/// Job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in queue (possibly for a backoff delay).
    Pending,
    /// Claimed by a worker.
    Running,
    /// Finished successfully.
    Completed,
    /// Attempts exhausted; kept for inspection.
    Dead,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Dead => "dead",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "dead" => Some(JobStatus::Dead),
            _ => None,
        }
    }
}

/// A sync job in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    /// Queue-assigned ID.
    pub id: Uuid,
    pub service: Service,
    pub request: SyncRequest,
    pub status: JobStatus,
    /// Number of deliveries that ended in failure.
    pub attempts: u32,
    pub max_attempts: u32,
    /// Earliest time the job may be dequeued.
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the current delivery was claimed.
    pub started_at: Option<DateTime<Utc>>,
    /// Set by stall detection; never cleared while the job runs.
    pub stalled: bool,
    pub last_error: Option<String>,
}

impl SyncJob {
    /// Create a new pending job.
    pub fn new(service: Service, request: SyncRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            service,
            request,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: 3,
            run_at: now,
            created_at: now,
            updated_at: now,
            started_at: None,
            stalled: false,
            last_error: None,
        }
    }

    /// Set maximum attempts.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    pub fn tenant_id(&self) -> &str {
        &self.request.tenant_id
    }

    /// Whether another delivery is allowed after the current one fails.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Whether the job may be dequeued at `now`.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.run_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_job_new() {
        let job = SyncJob::new(Service::Meta, SyncRequest::new("42"));
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.tenant_id(), "42");
        assert!(job.is_ready(Utc::now()));
    }

    #[test]
    fn test_job_not_ready_before_run_at() {
        let mut job = SyncJob::new(Service::Ga4, SyncRequest::new("7"));
        job.run_at = Utc::now() + Duration::minutes(5);
        assert!(!job.is_ready(Utc::now()));
    }

    #[test]
    fn test_can_retry() {
        let mut job = SyncJob::new(Service::Shopify, SyncRequest::new("7")).with_max_attempts(2);
        assert!(job.can_retry());
        job.attempts = 2;
        assert!(!job.can_retry());
    }

    #[test]
    fn test_max_attempts_at_least_one() {
        let job = SyncJob::new(Service::Meta, SyncRequest::new("1")).with_max_attempts(0);
        assert_eq!(job.max_attempts, 1);
    }

    #[test]
    fn test_status_parse() {
        for status in [JobStatus::Pending, JobStatus::Running, JobStatus::Completed, JobStatus::Dead] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("unknown"), None);
    }

    #[test]
    fn test_request_serde_camel_case() {
        let request = SyncRequest::new("42")
            .with_target_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tenantId"], "42");
        assert_eq!(json["targetDate"], "2024-01-01");
        assert!(json.get("destinationOverrides").is_none());
    }
}
