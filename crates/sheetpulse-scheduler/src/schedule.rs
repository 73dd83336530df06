//! Schedule model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sheetpulse_protocols::{Service, TenantId};

/// Identity of a schedule: one per tenant and service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScheduleKey {
    pub tenant_id: TenantId,
    pub service: Service,
}

impl ScheduleKey {
    pub fn new(tenant_id: impl Into<TenantId>, service: Service) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            service,
        }
    }
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.service)
    }
}

/// A tenant's recurring sync schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub tenant_id: TenantId,
    pub service: Service,
    pub cron_expression: String,
    pub enabled: bool,
    /// IANA timezone name.
    pub timezone: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    pub fn new(
        tenant_id: impl Into<TenantId>,
        service: Service,
        cron_expression: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            service,
            cron_expression: cron_expression.into(),
            enabled: true,
            timezone: timezone.into(),
            last_run_at: None,
            next_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> ScheduleKey {
        ScheduleKey::new(self.tenant_id.clone(), self.service)
    }

    /// Whether the schedule missed a run before `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run_at.is_some_and(|t| t < now)
    }
}
