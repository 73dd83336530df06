//! Audit entry types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sheetpulse_protocols::{Service, TenantId};

/// Audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CredentialSaved,
    CredentialUpdated,
    CredentialDeleted,
    CredentialVerified,
    VerificationFailed,
    ServiceEnabled,
    ServiceDisabled,
    ScheduleFailure,
    WorkflowRun,
    WorkflowCompleted,
    WorkflowFailed,
}

impl AuditAction {
    pub const ALL: [AuditAction; 11] = [
        AuditAction::CredentialSaved,
        AuditAction::CredentialUpdated,
        AuditAction::CredentialDeleted,
        AuditAction::CredentialVerified,
        AuditAction::VerificationFailed,
        AuditAction::ServiceEnabled,
        AuditAction::ServiceDisabled,
        AuditAction::ScheduleFailure,
        AuditAction::WorkflowRun,
        AuditAction::WorkflowCompleted,
        AuditAction::WorkflowFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CredentialSaved => "credential_saved",
            AuditAction::CredentialUpdated => "credential_updated",
            AuditAction::CredentialDeleted => "credential_deleted",
            AuditAction::CredentialVerified => "credential_verified",
            AuditAction::VerificationFailed => "verification_failed",
            AuditAction::ServiceEnabled => "service_enabled",
            AuditAction::ServiceDisabled => "service_disabled",
            AuditAction::ScheduleFailure => "schedule_failure",
            AuditAction::WorkflowRun => "workflow_run",
            AuditAction::WorkflowCompleted => "workflow_completed",
            AuditAction::WorkflowFailed => "workflow_failed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown audit action '{}'", s))
    }
}

/// Outcome of the audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failure,
    Partial,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Failure => "failure",
            AuditStatus::Partial => "partial",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AuditStatus::Success),
            "failure" => Ok(AuditStatus::Failure),
            "partial" => Ok(AuditStatus::Partial),
            other => Err(format!("unknown audit status '{}'", other)),
        }
    }
}

/// An event to be recorded.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub tenant_id: TenantId,
    pub action: AuditAction,
    pub service: Option<Service>,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(tenant_id: impl Into<TenantId>, action: AuditAction, status: AuditStatus) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            action,
            service: None,
            status,
            error_message: None,
            metadata: None,
        }
    }

    pub fn success(tenant_id: impl Into<TenantId>, action: AuditAction) -> Self {
        Self::new(tenant_id, action, AuditStatus::Success)
    }

    pub fn failure(tenant_id: impl Into<TenantId>, action: AuditAction, error: impl Into<String>) -> Self {
        Self::new(tenant_id, action, AuditStatus::Failure).with_error(error)
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error_message = Some(error.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A persisted, sanitized audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub tenant_id: TenantId,
    pub action: AuditAction,
    pub service: Option<Service>,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Optional filters for [`AuditLog::query`](crate::AuditLog::query).
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub action: Option<AuditAction>,
    pub service: Option<Service>,
    pub status: Option<AuditStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl AuditQuery {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.action.is_none_or(|a| a == entry.action)
            && self.service.is_none_or(|s| entry.service == Some(s))
            && self.status.is_none_or(|s| s == entry.status)
            && self.since.is_none_or(|t| entry.created_at >= t)
            && self.until.is_none_or(|t| entry.created_at < t)
    }
}
