//! Tenant-facing operations.
//!
//! Every mutation is audited. Schedule changes re-sync the scheduler's
//! timers before returning.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use sheetpulse_audit::{AuditAction, AuditEntry, AuditEvent, AuditLog, AuditQuery, redact_text};
use sheetpulse_protocols::{Service, ServiceConfig, ServiceConfigStore, SyncRequest};
use sheetpulse_scheduler::{Schedule, ScheduleKey, Scheduler};
use sheetpulse_vault::{Credential, CredentialStore, CredentialVault, VaultError};
use sheetpulse_workqueue::ExecutorRegistry;

use crate::error::DaemonError;

#[cfg(test)]
#[path = "tenant_tests.rs"]
mod tests;

/// Entry point for everything a tenant can change.
#[derive(Clone)]
pub struct TenantService {
    vault: Arc<CredentialVault>,
    credentials: Arc<dyn CredentialStore>,
    configs: Arc<dyn ServiceConfigStore>,
    executors: Arc<ExecutorRegistry>,
    scheduler: Scheduler,
    audit: AuditLog,
    default_timezone: String,
}

impl TenantService {
    pub fn new(
        vault: Arc<CredentialVault>,
        credentials: Arc<dyn CredentialStore>,
        configs: Arc<dyn ServiceConfigStore>,
        executors: Arc<ExecutorRegistry>,
        scheduler: Scheduler,
        audit: AuditLog,
    ) -> Self {
        Self {
            vault,
            credentials,
            configs,
            executors,
            scheduler,
            audit,
            default_timezone: "UTC".to_string(),
        }
    }

    /// Timezone for schedules created without one.
    pub fn with_default_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.default_timezone = timezone.into();
        self
    }

    /// Encrypt and store a credential, and point the service configuration at it.
    ///
    /// Replacing the credential of an already configured service keeps the
    /// configuration's enabled flag and destination.
    pub async fn save_credential(
        &self,
        tenant_id: &str,
        service: Service,
        label: &str,
        plaintext_json: &str,
    ) -> Result<Credential, DaemonError> {
        let blob = self.vault.encrypt(plaintext_json, tenant_id)?;
        let credential = Credential::new(tenant_id, service, label, blob);
        self.credentials.insert(&credential).await?;

        let previous = self.configs.get(tenant_id, service).await?;
        let action = if previous.is_some() {
            AuditAction::CredentialUpdated
        } else {
            AuditAction::CredentialSaved
        };

        let mut config = ServiceConfig::new(tenant_id, service, credential.id.clone());
        if let Some(previous) = &previous {
            config.enabled = previous.enabled;
            config.destination = previous.destination.clone();
            config.created_at = previous.created_at;
        }
        self.configs.upsert(&config).await?;

        info!("Saved {} credential {} for tenant {}", service, credential.id, tenant_id);
        self.audit
            .record(
                AuditEvent::success(tenant_id, action)
                    .with_service(service)
                    .with_metadata(json!({
                        "credentialId": credential.id,
                        "label": label,
                        "replaced": previous.map(|p| p.credential_id),
                    })),
            )
            .await;

        Ok(credential)
    }

    /// Replace the label and payload of an existing credential.
    pub async fn update_credential(
        &self,
        tenant_id: &str,
        credential_id: &str,
        label: &str,
        plaintext_json: &str,
    ) -> Result<(), DaemonError> {
        let credential = self.credential(tenant_id, credential_id).await?;
        let blob = self.vault.encrypt(plaintext_json, tenant_id)?;
        if !self
            .credentials
            .update_payload(tenant_id, credential_id, label, &blob)
            .await?
        {
            return Err(DaemonError::CredentialNotFound(credential_id.to_string()));
        }

        self.audit
            .record(
                AuditEvent::success(tenant_id, AuditAction::CredentialUpdated)
                    .with_service(credential.service)
                    .with_metadata(json!({ "credentialId": credential_id, "label": label })),
            )
            .await;
        Ok(())
    }

    /// Ask the service's executor whether the platform accepts the credential.
    ///
    /// Returns the verification result; a rejected credential is not an error.
    pub async fn verify_credential(&self, tenant_id: &str, credential_id: &str) -> Result<bool, DaemonError> {
        let credential = self.credential(tenant_id, credential_id).await?;
        let executor = self.executors.get(credential.service).ok_or_else(|| {
            DaemonError::InvalidInput(format!("no executor configured for {}", credential.service))
        })?;

        let outcome = match self.vault.decrypt(&credential.encrypted_payload, tenant_id) {
            Ok(plaintext) => executor.verify(&plaintext).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let now = Utc::now();
        let verified = outcome.is_ok();
        if let Err(e) = self
            .credentials
            .mark_verified(tenant_id, credential_id, verified, now)
            .await
        {
            warn!("Failed to record verification of credential {}: {}", credential_id, e);
        }

        let event = match outcome {
            Ok(()) => AuditEvent::success(tenant_id, AuditAction::CredentialVerified),
            Err(message) => {
                info!("Credential {} for tenant {} failed verification", credential_id, tenant_id);
                AuditEvent::failure(tenant_id, AuditAction::VerificationFailed, message)
            }
        };
        self.audit
            .record(
                event
                    .with_service(credential.service)
                    .with_metadata(json!({ "credentialId": credential_id })),
            )
            .await;

        Ok(verified)
    }

    /// Soft-delete a credential. It stops resolving immediately.
    pub async fn delete_credential(&self, tenant_id: &str, credential_id: &str) -> Result<(), DaemonError> {
        let credential = self.credential(tenant_id, credential_id).await?;
        if !self
            .credentials
            .soft_delete(tenant_id, credential_id, Utc::now())
            .await?
        {
            return Err(DaemonError::CredentialNotFound(credential_id.to_string()));
        }

        info!("Deleted credential {} for tenant {}", credential_id, tenant_id);
        self.audit
            .record(
                AuditEvent::success(tenant_id, AuditAction::CredentialDeleted)
                    .with_service(credential.service)
                    .with_metadata(json!({ "credentialId": credential_id })),
            )
            .await;
        Ok(())
    }

    pub async fn list_credentials(&self, tenant_id: &str) -> Result<Vec<Credential>, DaemonError> {
        Ok(self.credentials.list_for_tenant(tenant_id).await?)
    }

    pub async fn enable_service(&self, tenant_id: &str, service: Service) -> Result<(), DaemonError> {
        self.set_service_enabled(tenant_id, service, true).await
    }

    pub async fn disable_service(&self, tenant_id: &str, service: Service) -> Result<(), DaemonError> {
        self.set_service_enabled(tenant_id, service, false).await
    }

    async fn set_service_enabled(&self, tenant_id: &str, service: Service, enabled: bool) -> Result<(), DaemonError> {
        if !self.configs.set_enabled(tenant_id, service, enabled).await? {
            return Err(VaultError::NoConfiguration {
                tenant_id: tenant_id.to_string(),
                service: service.to_string(),
            }
            .into());
        }

        let action = if enabled {
            AuditAction::ServiceEnabled
        } else {
            AuditAction::ServiceDisabled
        };
        self.audit
            .record(AuditEvent::success(tenant_id, action).with_service(service))
            .await;
        Ok(())
    }

    pub async fn create_schedule(
        &self,
        tenant_id: &str,
        service: Service,
        cron_expression: &str,
        enabled: bool,
        timezone: Option<&str>,
    ) -> Result<Schedule, DaemonError> {
        let timezone = timezone.unwrap_or(self.default_timezone.as_str());
        let schedule = self
            .scheduler
            .registry()
            .create(tenant_id, service, cron_expression, enabled, timezone)
            .await?;
        self.refresh_timers().await;
        Ok(schedule)
    }

    /// Change a schedule. `Ok(None)` means the store was unavailable and
    /// nothing changed.
    pub async fn update_schedule(
        &self,
        schedule_id: &str,
        tenant_id: &str,
        cron_expression: &str,
        enabled: bool,
        timezone: Option<&str>,
    ) -> Result<Option<Schedule>, DaemonError> {
        let timezone = timezone.unwrap_or(self.default_timezone.as_str());
        let schedule = self
            .scheduler
            .registry()
            .update(schedule_id, tenant_id, cron_expression, enabled, timezone)
            .await?;
        if schedule.is_some() {
            self.refresh_timers().await;
        }
        Ok(schedule)
    }

    /// Create the schedule for `(tenant, service)` or update the existing one.
    pub async fn set_schedule(
        &self,
        tenant_id: &str,
        service: Service,
        cron_expression: &str,
        enabled: bool,
        timezone: Option<&str>,
    ) -> Result<Option<Schedule>, DaemonError> {
        let key = ScheduleKey::new(tenant_id, service);
        match self.scheduler.registry().get(&key).await? {
            Some(existing) => {
                let timezone = timezone.unwrap_or(existing.timezone.as_str()).to_string();
                self.update_schedule(&existing.id, tenant_id, cron_expression, enabled, Some(&timezone))
                    .await
            }
            None => self
                .create_schedule(tenant_id, service, cron_expression, enabled, timezone)
                .await
                .map(Some),
        }
    }

    /// Enqueue a sync now.
    ///
    /// Failures come back as a redacted message suitable for the tenant.
    pub async fn trigger_sync(
        &self,
        tenant_id: &str,
        service: Service,
        target_date: Option<NaiveDate>,
    ) -> Result<Uuid, String> {
        let mut request = SyncRequest::new(tenant_id);
        if let Some(date) = target_date {
            request = request.with_target_date(date);
        }

        match self.scheduler.trigger_now_with(service, request).await {
            Ok(job_id) => {
                self.audit
                    .record(
                        AuditEvent::success(tenant_id, AuditAction::WorkflowRun)
                            .with_service(service)
                            .with_metadata(json!({
                                "jobId": job_id.to_string(),
                                "manual": true,
                                "targetDate": target_date,
                            })),
                    )
                    .await;
                Ok(job_id)
            }
            Err(e) => {
                let message = redact_text(&e.to_string());
                warn!("Manual {} sync for tenant {} failed: {}", service, tenant_id, message);
                self.audit
                    .record(
                        AuditEvent::failure(tenant_id, AuditAction::WorkflowRun, message.clone())
                            .with_service(service)
                            .with_metadata(json!({ "manual": true })),
                    )
                    .await;
                Err(message)
            }
        }
    }

    /// The tenant's audit trail, newest first.
    pub async fn audit_log(
        &self,
        tenant_id: &str,
        filter: &AuditQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditEntry>, DaemonError> {
        Ok(self.audit.query(tenant_id, filter, limit, offset).await?)
    }

    async fn credential(&self, tenant_id: &str, credential_id: &str) -> Result<Credential, DaemonError> {
        self.credentials
            .get(tenant_id, credential_id)
            .await?
            .ok_or_else(|| DaemonError::CredentialNotFound(credential_id.to_string()))
    }

    async fn refresh_timers(&self) {
        if let Err(e) = self.scheduler.refresh().await {
            warn!("Schedule saved but timers not refreshed: {}", e);
        }
    }
}
