//! Per-job execution: resolve, execute, classify, audit, notify.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use sheetpulse_audit::{AuditAction, AuditEvent, AuditLog, redact_text};
use sheetpulse_notify::Notifier;
use sheetpulse_protocols::{ExecutorError, FailureKind, SyncJob, SyncOutcome};
use sheetpulse_vault::CredentialResolver;

use crate::error::JobError;
use crate::registry::ExecutorRegistry;

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;

/// Runs one delivery of a job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &SyncJob) -> Result<SyncOutcome, JobError>;
}

/// The production [`JobHandler`].
pub struct SyncJobHandler {
    resolver: Arc<CredentialResolver>,
    executors: Arc<ExecutorRegistry>,
    audit: AuditLog,
    notifier: Arc<Notifier>,
}

impl SyncJobHandler {
    pub fn new(
        resolver: Arc<CredentialResolver>,
        executors: Arc<ExecutorRegistry>,
        audit: AuditLog,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            resolver,
            executors,
            audit,
            notifier,
        }
    }

    async fn run(&self, job: &SyncJob) -> Result<SyncOutcome, JobError> {
        let credential = self.resolver.resolve(job.tenant_id(), job.service).await?;

        let executor = self.executors.get(job.service).ok_or_else(|| JobError::ExecutorFailure {
            kind: FailureKind::Generic,
            message: format!("no executor registered for {}", job.service),
        })?;

        let started = Instant::now();
        let result = executor.execute(&credential, &job.request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        drop(credential);

        let outcome = match result {
            Ok(outcome) if outcome.success => outcome,
            Ok(outcome) => {
                let message = outcome
                    .error
                    .unwrap_or_else(|| "executor reported failure".to_string());
                return Err(executor_failure(ExecutorError::Failed(message)));
            }
            Err(e) => return Err(executor_failure(e)),
        };

        Ok(if outcome.duration_ms == 0 {
            outcome.with_duration_ms(elapsed_ms)
        } else {
            outcome
        })
    }

    async fn on_success(&self, job: &SyncJob, outcome: &SyncOutcome) {
        info!(
            "Sync {} for tenant {} completed ({}, row {:?}, {} ms)",
            job.service,
            job.tenant_id(),
            outcome.mode.as_str(),
            outcome.row_number,
            outcome.duration_ms
        );

        self.audit
            .record(
                AuditEvent::success(job.tenant_id(), AuditAction::WorkflowCompleted)
                    .with_service(job.service)
                    .with_metadata(json!({
                        "jobId": job.id.to_string(),
                        "attempt": job.attempts + 1,
                        "mode": outcome.mode.as_str(),
                        "rowNumber": outcome.row_number,
                        "durationMs": outcome.duration_ms,
                    })),
            )
            .await;

        self.notifier
            .send_sync_success(job.tenant_id(), job.service, outcome)
            .await;
    }

    async fn on_failure(&self, job: &SyncJob, err: &JobError) {
        let message = err.to_string();
        let kind = err.kind();
        warn!(
            "Sync {} for tenant {} failed (attempt {}/{}): {}",
            job.service,
            job.tenant_id(),
            job.attempts + 1,
            job.max_attempts,
            message
        );

        self.audit
            .record(
                AuditEvent::failure(job.tenant_id(), AuditAction::WorkflowFailed, message.clone())
                    .with_service(job.service)
                    .with_metadata(json!({
                        "jobId": job.id.to_string(),
                        "attempt": job.attempts + 1,
                        "kind": kind.as_str(),
                    })),
            )
            .await;

        match kind {
            FailureKind::TokenExpired => {
                self.notifier.send_token_expired(job.tenant_id(), job.service).await;
            }
            FailureKind::RateLimited => {
                self.notifier
                    .send_rate_limited(job.tenant_id(), job.service, &message)
                    .await;
            }
            FailureKind::Generic => {
                self.notifier
                    .send_sync_failure(job.tenant_id(), job.service, &message)
                    .await;
            }
        }
    }
}

fn executor_failure(err: ExecutorError) -> JobError {
    JobError::ExecutorFailure {
        kind: FailureKind::of(&err),
        message: redact_text(&err.to_string()),
    }
}

#[async_trait]
impl JobHandler for SyncJobHandler {
    async fn handle(&self, job: &SyncJob) -> Result<SyncOutcome, JobError> {
        match self.run(job).await {
            Ok(outcome) => {
                self.on_success(job, &outcome).await;
                Ok(outcome)
            }
            Err(e) => {
                self.on_failure(job, &e).await;
                Err(e)
            }
        }
    }
}
