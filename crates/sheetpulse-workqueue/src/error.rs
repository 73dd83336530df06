//! Job execution errors.

use sheetpulse_protocols::{FailureKind, StoreError};
use sheetpulse_vault::VaultError;
use thiserror::Error;

/// Why a sync job failed. Messages are already redacted.
#[derive(Debug, Error)]
pub enum JobError {
    /// The tenant has no enabled configuration for the service.
    #[error("No enabled {service} configuration for tenant {tenant_id}")]
    NoConfiguration { tenant_id: String, service: String },

    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    #[error("Credential could not be decrypted")]
    Decryption,

    #[error("Executor failed ({kind}): {message}")]
    ExecutorFailure { kind: FailureKind, message: String },

    #[error("Storage unavailable: {0}")]
    Store(#[from] StoreError),
}

impl JobError {
    /// Failure classification used for alert routing.
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::ExecutorFailure { kind, .. } => *kind,
            _ => FailureKind::Generic,
        }
    }
}

impl From<VaultError> for JobError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::NoConfiguration { tenant_id, service } => {
                JobError::NoConfiguration { tenant_id, service }
            }
            VaultError::CredentialNotFound(id) => JobError::CredentialNotFound(id),
            VaultError::Store(e) => JobError::Store(e),
            VaultError::Decryption(_) | VaultError::Encryption(_) | VaultError::InvalidPayload(_) => {
                JobError::Decryption
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vault_error() {
        let err: JobError = VaultError::NoConfiguration {
            tenant_id: "42".to_string(),
            service: "meta".to_string(),
        }
        .into();
        assert!(matches!(err, JobError::NoConfiguration { .. }));
        assert_eq!(err.kind(), FailureKind::Generic);

        let err: JobError = VaultError::Decryption("tag mismatch".to_string()).into();
        assert_eq!(err.to_string(), "Credential could not be decrypted");
    }

    #[test]
    fn test_executor_failure_kind() {
        let err = JobError::ExecutorFailure {
            kind: FailureKind::RateLimited,
            message: "429".to_string(),
        };
        assert_eq!(err.kind(), FailureKind::RateLimited);
        assert_eq!(err.to_string(), "Executor failed (rate_limited): 429");
    }
}
