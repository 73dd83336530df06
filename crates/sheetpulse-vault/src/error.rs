//! Vault errors.

use sheetpulse_protocols::StoreError;
use thiserror::Error;

/// Vault error types.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Tampered data, wrong tenant, or corrupted blob.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Plaintext submitted for encryption is not valid JSON.
    #[error("Invalid credential payload: {0}")]
    InvalidPayload(String),

    /// The tenant has no enabled configuration for the service.
    #[error("No enabled {service} configuration for tenant {tenant_id}")]
    NoConfiguration { tenant_id: String, service: String },

    /// Missing or soft-deleted credential.
    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decryption_display() {
        let err = VaultError::Decryption("authentication tag mismatch".to_string());
        assert!(err.to_string().starts_with("Decryption failed"));
    }

    #[test]
    fn test_no_configuration_display() {
        let err = VaultError::NoConfiguration {
            tenant_id: "42".to_string(),
            service: "meta".to_string(),
        };
        assert_eq!(err.to_string(), "No enabled meta configuration for tenant 42");
    }

    #[test]
    fn test_store_from() {
        let err: VaultError = StoreError::Unavailable("gone".to_string()).into();
        assert!(matches!(err, VaultError::Store(_)));
    }
}
