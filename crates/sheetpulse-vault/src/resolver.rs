//! Credential resolution for sync jobs.

use std::sync::Arc;

use tracing::debug;

use sheetpulse_protocols::{DecryptedCredential, Service, ServiceConfigStore};

use crate::cipher::CredentialVault;
use crate::error::VaultError;
use crate::store::CredentialStore;

/// Resolves `(tenant, service)` to a decrypted credential.
pub struct CredentialResolver {
    configs: Arc<dyn ServiceConfigStore>,
    credentials: Arc<dyn CredentialStore>,
    vault: Arc<CredentialVault>,
}

impl CredentialResolver {
    pub fn new(
        configs: Arc<dyn ServiceConfigStore>,
        credentials: Arc<dyn CredentialStore>,
        vault: Arc<CredentialVault>,
    ) -> Self {
        Self {
            configs,
            credentials,
            vault,
        }
    }

    /// Look up the enabled configuration, load its credential and decrypt it.
    ///
    /// The returned plaintext must not outlive the job that requested it.
    pub async fn resolve(&self, tenant_id: &str, service: Service) -> Result<DecryptedCredential, VaultError> {
        let credential_id = self
            .configs
            .enabled_credential(tenant_id, service)
            .await?
            .ok_or_else(|| VaultError::NoConfiguration {
                tenant_id: tenant_id.to_string(),
                service: service.to_string(),
            })?;

        let credential = self
            .credentials
            .get(tenant_id, &credential_id)
            .await?
            .filter(|c| c.service == service)
            .ok_or_else(|| VaultError::CredentialNotFound(credential_id.clone()))?;

        debug!(tenant_id, %service, credential_id = %credential.id, "Resolved credential");
        self.vault.decrypt(&credential.encrypted_payload, tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Credential;
    use crate::store::MemoryCredentialStore;
    use chrono::Utc;
    use sheetpulse_protocols::{MemoryServiceConfigStore, ServiceConfig};

    struct Fixture {
        configs: Arc<MemoryServiceConfigStore>,
        credentials: Arc<MemoryCredentialStore>,
        vault: Arc<CredentialVault>,
        resolver: CredentialResolver,
    }

    fn fixture() -> Fixture {
        let configs = Arc::new(MemoryServiceConfigStore::new());
        let credentials = Arc::new(MemoryCredentialStore::new());
        let vault = Arc::new(CredentialVault::new("resolver-test-salt-000"));
        let resolver = CredentialResolver::new(configs.clone(), credentials.clone(), vault.clone());
        Fixture {
            configs,
            credentials,
            vault,
            resolver,
        }
    }

    async fn seed(f: &Fixture, tenant: &str, service: Service, plaintext: &str) -> Credential {
        let blob = f.vault.encrypt(plaintext, tenant).unwrap();
        let credential = Credential::new(tenant, service, "primary", blob);
        f.credentials.insert(&credential).await.unwrap();
        f.configs
            .upsert(&ServiceConfig::new(tenant, service, credential.id.clone()))
            .await
            .unwrap();
        credential
    }

    #[tokio::test]
    async fn test_resolve_success() {
        let f = fixture();
        seed(&f, "42", Service::Meta, r#"{"access_token":"EAAB"}"#).await;

        let secret = f.resolver.resolve("42", Service::Meta).await.unwrap();
        assert_eq!(secret.expose(), r#"{"access_token":"EAAB"}"#);
    }

    #[tokio::test]
    async fn test_no_configuration() {
        let f = fixture();
        let result = f.resolver.resolve("42", Service::Meta).await;
        assert!(matches!(result, Err(VaultError::NoConfiguration { .. })));
    }

    #[tokio::test]
    async fn test_disabled_configuration() {
        let f = fixture();
        seed(&f, "42", Service::Meta, "{}").await;
        f.configs.set_enabled("42", Service::Meta, false).await.unwrap();

        let result = f.resolver.resolve("42", Service::Meta).await;
        assert!(matches!(result, Err(VaultError::NoConfiguration { .. })));
    }

    #[tokio::test]
    async fn test_soft_deleted_credential_not_found() {
        let f = fixture();
        let credential = seed(&f, "42", Service::Ga4, "{}").await;
        f.credentials
            .soft_delete("42", &credential.id, Utc::now())
            .await
            .unwrap();

        let result = f.resolver.resolve("42", Service::Ga4).await;
        assert!(matches!(result, Err(VaultError::CredentialNotFound(id)) if id == credential.id));
    }

    #[tokio::test]
    async fn test_credential_of_other_tenant_not_found() {
        let f = fixture();
        let foreign = seed(&f, "7", Service::Meta, "{}").await;
        f.configs
            .upsert(&ServiceConfig::new("42", Service::Meta, foreign.id.clone()))
            .await
            .unwrap();

        let result = f.resolver.resolve("42", Service::Meta).await;
        assert!(matches!(result, Err(VaultError::CredentialNotFound(_))));
    }

    #[tokio::test]
    async fn test_corrupt_blob_propagates_decryption_error() {
        let f = fixture();
        let credential = Credential::new("42", Service::Shopify, "broken", "garbage".to_string());
        f.credentials.insert(&credential).await.unwrap();
        f.configs
            .upsert(&ServiceConfig::new("42", Service::Shopify, credential.id.clone()))
            .await
            .unwrap();

        let result = f.resolver.resolve("42", Service::Shopify).await;
        assert!(matches!(result, Err(VaultError::Decryption(_))));
    }
}
