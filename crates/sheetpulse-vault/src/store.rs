//! Credential persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use sheetpulse_protocols::StoreError;

use crate::credential::Credential;

/// Credential store trait. Every lookup is scoped by tenant.
///
/// Soft-deleted credentials are never returned.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert(&self, credential: &Credential) -> Result<(), StoreError>;

    async fn get(&self, tenant_id: &str, id: &str) -> Result<Option<Credential>, StoreError>;

    /// Replace label and encrypted payload; resets verification.
    async fn update_payload(
        &self,
        tenant_id: &str,
        id: &str,
        label: &str,
        encrypted_payload: &str,
    ) -> Result<bool, StoreError>;

    async fn mark_verified(
        &self,
        tenant_id: &str,
        id: &str,
        verified: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn soft_delete(&self, tenant_id: &str, id: &str, at: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<Credential>, StoreError>;
}

/// In-memory credential store for testing.
pub struct MemoryCredentialStore {
    credentials: RwLock<HashMap<String, Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            credentials: RwLock::new(HashMap::new()),
        }
    }

    /// Number of rows including soft-deleted ones.
    pub async fn raw_len(&self) -> usize {
        self.credentials.read().await.len()
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

fn live<'a>(
    map: &'a mut HashMap<String, Credential>,
    tenant_id: &str,
    id: &str,
) -> Option<&'a mut Credential> {
    map.get_mut(id)
        .filter(|c| c.tenant_id == tenant_id && !c.is_deleted())
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert(&self, credential: &Credential) -> Result<(), StoreError> {
        let mut credentials = self.credentials.write().await;
        if credentials.contains_key(&credential.id) {
            return Err(StoreError::Conflict(credential.id.clone()));
        }
        credentials.insert(credential.id.clone(), credential.clone());
        Ok(())
    }

    async fn get(&self, tenant_id: &str, id: &str) -> Result<Option<Credential>, StoreError> {
        let credentials = self.credentials.read().await;
        Ok(credentials
            .get(id)
            .filter(|c| c.tenant_id == tenant_id && !c.is_deleted())
            .cloned())
    }

    async fn update_payload(
        &self,
        tenant_id: &str,
        id: &str,
        label: &str,
        encrypted_payload: &str,
    ) -> Result<bool, StoreError> {
        let mut credentials = self.credentials.write().await;
        Ok(match live(&mut credentials, tenant_id, id) {
            Some(c) => {
                c.label = label.to_string();
                c.encrypted_payload = encrypted_payload.to_string();
                c.verified = false;
                c.verified_at = None;
                c.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn mark_verified(
        &self,
        tenant_id: &str,
        id: &str,
        verified: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut credentials = self.credentials.write().await;
        Ok(match live(&mut credentials, tenant_id, id) {
            Some(c) => {
                c.verified = verified;
                c.verified_at = Some(at);
                c.updated_at = at;
                true
            }
            None => false,
        })
    }

    async fn soft_delete(&self, tenant_id: &str, id: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut credentials = self.credentials.write().await;
        Ok(match live(&mut credentials, tenant_id, id) {
            Some(c) => {
                c.deleted_at = Some(at);
                c.updated_at = at;
                true
            }
            None => false,
        })
    }

    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<Credential>, StoreError> {
        let credentials = self.credentials.read().await;
        let mut list: Vec<Credential> = credentials
            .values()
            .filter(|c| c.tenant_id == tenant_id && !c.is_deleted())
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(list)
    }
}
