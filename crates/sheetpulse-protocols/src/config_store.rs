//! Per-tenant service configuration.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::service::{Service, TenantId};

/// Links a tenant's service to the credential used to sync it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub tenant_id: TenantId,
    pub service: Service,
    pub credential_id: String,
    pub enabled: bool,
    /// Default destination (spreadsheet id, sheet name) for the executor.
    pub destination: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceConfig {
    pub fn new(tenant_id: impl Into<TenantId>, service: Service, credential_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            tenant_id: tenant_id.into(),
            service,
            credential_id: credential_id.into(),
            enabled: true,
            destination: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_destination(mut self, destination: serde_json::Value) -> Self {
        self.destination = Some(destination);
        self
    }
}

/// Service configuration store.
#[async_trait]
pub trait ServiceConfigStore: Send + Sync {
    /// Insert or replace the configuration for `(tenant, service)`.
    async fn upsert(&self, config: &ServiceConfig) -> Result<(), StoreError>;

    async fn get(&self, tenant_id: &str, service: Service) -> Result<Option<ServiceConfig>, StoreError>;

    /// Toggle the enabled flag. Returns `false` if no configuration exists.
    async fn set_enabled(&self, tenant_id: &str, service: Service, enabled: bool) -> Result<bool, StoreError>;

    /// Credential id of the enabled configuration for `(tenant, service)`.
    async fn enabled_credential(&self, tenant_id: &str, service: Service) -> Result<Option<String>, StoreError> {
        Ok(self
            .get(tenant_id, service)
            .await?
            .filter(|c| c.enabled)
            .map(|c| c.credential_id))
    }
}

/// In-memory configuration store for testing.
pub struct MemoryServiceConfigStore {
    configs: tokio::sync::RwLock<HashMap<(TenantId, Service), ServiceConfig>>,
}

impl MemoryServiceConfigStore {
    pub fn new() -> Self {
        Self {
            configs: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryServiceConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceConfigStore for MemoryServiceConfigStore {
    async fn upsert(&self, config: &ServiceConfig) -> Result<(), StoreError> {
        let mut configs = self.configs.write().await;
        configs.insert((config.tenant_id.clone(), config.service), config.clone());
        Ok(())
    }

    async fn get(&self, tenant_id: &str, service: Service) -> Result<Option<ServiceConfig>, StoreError> {
        let configs = self.configs.read().await;
        Ok(configs.get(&(tenant_id.to_string(), service)).cloned())
    }

    async fn set_enabled(&self, tenant_id: &str, service: Service, enabled: bool) -> Result<bool, StoreError> {
        let mut configs = self.configs.write().await;
        match configs.get_mut(&(tenant_id.to_string(), service)) {
            Some(config) => {
                config.enabled = enabled;
                config.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
