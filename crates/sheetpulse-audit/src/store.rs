//! Audit persistence.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use sheetpulse_protocols::StoreError;

use crate::entry::{AuditEntry, AuditEvent, AuditQuery};

/// Append-only audit storage.
///
/// Events handed to a store are already sanitized.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist an event and return its id.
    async fn append(&self, event: AuditEvent) -> Result<i64, StoreError>;

    /// Entries for one tenant, newest first.
    async fn query(
        &self,
        tenant_id: &str,
        filter: &AuditQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditEntry>, StoreError>;
}

/// In-memory audit store.
#[derive(Default)]
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
    unavailable: AtomicBool,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// All entries across tenants, oldest first.
    pub async fn all(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("audit store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, event: AuditEvent) -> Result<i64, StoreError> {
        self.check()?;
        let mut entries = self.entries.write().await;
        let id = entries.len() as i64 + 1;
        entries.push(AuditEntry {
            id,
            tenant_id: event.tenant_id,
            action: event.action,
            service: event.service,
            status: event.status,
            error_message: event.error_message,
            metadata: event.metadata,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn query(
        &self,
        tenant_id: &str,
        filter: &AuditQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        self.check()?;
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id && filter.matches(e))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
