//! Audit log facade.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::entry::{AuditEntry, AuditEvent, AuditQuery};
use crate::error::AuditError;
use crate::redact::{redact_metadata, redact_text};
use crate::store::AuditStore;

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;

/// Default page size for [`AuditLog::query`].
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Largest page a single query may return.
pub const MAX_QUERY_LIMIT: usize = 500;

/// Sanitizing front end for an [`AuditStore`].
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Redact and persist an event.
    ///
    /// Persistence failures are logged and swallowed; returns the entry id
    /// when the write succeeded.
    pub async fn record(&self, event: AuditEvent) -> Option<i64> {
        let event = sanitize(event);
        let tenant_id = event.tenant_id.clone();
        let action = event.action;

        match self.store.append(event).await {
            Ok(id) => {
                debug!("Audit {} recorded for tenant {} (id {})", action, tenant_id, id);
                Some(id)
            }
            Err(e) => {
                warn!("Failed to record audit {} for tenant {}: {}", action, tenant_id, e);
                None
            }
        }
    }

    /// Entries for one tenant, newest first.
    pub async fn query(
        &self,
        tenant_id: &str,
        filter: &AuditQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditEntry>, AuditError> {
        if tenant_id.trim().is_empty() {
            return Err(AuditError::InvalidQuery("tenant id is required".to_string()));
        }
        if limit == 0 {
            return Err(AuditError::InvalidQuery("limit must be positive".to_string()));
        }
        if let (Some(since), Some(until)) = (filter.since, filter.until) {
            if since >= until {
                return Err(AuditError::InvalidQuery(
                    "'since' must be earlier than 'until'".to_string(),
                ));
            }
        }

        let limit = limit.min(MAX_QUERY_LIMIT);
        Ok(self.store.query(tenant_id, filter, limit, offset).await?)
    }
}

fn sanitize(mut event: AuditEvent) -> AuditEvent {
    event.metadata = event.metadata.as_ref().map(redact_metadata);
    event.error_message = event.error_message.as_deref().map(redact_text);
    event
}
