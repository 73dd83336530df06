//! Credential record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sheetpulse_protocols::{Service, TenantId};

/// A tenant's stored credential for one service.
///
/// `encrypted_payload` is an opaque blob produced by
/// [`CredentialVault::encrypt`](crate::CredentialVault::encrypt).
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub tenant_id: TenantId,
    pub service: Service,
    pub label: String,
    pub encrypted_payload: String,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    /// Create a new, unverified credential.
    pub fn new(
        tenant_id: impl Into<TenantId>,
        service: Service,
        label: impl Into<String>,
        encrypted_payload: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            service,
            label: label.into(),
            encrypted_payload,
            verified: false,
            verified_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("service", &self.service)
            .field("label", &self.label)
            .field("verified", &self.verified)
            .field("deleted_at", &self.deleted_at)
            .finish_non_exhaustive()
    }
}
