//! Audit errors.

use sheetpulse_protocols::StoreError;
use thiserror::Error;

/// Audit error types.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid audit query: {0}")]
    InvalidQuery(String),
}
