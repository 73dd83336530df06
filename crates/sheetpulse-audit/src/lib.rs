//! # SheetPulse Audit
//!
//! Append-only record of credential and sync lifecycle events.
//!
//! Metadata is redacted recursively before it is stored, error messages are
//! scrubbed of token-like fragments, and every query is scoped by tenant.
//! Recording never fails the caller.

pub mod entry;
pub mod error;
pub mod log;
pub mod redact;
pub mod sqlite;
pub mod store;

pub use entry::{AuditAction, AuditEntry, AuditEvent, AuditQuery, AuditStatus};
pub use error::AuditError;
pub use log::AuditLog;
pub use redact::{redact_metadata, redact_text, REDACTED};
pub use sqlite::SqliteAuditStore;
pub use store::{AuditStore, MemoryAuditStore};
