//! # SheetPulse Protocols
//!
//! Types and traits shared by every SheetPulse crate.
//! Contains no scheduling or queue logic of its own.
//!
//! ## Core Traits
//!
//! - [`SyncExecutor`] - Platform-specific sync implementation (external collaborator)
//! - [`JobQueue`] - Durable queue of sync jobs
//! - [`ServiceConfigStore`] - Per-tenant service configuration lookups

pub mod error;
pub mod service;
pub mod job;
pub mod executor;
pub mod queue;
pub mod config_store;
pub mod secret;
pub mod sql;

pub use service::{Service, TenantId, UnknownService};
pub use job::{JobStatus, SyncJob, SyncRequest};
pub use executor::{FailureKind, SyncExecutor, SyncOutcome, WriteMode};
pub use queue::{JobQueue, RetryDecision};
pub use config_store::{MemoryServiceConfigStore, ServiceConfig, ServiceConfigStore};
pub use secret::DecryptedCredential;
pub use error::{ExecutorError, QueueError, StoreError};
