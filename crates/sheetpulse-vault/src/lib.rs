//! # SheetPulse Vault
//!
//! Encrypted storage of tenant credentials.
//!
//! ## Features
//!
//! - AES-256-GCM encryption with per-tenant PBKDF2 keys
//! - Credential store with soft delete (SQLite and in-memory)
//! - Service configuration store (SQLite)
//! - Credential resolution for sync jobs

pub mod cipher;
pub mod credential;
pub mod error;
pub mod resolver;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use cipher::{CredentialVault, ALGORITHM};
pub use credential::Credential;
pub use error::VaultError;
pub use resolver::CredentialResolver;
pub use sqlite::{SqliteCredentialStore, SqliteServiceConfigStore};
pub use store::{CredentialStore, MemoryCredentialStore};
