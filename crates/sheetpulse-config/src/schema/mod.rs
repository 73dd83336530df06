//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod schema_notify;
mod schema_runtime;

pub use schema_notify::*;
pub use schema_runtime::*;

/// Minimum PBKDF2 iteration count accepted for the credential vault.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub vault: VaultConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Sync executor endpoints keyed by service name (`meta`, `ga4`, `shopify`).
    #[serde(default)]
    pub executors: HashMap<String, ExecutorConfig>,
}

/// SQLite database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path (`~` is expanded).
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    "~/.sheetpulse/sheetpulse.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Credential vault configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Server-wide key derivation salt. Rotating it invalidates every stored credential.
    #[serde(default)]
    pub salt: String,

    /// PBKDF2 iteration count.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

fn default_kdf_iterations() -> u32 {
    MIN_KDF_ITERATIONS
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            salt: String::new(),
            kdf_iterations: default_kdf_iterations(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rolling log files.
    #[serde(default = "default_log_directory")]
    pub directory: String,

    /// Write JSON lines to the log file instead of plain text.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> String {
    "~/.sheetpulse/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
            json: false,
        }
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
