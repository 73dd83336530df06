//! Daemon errors.

use sheetpulse_audit::AuditError;
use sheetpulse_config::ConfigError;
use sheetpulse_protocols::{ExecutorError, StoreError};
use sheetpulse_scheduler::SchedulerError;
use sheetpulse_vault::VaultError;
use thiserror::Error;

/// Errors raised while wiring or running the daemon, and by tenant operations.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The database could not be opened or migrated.
    #[error("Startup failed: {0}")]
    Startup(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Failed to set up signal handlers.
    #[error("Failed to set up signal handlers: {0}")]
    SignalSetup(String),

    /// Invalid daemon state transition.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: DaemonState, to: DaemonState },

    /// Rejected tenant input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle state of a [`Daemon`](crate::Daemon).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Stopped,
    Starting,
    Running,
    ShuttingDown,
}

impl std::fmt::Display for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonState::Stopped => write!(f, "stopped"),
            DaemonState::Starting => write!(f, "starting"),
            DaemonState::Running => write!(f, "running"),
            DaemonState::ShuttingDown => write!(f, "shutting_down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_error() {
        let err = DaemonError::Startup("unable to open database file".to_string());
        assert!(err.to_string().starts_with("Startup failed"));
    }

    #[test]
    fn test_daemon_state_display() {
        assert_eq!(DaemonState::Stopped.to_string(), "stopped");
        assert_eq!(DaemonState::Starting.to_string(), "starting");
        assert_eq!(DaemonState::Running.to_string(), "running");
        assert_eq!(DaemonState::ShuttingDown.to_string(), "shutting_down");
    }

    #[test]
    fn test_invalid_state_transition() {
        let err = DaemonError::InvalidStateTransition {
            from: DaemonState::Stopped,
            to: DaemonState::ShuttingDown,
        };
        let msg = err.to_string();
        assert!(msg.contains("stopped"));
        assert!(msg.contains("shutting_down"));
    }

    #[test]
    fn test_scheduler_error_is_transparent() {
        let err: DaemonError = SchedulerError::InvalidTimezone("Mars/Base".to_string()).into();
        assert_eq!(err.to_string(), "Invalid timezone: Mars/Base");
    }
}
