//! # SheetPulse Daemon
//!
//! Wires the vault, queue, scheduler, audit log and notifier into one
//! process and exposes the operations a tenant can perform.
//!
//! - Signal handling (SIGTERM/SIGINT for graceful shutdown, SIGHUP for schedule reload)
//! - HTTP adapter for out-of-process sync executors
//! - Tenant operations: credentials, service toggles, schedules, manual syncs, audit trail
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sheetpulse_daemon::{Daemon, SignalHandler};
//!
//! let daemon = Daemon::build(config).await?;
//! let signals = SignalHandler::new();
//! signals.setup_os_signals()?;
//! daemon.run(&signals).await?;
//! ```

pub mod daemon;
pub mod error;
pub mod executor;
pub mod signal;
pub mod tenant;

pub use daemon::Daemon;
pub use error::{DaemonError, DaemonState};
pub use executor::HttpSyncExecutor;
pub use signal::{DaemonSignal, SignalHandler};
pub use tenant::TenantService;
