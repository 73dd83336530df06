//! CLI definitions for SheetPulse.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use sheetpulse_audit::AuditAction;
use sheetpulse_protocols::Service;

/// SheetPulse CLI.
#[derive(Parser)]
#[command(name = "sheetpulse")]
#[command(about = "Multi-tenant metrics sync orchestrator")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (defaults to ~/.sheetpulse/config.toml when present)
    #[arg(short, long, global = true, env = "SHEETPULSE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the scheduler and worker pool in the foreground (default)
    Run,

    /// Validate the configuration file and print warnings
    CheckConfig,

    /// Print the next run time of a cron expression
    NextRun {
        /// Five-field cron expression
        #[arg(long)]
        cron: String,

        /// IANA timezone the expression is evaluated in
        #[arg(long, default_value = "UTC")]
        tz: String,

        /// Compute the run strictly after this instant (RFC 3339)
        #[arg(long)]
        after: Option<DateTime<Utc>>,

        /// Number of upcoming runs to print
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },

    /// Credential management commands
    Credential {
        #[command(subcommand)]
        action: CredentialAction,
    },

    /// Enable or disable a tenant's service
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },

    /// Schedule management commands
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Inspect the sync queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Enqueue a sync immediately
    Trigger {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        service: Service,

        /// Day to sync (YYYY-MM-DD); the executor picks its default when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show a tenant's audit trail, newest first
    Audit {
        #[arg(long)]
        tenant: String,

        /// Only entries with this action (e.g. workflow_failed)
        #[arg(long)]
        action: Option<AuditAction>,

        #[arg(long)]
        service: Option<Service>,

        #[arg(short, long, default_value_t = 50)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
}

#[derive(Subcommand)]
pub(crate) enum CredentialAction {
    /// Encrypt a JSON credential file and make it the service's active credential
    Add {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        service: Service,

        #[arg(long)]
        label: String,

        /// Path to the plaintext JSON credential
        #[arg(long)]
        file: PathBuf,
    },

    /// List a tenant's credentials (never prints secrets)
    List {
        #[arg(long)]
        tenant: String,
    },

    /// Ask the executor whether the platform accepts a credential
    Verify {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        id: String,
    },

    /// Delete a credential
    Delete {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum ServiceAction {
    Enable {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        service: Service,
    },

    Disable {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        service: Service,
    },
}

#[derive(Subcommand)]
pub(crate) enum ScheduleAction {
    /// Create or update the schedule for a tenant's service
    Set {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        service: Service,

        /// Five-field cron expression
        #[arg(long)]
        cron: String,

        /// IANA timezone (defaults to scheduler.default_timezone)
        #[arg(long)]
        tz: Option<String>,

        /// Store the schedule without arming it
        #[arg(long)]
        disabled: bool,
    },

    /// List every schedule
    List,
}

#[derive(Subcommand)]
pub(crate) enum QueueAction {
    /// Print pending and dead-lettered job counts
    Status,

    /// List jobs whose attempts are exhausted
    DeadLetters {
        /// Only jobs for this tenant
        #[arg(long)]
        tenant: Option<String>,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
