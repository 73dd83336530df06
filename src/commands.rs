//! Subcommand handlers.

use std::path::Path;

use anyhow::{Context, bail};
use chrono::Utc;
use tracing::info;

use sheetpulse_audit::{AuditAction, AuditQuery};
use sheetpulse_config::{Config, ConfigValidator};
use sheetpulse_daemon::{Daemon, SignalHandler};
use sheetpulse_protocols::Service;
use sheetpulse_scheduler::{CronSpec, parse_timezone};

use crate::cli::{CredentialAction, QueueAction, ScheduleAction, ServiceAction};

pub(crate) async fn run(config: Config) -> anyhow::Result<()> {
    let daemon = Daemon::build(config).await?;
    let signals = SignalHandler::new();
    signals.setup_os_signals()?;

    info!("SheetPulse {} starting", env!("CARGO_PKG_VERSION"));
    daemon.run(&signals).await?;
    Ok(())
}

pub(crate) fn check_config(config: &Config, path: Option<&Path>) -> anyhow::Result<()> {
    let result = ConfigValidator::validate(config);
    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }
    if !result.is_valid() {
        bail!("configuration is invalid");
    }
    match path {
        Some(path) => println!("{} is valid", path.display()),
        None => println!("default configuration is valid"),
    }
    Ok(())
}

pub(crate) fn next_run(
    cron: &str,
    tz: &str,
    after: Option<chrono::DateTime<Utc>>,
    count: usize,
) -> anyhow::Result<()> {
    let spec = CronSpec::parse(cron)?;
    let zone = parse_timezone(tz)?;

    let mut cursor = after.unwrap_or_else(Utc::now);
    for _ in 0..count.max(1) {
        let Some(next) = spec.next_after(zone, cursor) else {
            bail!("'{}' has no upcoming run", cron);
        };
        println!("{}  ({})", next.to_rfc3339(), next.with_timezone(&zone).format("%Y-%m-%d %H:%M %Z"));
        cursor = next;
    }
    Ok(())
}

pub(crate) async fn credential(config: Config, action: CredentialAction) -> anyhow::Result<()> {
    let daemon = Daemon::build(config).await?;
    let tenants = daemon.tenant_service();

    match action {
        CredentialAction::Add {
            tenant,
            service,
            label,
            file,
        } => {
            let plaintext = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let credential = tenants.save_credential(&tenant, service, &label, plaintext.trim()).await?;
            println!("Saved {} credential {} for tenant {}", service, credential.id, tenant);
        }
        CredentialAction::List { tenant } => {
            let credentials = tenants.list_credentials(&tenant).await?;
            if credentials.is_empty() {
                println!("No credentials for tenant {}", tenant);
            }
            for c in credentials {
                let verified = match c.verified_at {
                    Some(at) if c.verified => format!("verified {}", at.to_rfc3339()),
                    Some(at) => format!("rejected {}", at.to_rfc3339()),
                    None => "unverified".to_string(),
                };
                println!("{}  {:<8} {:<24} {}", c.id, c.service.as_str(), c.label, verified);
            }
        }
        CredentialAction::Verify { tenant, id } => {
            if tenants.verify_credential(&tenant, &id).await? {
                println!("Credential {} verified", id);
            } else {
                bail!("credential {} was rejected by the platform", id);
            }
        }
        CredentialAction::Delete { tenant, id } => {
            tenants.delete_credential(&tenant, &id).await?;
            println!("Deleted credential {}", id);
        }
    }
    Ok(())
}

pub(crate) async fn service(config: Config, action: ServiceAction) -> anyhow::Result<()> {
    let daemon = Daemon::build(config).await?;
    let tenants = daemon.tenant_service();

    match action {
        ServiceAction::Enable { tenant, service } => {
            tenants.enable_service(&tenant, service).await?;
            println!("Enabled {} for tenant {}", service, tenant);
        }
        ServiceAction::Disable { tenant, service } => {
            tenants.disable_service(&tenant, service).await?;
            println!("Disabled {} for tenant {}", service, tenant);
        }
    }
    Ok(())
}

pub(crate) async fn schedule(config: Config, action: ScheduleAction) -> anyhow::Result<()> {
    let daemon = Daemon::build(config).await?;

    match action {
        ScheduleAction::Set {
            tenant,
            service,
            cron,
            tz,
            disabled,
        } => {
            let schedule = daemon
                .tenant_service()
                .set_schedule(&tenant, service, &cron, !disabled, tz.as_deref())
                .await?
                .context("schedule store unavailable; nothing was changed")?;
            match schedule.next_run_at {
                Some(next) => println!("Schedule {} next runs at {}", schedule.id, next.to_rfc3339()),
                None => println!("Schedule {} saved (disabled)", schedule.id),
            }
            // Timers armed above belong to this short-lived process.
            daemon.scheduler().shutdown().await;
        }
        ScheduleAction::List => {
            let schedules = daemon.scheduler().registry().list_all().await?;
            for s in schedules {
                let next = s
                    .next_run_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<12} {:<8} {:<16} {:<20} {:<8} next={}",
                    s.tenant_id,
                    s.service.as_str(),
                    s.cron_expression,
                    s.timezone,
                    if s.enabled { "enabled" } else { "disabled" },
                    next
                );
            }
        }
    }
    Ok(())
}

pub(crate) async fn queue(config: Config, action: QueueAction) -> anyhow::Result<()> {
    let daemon = Daemon::build(config).await?;
    let queue = daemon.queue();

    match action {
        QueueAction::Status => {
            let pending = queue.pending_len().await?;
            let dead = queue.dead_letters().await?.len();
            println!("pending={} dead={}", pending, dead);
        }
        QueueAction::DeadLetters { tenant } => {
            let dead: Vec<_> = queue
                .dead_letters()
                .await?
                .into_iter()
                .filter(|job| tenant.as_deref().is_none_or(|t| job.tenant_id() == t))
                .collect();
            if dead.is_empty() {
                println!("No dead-lettered jobs");
            }
            for job in dead {
                println!(
                    "{} {:<8} tenant={} attempts={} failed_at={} error={}",
                    job.id,
                    job.service.as_str(),
                    job.tenant_id(),
                    job.attempts,
                    job.updated_at.to_rfc3339(),
                    job.last_error.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

pub(crate) async fn trigger(
    config: Config,
    tenant: &str,
    service: Service,
    date: Option<chrono::NaiveDate>,
) -> anyhow::Result<()> {
    let daemon = Daemon::build(config).await?;
    match daemon.tenant_service().trigger_sync(tenant, service, date).await {
        Ok(job_id) => {
            println!("Enqueued job {}", job_id);
            Ok(())
        }
        Err(message) => bail!(message),
    }
}

pub(crate) async fn audit(
    config: Config,
    tenant: &str,
    action: Option<AuditAction>,
    service: Option<Service>,
    limit: usize,
    offset: usize,
) -> anyhow::Result<()> {
    let daemon = Daemon::build(config).await?;
    let filter = AuditQuery {
        action,
        service,
        ..Default::default()
    };

    let entries = daemon.tenant_service().audit_log(tenant, &filter, limit, offset).await?;
    if entries.is_empty() {
        println!("No audit entries for tenant {}", tenant);
    }
    for entry in entries {
        println!("{}", serde_json::to_string(&entry)?);
    }
    Ok(())
}
