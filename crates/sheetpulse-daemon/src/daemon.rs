//! Process wiring and lifecycle.
//!
//! [`Daemon::build`] opens the database and assembles every component.
//! [`Daemon::run`] starts the scheduler and the worker pool and blocks
//! until a shutdown signal arrives.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::broadcast;
use tokio_rusqlite::Connection;
use tracing::{debug, error, info, warn};

use sheetpulse_audit::{AuditLog, SqliteAuditStore};
use sheetpulse_config::{Config, ConfigLoader};
use sheetpulse_notify::Notifier;
use sheetpulse_protocols::{JobQueue, Service};
use sheetpulse_scheduler::{ScheduleRegistry, Scheduler, SqliteScheduleStore};
use sheetpulse_vault::{CredentialResolver, CredentialVault, SqliteCredentialStore, SqliteServiceConfigStore};
use sheetpulse_workqueue::{DurableQueue, ExecutorRegistry, JobHandler, SqliteJobStore, SyncJobHandler, WorkerPool};

use crate::error::{DaemonError, DaemonState};
use crate::executor::HttpSyncExecutor;
use crate::signal::{DaemonSignal, SignalHandler};
use crate::tenant::TenantService;

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;

const IN_MEMORY_DATABASE: &str = ":memory:";

#[repr(u8)]
#[derive(Clone, Copy)]
enum StateValue {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    ShuttingDown = 3,
}

impl From<u8> for DaemonState {
    fn from(v: u8) -> Self {
        match v {
            1 => DaemonState::Starting,
            2 => DaemonState::Running,
            3 => DaemonState::ShuttingDown,
            _ => DaemonState::Stopped,
        }
    }
}

/// A fully wired sync orchestrator.
pub struct Daemon {
    state: AtomicU8,
    conn: Connection,
    queue: Arc<DurableQueue>,
    handler: Arc<SyncJobHandler>,
    pool: Arc<WorkerPool>,
    scheduler: Scheduler,
    tenants: TenantService,
    audit: AuditLog,
    shutdown_sender: broadcast::Sender<()>,
}

impl Daemon {
    /// Open the database and assemble every component.
    ///
    /// Failing to open or migrate the database is fatal.
    pub async fn build(config: Config) -> Result<Self, DaemonError> {
        let conn = open_database(&config.database.path).await?;

        let credentials = Arc::new(SqliteCredentialStore::new(conn.clone()).await.map_err(startup)?);
        let configs = Arc::new(SqliteServiceConfigStore::new(conn.clone()).await.map_err(startup)?);
        let audit_store = Arc::new(SqliteAuditStore::new(conn.clone()).await.map_err(startup)?);
        let job_store = Arc::new(SqliteJobStore::new(conn.clone()).await.map_err(startup)?);
        let schedule_store = Arc::new(SqliteScheduleStore::new(conn.clone()).await.map_err(startup)?);

        let vault = Arc::new(CredentialVault::with_iterations(
            &config.vault.salt,
            config.vault.kdf_iterations,
        ));
        let executors = Arc::new(build_executors(&config)?);
        let audit = AuditLog::new(audit_store);
        let notifier =
            Arc::new(Notifier::from_config(&config.notify).with_notify_on_success(config.notify.notify_on_success));
        let queue = Arc::new(DurableQueue::new(&config.queue, job_store));

        let resolver = Arc::new(CredentialResolver::new(configs.clone(), credentials.clone(), vault.clone()));
        let handler = Arc::new(SyncJobHandler::new(
            resolver,
            executors.clone(),
            audit.clone(),
            notifier.clone(),
        ));
        let pool = Arc::new(WorkerPool::new(config.queue.clone()));

        let scheduler = Scheduler::new(
            ScheduleRegistry::new(schedule_store),
            queue.clone(),
            audit.clone(),
            notifier,
            &config.scheduler,
        );
        let tenants = TenantService::new(vault, credentials, configs, executors, scheduler.clone(), audit.clone())
            .with_default_timezone(config.scheduler.default_timezone.clone());

        let (shutdown_sender, _) = broadcast::channel(1);
        info!("Daemon assembled (database: {})", config.database.path);

        Ok(Self {
            state: AtomicU8::new(StateValue::Stopped as u8),
            conn,
            queue,
            handler,
            pool,
            scheduler,
            tenants,
            audit,
            shutdown_sender,
        })
    }

    pub fn state(&self) -> DaemonState {
        self.state.load(Ordering::SeqCst).into()
    }

    pub fn is_running(&self) -> bool {
        self.state() == DaemonState::Running
    }

    pub fn tenant_service(&self) -> &TenantService {
        &self.tenants
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn queue(&self) -> &Arc<DurableQueue> {
        &self.queue
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn worker_pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Run until `signals` delivers a shutdown.
    ///
    /// Missed runs are enqueued before timers are armed. A reload signal
    /// re-reads the schedule registry.
    pub async fn run(&self, signals: &SignalHandler) -> Result<(), DaemonError> {
        self.transition(StateValue::Stopped, StateValue::Starting)?;
        info!("Daemon starting...");

        let mut signal_rx = signals.subscribe();

        match self.scheduler.start().await {
            Ok(recovered) if recovered > 0 => info!("Enqueued {} missed scheduled runs", recovered),
            Ok(_) => {}
            Err(e) => warn!("Scheduler started without recovering missed runs: {}", e),
        }

        let queue: Arc<dyn JobQueue> = self.queue.clone();
        let handler: Arc<dyn JobHandler> = self.handler.clone();
        let workers = tokio::spawn(
            self.pool
                .clone()
                .run_loop(queue, handler, self.shutdown_sender.subscribe()),
        );

        self.state.store(StateValue::Running as u8, Ordering::SeqCst);
        info!("Daemon running");

        if !signals.is_shutdown_requested() {
            loop {
                match signal_rx.recv().await {
                    Ok(DaemonSignal::Shutdown) => {
                        info!("Received shutdown signal");
                        break;
                    }
                    Ok(DaemonSignal::Reload) => {
                        info!("Reloading schedules");
                        if let Err(e) = self.scheduler.refresh().await {
                            warn!("Schedule reload failed: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Signal receiver lagged by {}", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }

        self.state.store(StateValue::ShuttingDown as u8, Ordering::SeqCst);
        info!("Daemon shutting down...");

        self.scheduler.shutdown().await;
        let _ = self.shutdown_sender.send(());
        if let Err(e) = workers.await {
            error!("Worker pool task failed: {}", e);
        }

        if let Err(e) = self.conn.clone().close().await {
            warn!("Failed to close database: {}", e);
        }

        self.state.store(StateValue::Stopped as u8, Ordering::SeqCst);
        info!("Daemon stopped");
        Ok(())
    }

    fn transition(&self, from: StateValue, to: StateValue) -> Result<(), DaemonError> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|current| DaemonError::InvalidStateTransition {
                from: current.into(),
                to: (to as u8).into(),
            })
    }
}

async fn open_database(path: &str) -> Result<Connection, DaemonError> {
    if path == IN_MEMORY_DATABASE {
        return Connection::open_in_memory().await.map_err(startup);
    }

    let path = ConfigLoader::expand_path(path);
    if let Some(parent) = Path::new(&path).parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DaemonError::Startup(format!("cannot create {}: {}", parent.display(), e)))?;
    }

    Connection::open(&path)
        .await
        .map_err(|e| DaemonError::Startup(format!("cannot open database {}: {}", path, e)))
}

fn build_executors(config: &Config) -> Result<ExecutorRegistry, DaemonError> {
    let mut registry = ExecutorRegistry::new();
    for (name, executor_config) in &config.executors {
        let service: Service = name
            .parse()
            .map_err(|_| DaemonError::InvalidInput(format!("unknown executor service '{}'", name)))?;
        let executor = HttpSyncExecutor::from_config(service, executor_config)?;
        debug!("Registered {} executor at {}", service, executor.endpoint());
        registry.register(Arc::new(executor));
    }
    if registry.is_empty() {
        warn!("No sync executors configured");
    }
    Ok(registry)
}

fn startup(e: impl std::fmt::Display) -> DaemonError {
    DaemonError::Startup(e.to_string())
}
