//! Process signal handling.
//!
//! SIGTERM and SIGINT stop the daemon; SIGHUP re-reads the schedule
//! registry without restarting timers that did not change.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::DaemonError;

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;

/// Lifecycle signal delivered to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonSignal {
    Shutdown,
    Reload,
}

impl DaemonSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonSignal::Shutdown => "shutdown",
            DaemonSignal::Reload => "reload",
        }
    }
}

impl std::fmt::Display for DaemonSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broadcasts lifecycle signals to the daemon loop and anyone else listening.
///
/// Shutdown is sticky: a listener that subscribes after it was requested can
/// still observe it through [`is_shutdown_requested`](Self::is_shutdown_requested).
#[derive(Clone)]
pub struct SignalHandler {
    tx: broadcast::Sender<DaemonSignal>,
    stopping: Arc<AtomicBool>,
}

impl SignalHandler {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(8);
        Self {
            tx,
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonSignal> {
        self.tx.subscribe()
    }

    pub fn send(&self, signal: DaemonSignal) {
        if signal == DaemonSignal::Shutdown {
            self.stopping.store(true, Ordering::SeqCst);
        }
        // No receivers just means the daemon loop has not started yet.
        if self.tx.send(signal).is_err() {
            debug!("No listeners for {} signal", signal);
        }
    }

    pub fn request_shutdown(&self) {
        self.send(DaemonSignal::Shutdown);
    }

    pub fn request_reload(&self) {
        self.send(DaemonSignal::Reload);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested.
    pub async fn shutdown_requested(&self) {
        let mut rx = self.subscribe();
        while !self.is_shutdown_requested() {
            match rx.recv().await {
                Ok(DaemonSignal::Shutdown) | Err(broadcast::error::RecvError::Closed) => return,
                Ok(DaemonSignal::Reload) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            }
        }
    }

    /// Forward SIGTERM, SIGINT and SIGHUP into this handler.
    #[cfg(unix)]
    pub fn setup_os_signals(&self) -> Result<(), DaemonError> {
        use tokio::signal::unix::{SignalKind, signal};

        let install = |kind: SignalKind| signal(kind).map_err(|e| DaemonError::SignalSetup(e.to_string()));
        let mut sigterm = install(SignalKind::terminate())?;
        let mut sigint = install(SignalKind::interrupt())?;
        let mut sighup = install(SignalKind::hangup())?;

        let handler = self.clone();
        tokio::spawn(async move {
            loop {
                let (name, signal) = tokio::select! {
                    Some(()) = sigterm.recv() => ("SIGTERM", DaemonSignal::Shutdown),
                    Some(()) = sigint.recv() => ("SIGINT", DaemonSignal::Shutdown),
                    Some(()) = sighup.recv() => ("SIGHUP", DaemonSignal::Reload),
                    else => break,
                };
                info!("Received {}", name);
                handler.send(signal);
            }
        });

        debug!("Installed SIGTERM, SIGINT and SIGHUP handlers");
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn setup_os_signals(&self) -> Result<(), DaemonError> {
        let handler = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C");
                handler.request_shutdown();
            }
        });

        debug!("Installed Ctrl+C handler");
        Ok(())
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
