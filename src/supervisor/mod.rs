//! Supervisor for the `hugo server` process.
//!
//! This module is split into focused submodules:
//! - `state`: status tracking (status/message pair and run scoping)
//! - `lifecycle`: start/stop/restart and the per-run background tasks
//!
//! One [`HugoManager`] is constructed at startup and shared (behind an `Arc`)
//! with everything that needs it. It owns at most one live process at a time.

mod lifecycle;
mod state;

pub use lifecycle::{READY_MARKERS, is_ready_signal, server_args};
pub use state::RunId;

use crate::config::HugoConfig;
use crate::hugo_status::HugoStatus;
use crate::log_buffer::{LogBuffer, LogEntry, LogSubscription, SubscriptionId};
use state::StatusTracker;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot, watch};

/// Sent to a run's exit waiter to request a hard kill. The waiter records the
/// stop and answers once the process has been killed and reaped, or answers
/// with the error if the kill could not be sent.
type KillRequest = oneshot::Sender<io::Result<()>>;

/// The live OS process for one run. Only the supervisor touches it.
#[derive(Debug)]
pub(crate) struct ProcessHandle {
    run: RunId,
    pid: Option<u32>,
    /// Stays usable after a failed kill so `stop` can be retried.
    kill_tx: mpsc::UnboundedSender<KillRequest>,
}

type ProcessSlot = Arc<Mutex<Option<ProcessHandle>>>;

pub struct HugoManager {
    project_dir: PathBuf,
    config: HugoConfig,
    status: Arc<StatusTracker>,
    logs: Arc<LogBuffer>,
    process: ProcessSlot,
    loops: Arc<ActiveLoops>,
    /// Serializes start/stop/restart.
    op: tokio::sync::Mutex<()>,
}

impl HugoManager {
    pub fn new(project_dir: impl Into<PathBuf>, config: HugoConfig) -> Self {
        let logs = LogBuffer::new(config.log_capacity, config.subscriber_capacity);
        Self {
            project_dir: project_dir.into(),
            config,
            status: Arc::new(StatusTracker::default()),
            logs: Arc::new(logs),
            process: Arc::new(Mutex::new(None)),
            loops: Arc::new(ActiveLoops::new()),
            op: tokio::sync::Mutex::new(()),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn config(&self) -> &HugoConfig {
        &self.config
    }

    /// Port the Hugo server is told to listen on.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn status(&self) -> (HugoStatus, String) {
        self.status.get()
    }

    /// Up to `limit` most recent log entries, oldest first (0 = all).
    pub fn logs(&self, limit: usize) -> Vec<LogEntry> {
        self.logs.snapshot(limit)
    }

    pub fn subscribe(&self) -> LogSubscription {
        self.logs.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.logs.unsubscribe(id)
    }

    /// PID of the current process, if one is alive.
    pub fn pid(&self) -> Option<u32> {
        self.lock_process().as_ref().and_then(|handle| handle.pid)
    }

    /// Number of output readers and exit waiters still running.
    pub fn active_loops(&self) -> usize {
        self.loops.active()
    }

    /// Resolves once every output reader and exit waiter has finished.
    pub async fn wait_idle(&self) {
        self.loops.wait_idle().await
    }

    /// Kill the process if one is live and close every log subscription.
    pub async fn shutdown(&self) {
        let _op = self.op.lock().await;
        if !self.status.status().is_stopped()
            && let Err(err) = self.stop_locked().await
        {
            error!("failed to stop hugo during shutdown: {err}");
        }
        self.logs.close_subscribers();
    }

    fn lock_process(&self) -> MutexGuard<'_, Option<ProcessHandle>> {
        self.process.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Counts the background loops of all runs so callers can await quiescence.
#[derive(Debug)]
pub(crate) struct ActiveLoops {
    count: watch::Sender<usize>,
}

impl ActiveLoops {
    fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self { count }
    }

    fn enter(self: &Arc<Self>) -> LoopGuard {
        self.count.send_modify(|n| *n += 1);
        LoopGuard {
            loops: Arc::clone(self),
        }
    }

    fn active(&self) -> usize {
        *self.count.borrow()
    }

    async fn wait_idle(&self) {
        let mut rx = self.count.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// Held by a background loop for its whole lifetime.
#[derive(Debug)]
pub(crate) struct LoopGuard {
    loops: Arc<ActiveLoops>,
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.loops.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}
