//! Status tracking for the supervised process.
//!
//! The status/message pair lives behind its own lock, separate from the log
//! buffer, so status polling never waits on log fan-out. Every write that
//! comes from a background task is scoped to the run that issued it.

use crate::error::HugoError;
use crate::hugo_status::HugoStatus;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Identifies one launch of the process. Incremented by every accepted start.
pub type RunId = u64;

#[derive(Debug, Default)]
struct StatusCell {
    status: HugoStatus,
    message: String,
    run: RunId,
}

#[derive(Debug, Default)]
pub(crate) struct StatusTracker {
    cell: RwLock<StatusCell>,
}

impl StatusTracker {
    pub(crate) fn get(&self) -> (HugoStatus, String) {
        let cell = self.read();
        (cell.status, cell.message.clone())
    }

    pub(crate) fn status(&self) -> HugoStatus {
        self.read().status
    }

    /// Move to `starting` and open a new run, unless a process is already
    /// active.
    pub(crate) fn begin_run(&self, message: &str) -> Result<RunId, HugoError> {
        let mut cell = self.write();
        if !cell.status.can_start() {
            return Err(HugoError::AlreadyRunning);
        }
        cell.run += 1;
        cell.status = HugoStatus::Starting;
        cell.message = message.to_string();
        Ok(cell.run)
    }

    pub(crate) fn set(&self, status: HugoStatus, message: impl Into<String>) {
        let mut cell = self.write();
        debug!("status: {} -> {}", cell.status.style(), status.style());
        cell.status = status;
        cell.message = message.into();
    }

    /// Set the status only if `run` is still the latest run.
    pub(crate) fn set_for_run(
        &self,
        run: RunId,
        status: HugoStatus,
        message: impl Into<String>,
    ) -> bool {
        let mut cell = self.write();
        if cell.run != run {
            return false;
        }
        debug!(
            "status (run {run}): {} -> {}",
            cell.status.style(),
            status.style()
        );
        cell.status = status;
        cell.message = message.into();
        true
    }

    /// `starting` -> `running` for the given run. Any other state wins over a
    /// promotion, so a run that already stopped or failed stays that way.
    pub(crate) fn promote(&self, run: RunId, message: impl Into<String>) -> bool {
        let mut cell = self.write();
        if cell.run != run || !cell.status.is_starting() {
            return false;
        }
        cell.status = HugoStatus::Running;
        cell.message = message.into();
        true
    }

    fn read(&self) -> RwLockReadGuard<'_, StatusCell> {
        self.cell.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StatusCell> {
        self.cell.write().unwrap_or_else(|e| e.into_inner())
    }
}
