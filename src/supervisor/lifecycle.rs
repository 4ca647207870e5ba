//! Hugo lifecycle management - start/stop/restart
//!
//! Every accepted start spawns three tasks tied to that run: a reader for
//! stdout, a reader for stderr and an exit waiter. None of them are joined;
//! each ends on its own once the process exits and its pipes close. A fourth,
//! untracked task promotes the run to `running` after the grace period if
//! nothing else has moved it on by then.

use super::state::{RunId, StatusTracker};
use super::{HugoManager, KillRequest, LoopGuard, ProcessHandle, ProcessSlot};
use crate::config::HugoConfig;
use crate::error::HugoError;
use crate::hugo_status::HugoStatus;
use crate::log_buffer::{LogBuffer, LogEntry, LogOrigin};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::time;

const SERVER_SUBCOMMAND: &str = "server";
const STARTING_MESSAGE: &str = "Starting Hugo server...";
const STOPPED_MESSAGE: &str = "Hugo server stopped";

/// Substrings of Hugo's startup banner that mean the server is accepting
/// requests.
pub const READY_MARKERS: &[&str] = &["Web Server is available", "Serving pages from"];

pub fn is_ready_signal(line: &str) -> bool {
    READY_MARKERS.iter().any(|marker| line.contains(marker))
}

/// Arguments for `hugo`: the server subcommand, the port, the optional
/// fast-render switch, then the user's extra arguments in order.
pub fn server_args(config: &HugoConfig) -> Vec<String> {
    let mut args = vec![
        SERVER_SUBCOMMAND.to_string(),
        "--port".to_string(),
        config.port.to_string(),
    ];
    if config.disable_fast_render {
        args.push("--disableFastRender".to_string());
    }
    args.extend(config.additional_args.iter().cloned());
    args
}

fn running_message(port: u16) -> String {
    format!("Running on port {port}")
}

impl HugoManager {
    /// Launch the server. Fails without side effects if it is already
    /// starting or running.
    pub async fn start(&self) -> Result<(), HugoError> {
        let _op = self.op.lock().await;
        self.start_locked()
    }

    /// Hard-kill the server. Fails without side effects if it is already
    /// stopped.
    pub async fn stop(&self) -> Result<(), HugoError> {
        let _op = self.op.lock().await;
        self.stop_locked().await
    }

    /// Stop (if needed), give the OS a moment to release the port, then start
    /// again. Reports the first failure.
    pub async fn restart(&self) -> Result<(), HugoError> {
        let _op = self.op.lock().await;
        info!("restarting hugo");
        self.logs.append(LogEntry::system("Restarting Hugo server..."));

        let stopped = if self.status.status().is_stopped() {
            Ok(())
        } else {
            self.stop_locked().await
        };
        if let Err(err) = &stopped {
            warn!("restart: stop failed: {err}");
        }

        time::sleep(self.config.restart_delay()).await;
        let started = self.start_locked();
        stopped.and(started)
    }

    fn start_locked(&self) -> Result<(), HugoError> {
        let run = self.status.begin_run(STARTING_MESSAGE)?;
        info!(
            "starting hugo (run {run}) in {}",
            self.project_dir.display()
        );
        self.logs.append(LogEntry::system(STARTING_MESSAGE));

        let args = server_args(&self.config);
        debug!(
            "spawning: {} {}",
            self.config.binary,
            shell_words::join(&args)
        );
        let mut cmd = tokio::process::Command::new(&self.config.binary);
        cmd.args(&args)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let message = format!("Failed to start Hugo: {source}");
                error!("{message}");
                self.logs.append(LogEntry::system(&message));
                self.status.set_for_run(run, HugoStatus::Error, message);
                return Err(HugoError::SpawnFailed {
                    binary: self.config.binary.clone(),
                    source,
                });
            }
        };
        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            _ => {
                let message = "Failed to start Hugo: could not capture output";
                error!("{message}");
                let _ = child.start_kill();
                self.logs.append(LogEntry::system(message));
                self.status.set_for_run(run, HugoStatus::Error, message);
                return Err(HugoError::OutputCapture);
            }
        };

        let pid = child.id();
        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        *self.lock_process() = Some(ProcessHandle { run, pid, kill_tx });
        info!("started hugo with pid {}", pid.unwrap_or_default());

        let ctx = RunContext {
            run,
            port: self.config.port,
            status: self.status.clone(),
            logs: self.logs.clone(),
            process: self.process.clone(),
        };
        tokio::spawn(
            ctx.clone()
                .stream_output(stdout, LogOrigin::Stdout, self.loops.enter()),
        );
        tokio::spawn(
            ctx.clone()
                .stream_output(stderr, LogOrigin::Stderr, self.loops.enter()),
        );
        tokio::spawn(
            ctx.clone()
                .wait_for_exit(child, kill_rx, self.loops.enter()),
        );
        tokio::spawn(ctx.promote_after(self.config.grace_period()));
        Ok(())
    }

    pub(super) async fn stop_locked(&self) -> Result<(), HugoError> {
        if self.status.status().is_stopped() {
            return Err(HugoError::NotRunning);
        }
        info!("stopping hugo");
        self.logs.append(LogEntry::system("Stopping Hugo server..."));

        // The exit waiter records the stop itself, so it lands even if this
        // future is dropped after the request is sent.
        let kill_tx = self.lock_process().as_ref().map(|h| h.kill_tx.clone());
        if let Some(kill_tx) = kill_tx {
            let (reply_tx, reply_rx) = oneshot::channel();
            if kill_tx.send(reply_tx).is_ok() {
                match reply_rx.await {
                    Ok(Ok(())) => {
                        debug!("hugo killed");
                        return Ok(());
                    }
                    Ok(Err(source)) => {
                        let message = format!("Error stopping Hugo: {source}");
                        warn!("{message}");
                        self.logs.append(LogEntry::system(message));
                        return Err(HugoError::KillFailed { source });
                    }
                    Err(_) => debug!("hugo exited before it could be killed"),
                }
            } else {
                debug!("hugo exited before it could be killed");
            }
        }

        self.status.set(HugoStatus::Stopped, "");
        self.logs.append(LogEntry::system(STOPPED_MESSAGE));
        Ok(())
    }
}

/// What a run's background tasks share with the manager.
#[derive(Clone)]
struct RunContext {
    run: RunId,
    port: u16,
    status: Arc<StatusTracker>,
    logs: Arc<LogBuffer>,
    process: ProcessSlot,
}

impl RunContext {
    async fn stream_output<R>(self, reader: R, origin: LogOrigin, _guard: LoopGuard)
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let raw = String::from_utf8_lossy(&buf);
                    let line = raw.trim_end_matches(['\n', '\r']);
                    trace!("hugo {origin}: {line}");
                    let ready = origin.is_stdout() && is_ready_signal(line);
                    self.logs.append(LogEntry::new(line, origin));
                    if ready && self.status.promote(self.run, running_message(self.port)) {
                        info!("hugo is ready on port {}", self.port);
                    }
                }
                Err(err) => {
                    warn!("failed to read hugo {origin}: {err}");
                    break;
                }
            }
        }
        debug!("hugo {origin} closed (run {})", self.run);
    }

    async fn wait_for_exit(
        self,
        mut child: Child,
        mut kill_rx: mpsc::UnboundedReceiver<KillRequest>,
        _guard: LoopGuard,
    ) {
        let exit = loop {
            tokio::select! {
                exit = child.wait() => break exit,
                Some(reply) = kill_rx.recv() => match child.start_kill() {
                    Ok(()) => {
                        let exit = child.wait().await;
                        debug!("hugo (run {}) killed: {exit:?}", self.run);
                        self.finish_kill(reply);
                        return;
                    }
                    Err(err) => {
                        warn!("failed to kill hugo (run {}): {err}", self.run);
                        let _ = reply.send(Err(err));
                    }
                },
            }
        };

        // record before releasing so no promotion can follow the exit
        self.record_exit(exit);
        self.release_process();
    }

    /// The process is gone after a requested kill: record the stop for this
    /// run, drop its handle and answer the caller if it is still waiting.
    fn finish_kill(&self, reply: KillRequest) {
        if self.status.set_for_run(self.run, HugoStatus::Stopped, "") {
            self.logs.append(LogEntry::system(STOPPED_MESSAGE));
        }
        self.release_process();
        let _ = reply.send(Ok(()));
    }

    async fn promote_after(self, grace: Duration) {
        time::sleep(grace).await;
        if self.status.promote(self.run, running_message(self.port)) {
            info!(
                "hugo assumed running after {}",
                humantime::format_duration(grace)
            );
        }
    }

    /// Take the process handle if it still belongs to this run.
    fn release_process(&self) -> Option<ProcessHandle> {
        let mut process = self.process.lock().unwrap_or_else(|e| e.into_inner());
        if process.as_ref().is_some_and(|handle| handle.run == self.run) {
            process.take()
        } else {
            None
        }
    }

    fn record_exit(&self, exit: io::Result<ExitStatus>) {
        let (status, message, narration) = match exit {
            Ok(status) if status.success() => (
                HugoStatus::Stopped,
                String::new(),
                STOPPED_MESSAGE.to_string(),
            ),
            Ok(status) => (
                HugoStatus::Error,
                status.to_string(),
                format!("Hugo exited with error: {status}"),
            ),
            Err(err) => (
                HugoStatus::Error,
                err.to_string(),
                format!("Hugo exited with error: {err}"),
            ),
        };
        info!("hugo (run {}): {narration}", self.run);
        self.logs.append(LogEntry::system(narration));
        self.status.set_for_run(self.run, status, message);
    }
}
