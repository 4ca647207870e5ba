#![allow(dead_code)]

use hugo_manager::config::HugoConfig;
use hugo_manager::hugo_status::HugoStatus;
use hugo_manager::log_buffer::LogOrigin;
use hugo_manager::supervisor::HugoManager;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::{Instant, sleep, timeout};

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// A throwaway Hugo site whose `hugo` is a shell script.
///
/// The manager runs `sh server --port ...` in the site directory, so the
/// script lives at `<site>/server` and sees the remaining flags as `$@`.
/// Running it through `sh` rather than executing it directly keeps freshly
/// written scripts clear of ETXTBSY when tests run in parallel.
pub struct TestSite {
    temp_dir: TempDir,
}

impl TestSite {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("hugo.toml"), "title = \"test\"\n").unwrap();
        Self { temp_dir }
    }

    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write the fake `hugo server` body. Long-running scripts should end
    /// with `exec sleep ...` so a kill doesn't leave a child holding the pipes.
    pub fn script(&self, body: &str) -> PathBuf {
        let path = self.dir().join("server");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        path
    }

    pub fn config(&self, body: &str) -> HugoConfig {
        self.script(body);
        HugoConfig {
            binary: "sh".to_string(),
            grace_period: "30s".to_string(),
            restart_delay: "10ms".to_string(),
            ..Default::default()
        }
    }

    pub fn manager(&self, body: &str) -> HugoManager {
        HugoManager::new(self.dir(), self.config(body))
    }

    pub fn manager_with(&self, body: &str, f: impl FnOnce(&mut HugoConfig)) -> HugoManager {
        let mut config = self.config(body);
        f(&mut config);
        HugoManager::new(self.dir(), config)
    }
}

/// Poll until the manager reports `want`. Returns false on timeout.
pub async fn wait_for_status(manager: &HugoManager, want: HugoStatus) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if manager.status().0 == want {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Poll until a log entry containing `needle` shows up. Returns false on timeout.
pub async fn wait_for_log(manager: &HugoManager, needle: &str) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if manager.logs(0).iter().any(|e| e.message.contains(needle)) {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

pub async fn wait_idle(manager: &HugoManager) {
    timeout(TIMEOUT, manager.wait_idle())
        .await
        .expect("background loops did not finish");
}

pub fn messages(manager: &HugoManager, origin: LogOrigin) -> Vec<String> {
    manager
        .logs(0)
        .into_iter()
        .filter(|e| e.origin == origin)
        .map(|e| e.message)
        .collect()
}

/// Whether a process with this pid still exists, as seen by `kill -0`.
pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}
