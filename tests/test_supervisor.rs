#![cfg(unix)]

mod common;

use common::*;
use hugo_manager::error::HugoError;
use hugo_manager::hugo_status::HugoStatus;
use hugo_manager::log_buffer::LogOrigin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

#[tokio::test]
async fn test_clean_exit_captures_both_streams() {
    let site = TestSite::new();
    let manager = site.manager(
        r#"for i in 1 2 3 4 5; do echo "out $i"; done
for i in 1 2 3; do echo "err $i" >&2; done
exit 0"#,
    );

    manager.start().await.unwrap();
    wait_idle(&manager).await;

    assert_eq!(manager.status(), (HugoStatus::Stopped, String::new()));
    assert_eq!(manager.pid(), None);
    assert_eq!(
        messages(&manager, LogOrigin::Stdout),
        vec!["out 1", "out 2", "out 3", "out 4", "out 5"]
    );
    assert_eq!(
        messages(&manager, LogOrigin::Stderr),
        vec!["err 1", "err 2", "err 3"]
    );

    let system = messages(&manager, LogOrigin::System);
    assert_eq!(system.first().map(String::as_str), Some("Starting Hugo server..."));
    assert!(system.iter().any(|m| m == "Hugo server stopped"));
}

#[tokio::test]
async fn test_abnormal_exit_sets_error() {
    let site = TestSite::new();
    let manager = site.manager("echo 'Error: config not found' >&2\nexit 3");

    manager.start().await.unwrap();
    wait_idle(&manager).await;

    let (status, message) = manager.status();
    assert_eq!(status, HugoStatus::Error);
    assert!(message.contains('3'), "unexpected message: {message}");
    assert!(
        messages(&manager, LogOrigin::System)
            .iter()
            .any(|m| m.starts_with("Hugo exited with error:"))
    );
    assert_eq!(
        messages(&manager, LogOrigin::Stderr),
        vec!["Error: config not found"]
    );
}

#[tokio::test]
async fn test_missing_binary_fails_start() {
    let site = TestSite::new();
    let missing = site.dir().join("bin").join("hugo");
    let manager = site.manager_with("exit 0", |c| {
        c.binary = missing.display().to_string();
    });

    let err = manager.start().await.unwrap_err();
    assert!(matches!(err, HugoError::SpawnFailed { .. }));

    let (status, message) = manager.status();
    assert_eq!(status, HugoStatus::Error);
    assert!(message.starts_with("Failed to start Hugo:"));
    assert_eq!(manager.active_loops(), 0);

    // error allows another attempt, which fails the same way
    assert!(matches!(
        manager.start().await,
        Err(HugoError::SpawnFailed { .. })
    ));
}

#[tokio::test]
async fn test_ready_banner_promotes_to_running() {
    let site = TestSite::new();
    let manager = site.manager_with(
        r#"echo "Start building sites …"
echo "Web Server is available at http://localhost:$2/ (bind address 0.0.0.0)"
exec sleep 30"#,
        |c| c.port = 14313,
    );

    manager.start().await.unwrap();
    assert!(wait_for_status(&manager, HugoStatus::Running).await);
    assert_eq!(manager.status().1, "Running on port 14313");
    assert!(manager.pid().is_some());
    assert!(wait_for_log(&manager, "http://localhost:14313/").await);

    manager.stop().await.unwrap();
    assert_eq!(manager.status(), (HugoStatus::Stopped, String::new()));
    assert_eq!(manager.pid(), None);
    wait_idle(&manager).await;
}

#[tokio::test]
async fn test_ready_banner_on_stderr_is_ignored() {
    let site = TestSite::new();
    let manager = site.manager("echo 'Web Server is available' >&2\nexec sleep 30");

    manager.start().await.unwrap();
    assert!(wait_for_log(&manager, "Web Server is available").await);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(manager.status().0, HugoStatus::Starting);

    manager.stop().await.unwrap();
    wait_idle(&manager).await;
}

#[tokio::test]
async fn test_grace_period_promotes_silent_server() {
    let site = TestSite::new();
    let manager = site.manager_with("exec sleep 30", |c| {
        c.grace_period = "200ms".to_string();
    });

    manager.start().await.unwrap();
    assert_eq!(manager.status().0, HugoStatus::Starting);
    assert!(wait_for_status(&manager, HugoStatus::Running).await);
    assert_eq!(manager.status().1, "Running on port 1313");

    manager.stop().await.unwrap();
    wait_idle(&manager).await;
}

#[tokio::test]
async fn test_crash_within_grace_period_stays_error() {
    let site = TestSite::new();
    let manager = site.manager_with("exit 1", |c| {
        c.grace_period = "300ms".to_string();
    });

    manager.start().await.unwrap();
    wait_idle(&manager).await;
    assert_eq!(manager.status().0, HugoStatus::Error);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(manager.status().0, HugoStatus::Error);
}

#[tokio::test]
async fn test_start_rejected_while_active() {
    let site = TestSite::new();
    let manager = site.manager("exec sleep 30");

    manager.start().await.unwrap();
    let before = manager.status();
    let pid = manager.pid();

    assert!(matches!(
        manager.start().await,
        Err(HugoError::AlreadyRunning)
    ));
    assert_eq!(manager.status(), before);
    assert_eq!(manager.pid(), pid);
    let starts = messages(&manager, LogOrigin::System)
        .into_iter()
        .filter(|m| m == "Starting Hugo server...")
        .count();
    assert_eq!(starts, 1);

    manager.stop().await.unwrap();
    wait_idle(&manager).await;
}

#[tokio::test]
async fn test_stop_when_stopped_is_rejected() {
    let site = TestSite::new();
    let manager = site.manager("exit 0");

    assert!(matches!(manager.stop().await, Err(HugoError::NotRunning)));
    assert!(manager.logs(0).is_empty());
    assert_eq!(manager.status().0, HugoStatus::Stopped);
}

#[tokio::test]
async fn test_stop_from_error_clears_it() {
    let site = TestSite::new();
    let manager = site.manager("exit 2");

    manager.start().await.unwrap();
    wait_idle(&manager).await;
    assert_eq!(manager.status().0, HugoStatus::Error);

    manager.stop().await.unwrap();
    assert_eq!(manager.status(), (HugoStatus::Stopped, String::new()));
}

#[tokio::test]
async fn test_stop_narrates_and_reaps() {
    let site = TestSite::new();
    let manager = site.manager("echo booted\nexec sleep 30");

    manager.start().await.unwrap();
    assert!(wait_for_log(&manager, "booted").await);
    assert!(manager.active_loops() > 0);

    manager.stop().await.unwrap();
    wait_idle(&manager).await;
    assert_eq!(manager.active_loops(), 0);

    let system = messages(&manager, LogOrigin::System);
    let stopping = system.iter().position(|m| m == "Stopping Hugo server...");
    let stopped = system.iter().position(|m| m == "Hugo server stopped");
    assert!(stopping.is_some());
    assert!(stopped > stopping);
    assert!(!system.iter().any(|m| m.starts_with("Hugo exited with error")));
    assert_eq!(manager.status().0, HugoStatus::Stopped);
}

#[tokio::test]
async fn test_abandoned_stop_still_records_stopped() {
    let site = TestSite::new();
    let manager = site.manager_with("exec sleep 30", |c| {
        c.grace_period = "300ms".to_string();
    });

    manager.start().await.unwrap();
    let pid = manager.pid().unwrap();

    // poll stop once, far enough to request the kill, then drop it
    tokio::select! {
        biased;
        _ = manager.stop() => panic!("stop finished without waiting for the kill"),
        _ = std::future::ready(()) => {}
    }
    assert!(
        messages(&manager, LogOrigin::System)
            .iter()
            .any(|m| m == "Stopping Hugo server...")
    );

    wait_idle(&manager).await;
    assert!(!process_alive(pid));
    assert_eq!(manager.pid(), None);
    assert_eq!(manager.status(), (HugoStatus::Stopped, String::new()));

    // the grace timer must not revive the dead run
    sleep(Duration::from_millis(500)).await;
    assert_eq!(manager.status().0, HugoStatus::Stopped);

    manager.start().await.unwrap();
    manager.stop().await.unwrap();
    wait_idle(&manager).await;
}

#[tokio::test]
async fn test_restart_replaces_process() {
    let site = TestSite::new();
    let manager = site.manager_with("exec sleep 30", |c| {
        c.grace_period = "50ms".to_string();
    });

    manager.start().await.unwrap();
    assert!(wait_for_status(&manager, HugoStatus::Running).await);
    let first = manager.pid().unwrap();

    assert!(process_alive(first));

    manager.restart().await.unwrap();
    assert!(!process_alive(first), "previous hugo {first} survived restart");
    let second = manager.pid().unwrap();
    assert_ne!(first, second);
    assert!(process_alive(second));
    assert!(manager.status().0.is_active());

    let system = messages(&manager, LogOrigin::System);
    assert!(system.iter().any(|m| m == "Restarting Hugo server..."));
    assert!(system.iter().any(|m| m == "Stopping Hugo server..."));
    assert_eq!(
        system
            .iter()
            .filter(|m| *m == "Starting Hugo server...")
            .count(),
        2
    );

    assert!(wait_for_status(&manager, HugoStatus::Running).await);
    manager.stop().await.unwrap();
    wait_idle(&manager).await;
}

#[tokio::test]
async fn test_restart_from_stopped_starts() {
    let site = TestSite::new();
    let manager = site.manager("exec sleep 30");

    manager.restart().await.unwrap();
    assert_eq!(manager.status().0, HugoStatus::Starting);
    assert!(manager.pid().is_some());

    manager.stop().await.unwrap();
    wait_idle(&manager).await;
}

#[tokio::test]
async fn test_subscriber_sees_lines_in_order() {
    let site = TestSite::new();
    let manager = site.manager("echo hello\necho world\nexit 0");
    let mut subscription = manager.subscribe();

    manager.start().await.unwrap();

    let mut stdout = vec![];
    while stdout.len() < 2 {
        let entry = timeout(TIMEOUT, subscription.recv())
            .await
            .expect("timed out waiting for output")
            .expect("subscription closed early");
        if entry.origin == LogOrigin::Stdout {
            stdout.push(entry.message);
        }
    }
    assert_eq!(stdout, vec!["hello", "world"]);
    wait_idle(&manager).await;
}

#[tokio::test]
async fn test_lagging_subscriber_does_not_stall_output() {
    let site = TestSite::new();
    let manager = site.manager_with(
        "i=0\nwhile [ $i -lt 300 ]; do echo \"line $i\"; i=$((i+1)); done\nexit 0",
        |c| c.subscriber_capacity = 5,
    );
    let mut subscription = manager.subscribe();

    manager.start().await.unwrap();
    wait_idle(&manager).await;

    assert_eq!(messages(&manager, LogOrigin::Stdout).len(), 300);
    assert_eq!(manager.status().0, HugoStatus::Stopped);

    let mut received = 0;
    while subscription.try_recv().is_some() {
        received += 1;
    }
    assert_eq!(received, 5);
}

#[tokio::test]
async fn test_arguments_and_working_directory() {
    let site = TestSite::new();
    let manager = site.manager_with(
        "echo \"args: $0 $*\"\necho \"cwd: $(pwd -P)\"\nexit 0",
        |c| {
            c.port = 4321;
            c.additional_args = vec!["--buildDrafts".to_string()];
        },
    );

    manager.start().await.unwrap();
    wait_idle(&manager).await;

    let stdout = messages(&manager, LogOrigin::Stdout);
    assert_eq!(
        stdout[0],
        "args: server --port 4321 --disableFastRender --buildDrafts"
    );
    let cwd = site.dir().canonicalize().unwrap();
    assert_eq!(stdout[1], format!("cwd: {}", cwd.display()));
}

#[tokio::test]
async fn test_shutdown_stops_and_closes_subscribers() {
    let site = TestSite::new();
    let manager = site.manager("exec sleep 30");
    let mut subscription = manager.subscribe();

    manager.start().await.unwrap();
    manager.shutdown().await;

    assert_eq!(manager.status().0, HugoStatus::Stopped);
    assert_eq!(manager.pid(), None);
    wait_idle(&manager).await;

    let drained = timeout(TIMEOUT, async {
        while subscription.recv().await.is_some() {}
    })
    .await;
    assert!(drained.is_ok(), "subscription was not closed");
}

#[tokio::test]
async fn test_concurrent_starts_launch_once() {
    let site = TestSite::new();
    let manager = Arc::new(site.manager("exec sleep 30"));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.start().await })
        })
        .collect();
    let mut ok = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => ok += 1,
            Err(err) => assert!(matches!(err, HugoError::AlreadyRunning)),
        }
    }
    assert_eq!(ok, 1);

    manager.stop().await.unwrap();
    wait_idle(&manager).await;
}
