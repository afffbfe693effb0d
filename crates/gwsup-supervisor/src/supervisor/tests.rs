//! Unit tests for the supervisor control path.
#![cfg(unix)]

use super::*;
use crate::config::RecoveryConfig;
use gwsup_process::{force_kill, is_port_listening};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

/// Port number for [`port_holder`], set only in the re-executed test binary.
const HOLD_PORT_ENV: &str = "GWSUP_TEST_HOLD_PORT";

/// Wait until the published status matches `predicate`, panicking with the
/// final status on timeout.
async fn wait_for_status(
    supervisor: &Supervisor,
    timeout: Duration,
    predicate: impl FnMut(&SupervisorStatus) -> bool,
) -> SupervisorStatus {
    match supervisor.reporter().wait_until(timeout, predicate).await {
        Some(status) => status,
        None => panic!(
            "wait_for_status timed out after {:?}. Final status: {:?}",
            timeout,
            supervisor.detailed_status()
        ),
    }
}

async fn wait_for_state(supervisor: &Supervisor, state: ServiceState, timeout: Duration) -> SupervisorStatus {
    wait_for_status(supervisor, timeout, |s| s.state == state).await
}

/// Exists and is not a zombie waiting for a parent that will never reap it.
fn is_live(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => !stat.rsplit(')').next().is_some_and(|rest| rest.trim_start().starts_with('Z')),
        Err(_) => gwsup_process::process_exists(pid).unwrap_or(false),
    }
}

/// Signals are delivered asynchronously; give a killed process a moment.
async fn is_gone(pid: u32) -> bool {
    for _ in 0..100 {
        if !is_live(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

async fn read_pid_file(path: &Path) -> u32 {
    for _ in 0..100 {
        if let Some(pid) = std::fs::read_to_string(path).ok().and_then(|s| s.trim().parse().ok()) {
            return pid;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{} was never written", path.display());
}

fn count_starts(supervisor: &Supervisor) -> usize {
    supervisor
        .state_history()
        .iter()
        .filter(|t| t.to_state == ServiceState::Starting)
        .count()
}

/// Fresh output file so parallel tests never read each other's lines.
fn test_log_file() -> PathBuf {
    tempfile::NamedTempFile::new().unwrap().into_temp_path().keep().unwrap()
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn create_test_config(script: &str) -> SupervisorConfig {
    let mut config = SupervisorConfig::default();
    config.gateway.command = "sh".to_string();
    config.gateway.args = vec!["-c".to_string(), script.to_string()];
    config.gateway.port = None;
    config.gateway.graceful_timeout = Duration::from_secs(2);
    config.monitoring.interval = Duration::from_millis(100);
    config.monitoring.sample_timeout = Duration::from_millis(100);
    config.monitoring.sample_resources = false;
    config.logs.file = test_log_file();
    config.recovery = RecoveryConfig {
        enabled: true,
        max_attempts: 3,
        initial_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        max_delay: Duration::from_millis(500),
        window: Duration::from_secs(60),
        stable_after: Duration::from_secs(5),
    };
    config
}

fn long_running() -> Supervisor {
    Supervisor::new(create_test_config("exec sleep 30")).unwrap()
}

#[tokio::test]
async fn test_start_stop_sequence() {
    let supervisor = long_running();
    assert_eq!(supervisor.state(), ServiceState::Stopped);

    let ack = supervisor.start(CommandSource::Local).await.unwrap();
    assert_eq!(ack.action, ControlAction::Start);
    let pid = ack.pid.expect("start should report a pid");
    assert_eq!(supervisor.state(), ServiceState::Running);

    let status = supervisor.status();
    assert!(status.running);
    assert_eq!(status.pid, Some(pid));

    let err = supervisor.start(CommandSource::Local).await.unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning { .. }));
    assert_eq!(supervisor.state(), ServiceState::Running);
    assert_eq!(supervisor.status().pid, Some(pid));

    let ack = supervisor.stop(CommandSource::Local).await.unwrap();
    assert_eq!(ack.pid, Some(pid));
    assert_eq!(supervisor.state(), ServiceState::Stopped);

    let status = supervisor.status();
    assert!(!status.running);
    assert_eq!(status.pid, None);
    assert_eq!(status.uptime_seconds, None);
    assert_eq!(status.memory_mb, None);

    let err = supervisor.stop(CommandSource::Local).await.unwrap_err();
    assert_eq!(err, SupervisorError::NotRunning);
    assert!(!gwsup_process::process_exists(pid).unwrap());

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_transition_history() {
    let supervisor = long_running();
    supervisor.start(CommandSource::Local).await.unwrap();
    supervisor.stop(CommandSource::Remote).await.unwrap();

    let states: Vec<_> = supervisor.state_history().iter().map(|t| t.to_state).collect();
    assert_eq!(
        states,
        vec![
            ServiceState::Starting,
            ServiceState::Running,
            ServiceState::Stopping,
            ServiceState::Stopped
        ]
    );

    let last = supervisor.detailed_status().last_transition.unwrap();
    assert_eq!(last.to_state, ServiceState::Stopped);
    assert_eq!(last.reason.as_deref(), Some("stopped by remote"));

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_kill_when_stopped_is_noop() {
    let supervisor = long_running();
    let ack = supervisor.kill(CommandSource::Local).await.unwrap();
    assert_eq!(ack.pid, None);
    assert_eq!(supervisor.state(), ServiceState::Stopped);
    assert!(supervisor.state_history().is_empty());
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_kill_running() {
    let supervisor = long_running();
    let pid = supervisor.start(CommandSource::Local).await.unwrap().pid.unwrap();

    let ack = supervisor.kill(CommandSource::Local).await.unwrap();
    assert_eq!(ack.pid, Some(pid));
    assert_eq!(supervisor.state(), ServiceState::Stopped);
    assert!(!gwsup_process::process_exists(pid).unwrap());
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_restart_from_stopped_starts() {
    let supervisor = long_running();
    let ack = supervisor.restart(CommandSource::Remote).await.unwrap();
    assert!(ack.pid.is_some());
    assert_eq!(supervisor.state(), ServiceState::Running);
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_restart_replaces_process() {
    let supervisor = long_running();
    let first = supervisor.start(CommandSource::Local).await.unwrap().pid.unwrap();
    let second = supervisor.restart(CommandSource::Remote).await.unwrap().pid.unwrap();

    assert_ne!(first, second);
    assert!(!gwsup_process::process_exists(first).unwrap());
    assert_eq!(supervisor.status().pid, Some(second));
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_launch_failure() {
    let mut config = create_test_config("");
    config.gateway.command = "/definitely/not/a/gateway".to_string();
    config.gateway.args.clear();
    let supervisor = Supervisor::new(config).unwrap();

    let err = supervisor.start(CommandSource::Local).await.unwrap_err();
    assert!(matches!(err, SupervisorError::LaunchFailure { .. }));
    assert_eq!(supervisor.state(), ServiceState::Stopped);

    let status = supervisor.detailed_status();
    assert!(status.last_error.unwrap().contains("/definitely/not/a/gateway"));
    // Launch failures are not crashes.
    assert_eq!(status.restart_attempts, 0);

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_exit_during_port_wait_is_launch_failure() {
    let mut config = create_test_config("sleep 0.2; exit 3");
    config.gateway.port = Some(free_port());
    config.gateway.startup_timeout = Duration::from_secs(5);
    let supervisor = Supervisor::new(config).unwrap();

    let err = supervisor.start(CommandSource::Local).await.unwrap_err();
    match err {
        SupervisorError::LaunchFailure { reason, .. } => assert!(reason.contains("exited during startup"), "{}", reason),
        other => panic!("expected launch failure, got {:?}", other),
    }
    assert_eq!(supervisor.state(), ServiceState::Stopped);
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_port_in_use_refuses_launch() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut config = create_test_config("exec sleep 30");
    config.gateway.port = Some(port);
    let supervisor = Supervisor::new(config).unwrap();

    let err = supervisor.start(CommandSource::Local).await.unwrap_err();
    match err {
        SupervisorError::LaunchFailure { reason, .. } => assert!(reason.contains("already in use")),
        other => panic!("expected launch failure, got {:?}", other),
    }
    assert_eq!(supervisor.state(), ServiceState::Stopped);
    assert!(supervisor.state_history().iter().all(|t| t.to_state != ServiceState::Running));
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_port_wait_timeout_still_runs() {
    let mut config = create_test_config("exec sleep 30");
    config.gateway.port = Some(free_port());
    config.gateway.startup_timeout = Duration::from_millis(300);
    let supervisor = Supervisor::new(config).unwrap();

    let started = Instant::now();
    supervisor.start(CommandSource::Local).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(supervisor.state(), ServiceState::Running);
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stop_escalates_when_term_ignored() {
    let mut config = create_test_config("trap '' TERM; while true; do sleep 0.1; done");
    config.gateway.graceful_timeout = Duration::from_millis(300);
    let supervisor = Supervisor::new(config).unwrap();

    let pid = supervisor.start(CommandSource::Local).await.unwrap().pid.unwrap();
    // Give the shell time to install the trap.
    tokio::time::sleep(Duration::from_millis(200)).await;

    supervisor.stop(CommandSource::Local).await.unwrap();
    assert_eq!(supervisor.state(), ServiceState::Stopped);
    assert!(!gwsup_process::process_exists(pid).unwrap());
    assert!(supervisor.detailed_status().last_error.is_none());
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_starts_launch_once() {
    let supervisor = long_running();

    let (a, b) = tokio::join!(
        supervisor.start(CommandSource::Local),
        supervisor.start(CommandSource::Remote)
    );

    let results = [a, b];
    let oks: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let errs: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(oks.len(), 1);
    assert_eq!(errs.len(), 1);
    assert!(matches!(errs[0], SupervisorError::AlreadyRunning { .. }));
    assert_eq!(supervisor.state_history().iter().filter(|t| t.to_state == ServiceState::Starting).count(), 1);

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_second_command_observes_first() {
    let supervisor = long_running();
    supervisor.start(CommandSource::Local).await.unwrap();

    // Stop then start issued back to back from different callers.
    let stopper = supervisor.clone();
    let stop = tokio::spawn(async move { stopper.stop(CommandSource::Local).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let start = supervisor.start(CommandSource::Remote).await;

    assert!(stop.await.unwrap().is_ok());
    assert!(start.is_ok(), "start after stop should succeed: {:?}", start);
    assert_eq!(supervisor.state(), ServiceState::Running);
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_try_execute_busy_and_status_not_blocked() {
    let mut config = create_test_config("trap '' TERM; while true; do sleep 0.1; done");
    config.gateway.graceful_timeout = Duration::from_secs(1);
    let supervisor = Supervisor::new(config).unwrap();
    supervisor.start(CommandSource::Local).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stopper = supervisor.clone();
    let stop = tokio::spawn(async move { stopper.stop(CommandSource::Local).await });
    wait_for_state(&supervisor, ServiceState::Stopping, Duration::from_secs(2)).await;

    let err = supervisor
        .try_execute(ControlRequest::new(ControlAction::Start, CommandSource::Remote))
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::Busy { .. }));

    let started = Instant::now();
    let status = supervisor.detailed_status();
    assert!(started.elapsed() < Duration::from_millis(50));
    assert_eq!(status.state, ServiceState::Stopping);
    assert!(!status.snapshot.running);

    stop.await.unwrap().unwrap();
    assert_eq!(supervisor.state(), ServiceState::Stopped);
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_crash_is_recovered() {
    let supervisor = long_running();
    let pid = supervisor.start(CommandSource::Local).await.unwrap().pid.unwrap();

    force_kill(pid).unwrap();

    let status = wait_for_status(&supervisor, Duration::from_secs(5), |s| {
        s.state == ServiceState::Running && s.snapshot.pid.is_some_and(|p| p != pid)
    })
    .await;
    assert_eq!(status.restart_attempts, 1);
    assert!(!status.crash_loop_detected);

    let states: Vec<_> = supervisor.state_history().iter().map(|t| t.to_state).collect();
    assert_eq!(
        &states[2..],
        &[ServiceState::Crashed, ServiceState::Starting, ServiceState::Running]
    );
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stop_cancels_pending_recovery() {
    let mut config = create_test_config("exec sleep 30");
    config.recovery.initial_delay = Duration::from_millis(800);
    config.recovery.max_delay = Duration::from_secs(2);
    let supervisor = Supervisor::new(config).unwrap();
    let pid = supervisor.start(CommandSource::Local).await.unwrap().pid.unwrap();

    force_kill(pid).unwrap();
    wait_for_state(&supervisor, ServiceState::Crashed, Duration::from_secs(2)).await;

    supervisor.stop(CommandSource::Local).await.unwrap();
    assert_eq!(supervisor.state(), ServiceState::Stopped);
    assert_eq!(supervisor.detailed_status().restart_attempts, 0);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(supervisor.state(), ServiceState::Stopped);
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_kill_from_crashed_cancels_pending_recovery() {
    let mut config = create_test_config("exec sleep 30");
    config.recovery.initial_delay = Duration::from_millis(800);
    config.recovery.max_delay = Duration::from_secs(2);
    let supervisor = Supervisor::new(config).unwrap();
    let pid = supervisor.start(CommandSource::Local).await.unwrap().pid.unwrap();

    force_kill(pid).unwrap();
    wait_for_state(&supervisor, ServiceState::Crashed, Duration::from_secs(2)).await;
    let starts = count_starts(&supervisor);

    let ack = supervisor.kill(CommandSource::Remote).await.unwrap();
    assert_eq!(ack.pid, None, "the crashed process was already released");
    assert_eq!(supervisor.state(), ServiceState::Stopped);
    assert_eq!(supervisor.detailed_status().restart_attempts, 0);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(supervisor.state(), ServiceState::Stopped);
    assert_eq!(count_starts(&supervisor), starts, "no relaunch after kill");
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stop_takes_gateway_children_along() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("child.pid");
    let supervisor = Supervisor::new(create_test_config(&format!(
        "sleep 30 & echo $! > '{}'; wait",
        pid_file.display()
    )))
    .unwrap();

    let pid = supervisor.start(CommandSource::Local).await.unwrap().pid.unwrap();
    let child = read_pid_file(&pid_file).await;
    assert!(is_live(child));

    supervisor.stop(CommandSource::Local).await.unwrap();
    assert!(is_gone(pid).await);
    assert!(is_gone(child).await, "child {} outlived the gateway", child);
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_kill_and_restart_take_gateway_children_along() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("child.pid");
    let mut config = create_test_config(&format!("trap '' TERM; sleep 30 & echo $! > '{}'; wait", pid_file.display()));
    config.gateway.graceful_timeout = Duration::from_millis(300);
    let supervisor = Supervisor::new(config).unwrap();

    supervisor.start(CommandSource::Local).await.unwrap();
    let first_child = read_pid_file(&pid_file).await;
    std::fs::remove_file(&pid_file).unwrap();

    supervisor.restart(CommandSource::Local).await.unwrap();
    assert!(is_gone(first_child).await, "restart left child {} behind", first_child);

    let second_child = read_pid_file(&pid_file).await;
    supervisor.kill(CommandSource::Local).await.unwrap();
    assert!(is_gone(second_child).await, "kill left child {} behind", second_child);
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_crash_takes_gateway_children_along() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("child.pid");
    let mut config = create_test_config(&format!("sleep 30 & echo $! > '{}'; wait", pid_file.display()));
    config.recovery.enabled = false;
    let supervisor = Supervisor::new(config).unwrap();

    let pid = supervisor.start(CommandSource::Local).await.unwrap().pid.unwrap();
    let child = read_pid_file(&pid_file).await;

    force_kill(pid).unwrap();
    wait_for_state(&supervisor, ServiceState::Crashed, Duration::from_secs(2)).await;
    assert!(is_gone(child).await, "child {} outlived the crashed gateway", child);
    supervisor.shutdown().await.unwrap();
}

/// Holds the port named by [`HOLD_PORT_ENV`] until killed. Does nothing in
/// a normal test run.
#[test]
#[ignore = "run as a child process by test_kill_port_occupants"]
fn port_holder() {
    let Ok(port) = std::env::var(HOLD_PORT_ENV) else {
        return;
    };
    let _listener = std::net::TcpListener::bind(("127.0.0.1", port.parse::<u16>().unwrap())).unwrap();
    std::thread::sleep(Duration::from_secs(30));
}

#[tokio::test]
async fn test_kill_port_occupants() {
    let port = free_port();
    let mut holder = std::process::Command::new(std::env::current_exe().unwrap())
        .args(["supervisor::tests::port_holder", "--exact", "--ignored", "--nocapture"])
        .env(HOLD_PORT_ENV, port.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    tokio::time::timeout(Duration::from_secs(10), async {
        while !is_port_listening(port).await {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("holder should bind the port");

    let mut config = create_test_config("exec sleep 30");
    config.gateway.port = Some(port);
    config.gateway.wait_for_port = false;
    let supervisor = Supervisor::new(config).unwrap();

    let err = supervisor.start(CommandSource::Local).await.unwrap_err();
    assert!(err.to_string().contains("already in use"), "{}", err);

    let cleanup = supervisor.kill_port_occupants(CommandSource::Local).await.unwrap();
    assert_eq!(cleanup.port, port);
    assert_eq!(cleanup.killed, vec![holder.id()]);
    assert!(cleanup.failed.is_empty());
    assert!(cleanup.released);
    holder.wait().unwrap();

    supervisor.start(CommandSource::Local).await.unwrap();
    assert_eq!(supervisor.state(), ServiceState::Running);
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_kill_port_occupants_stops_supervised_gateway_first() {
    let mut config = create_test_config("exec sleep 30");
    config.gateway.port = Some(free_port());
    config.gateway.wait_for_port = false;
    let supervisor = Supervisor::new(config).unwrap();
    let pid = supervisor.start(CommandSource::Local).await.unwrap().pid.unwrap();

    let cleanup = supervisor.kill_port_occupants(CommandSource::Remote).await.unwrap();
    assert!(cleanup.killed.is_empty());
    assert!(cleanup.released);
    assert_eq!(supervisor.state(), ServiceState::Stopped);
    assert!(is_gone(pid).await);
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_kill_port_occupants_needs_a_port() {
    let supervisor = long_running();
    let err = supervisor.kill_port_occupants(CommandSource::Local).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Configuration { .. }), "{:?}", err);
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_disabled_recovery_stays_crashed() {
    let mut config = create_test_config("exec sleep 30");
    config.recovery.enabled = false;
    let supervisor = Supervisor::new(config).unwrap();
    let pid = supervisor.start(CommandSource::Local).await.unwrap().pid.unwrap();

    force_kill(pid).unwrap();
    let status = wait_for_state(&supervisor, ServiceState::Crashed, Duration::from_secs(2)).await;
    assert!(!status.crash_loop_detected);
    assert!(status.last_error.unwrap().contains("exited unexpectedly"));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(supervisor.state(), ServiceState::Crashed);

    // Explicit start from Crashed is allowed.
    supervisor.start(CommandSource::Local).await.unwrap();
    assert_eq!(supervisor.state(), ServiceState::Running);
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_logs_are_captured() {
    let supervisor = Supervisor::new(create_test_config(
        "echo hello; echo 'oops token=abcdef123456' >&2; exec sleep 30",
    ))
    .unwrap();
    supervisor.start(CommandSource::Local).await.unwrap();

    tokio::time::timeout(Duration::from_secs(3), async {
        while supervisor.logs(None).len() < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("output should be captured");

    let logs = supervisor.logs(None);
    assert!(logs.contains(&"hello".to_string()));
    assert!(logs.contains(&"oops token=***[REDACTED]***".to_string()));
    assert_eq!(supervisor.logs(Some(1)).len(), 1);

    // Output survives the process and the file keeps the raw line.
    supervisor.stop(CommandSource::Local).await.unwrap();
    assert_eq!(supervisor.logs(None).len(), 2);
    let raw = std::fs::read_to_string(&supervisor.config().logs.file).unwrap();
    assert!(raw.contains("abcdef123456"));
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_gateway_survives_without_log_reader() {
    // Far more output than a pipe buffer holds, with nobody calling logs().
    let supervisor = Supervisor::new(create_test_config(
        "i=0; while [ $i -lt 5000 ]; do echo \"line $i padding padding padding padding\"; i=$((i+1)); done; exec sleep 30",
    ))
    .unwrap();
    let pid = supervisor.start(CommandSource::Local).await.unwrap().pid.unwrap();

    tokio::time::timeout(Duration::from_secs(10), async {
        while !supervisor.logs(Some(1)).first().is_some_and(|l| l.starts_with("line 4999")) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("all output should reach the file");

    assert_eq!(supervisor.state(), ServiceState::Running);
    assert_eq!(supervisor.status().pid, Some(pid));
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_logs_disabled() {
    let mut config = create_test_config("echo hello; exec sleep 30");
    config.logs.capture = false;
    let supervisor = Supervisor::new(config).unwrap();
    supervisor.start(CommandSource::Local).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(supervisor.logs(None).is_empty());
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_gateway_and_rejects_commands() {
    let supervisor = long_running();
    let pid = supervisor.start(CommandSource::Local).await.unwrap().pid.unwrap();

    supervisor.shutdown().await.unwrap();
    assert_eq!(supervisor.state(), ServiceState::Stopped);
    assert!(!gwsup_process::process_exists(pid).unwrap());

    assert!(supervisor.start(CommandSource::Local).await.is_err());
    // Idempotent
    supervisor.shutdown().await.unwrap();
}
