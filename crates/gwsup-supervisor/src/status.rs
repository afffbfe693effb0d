//! Lock-free status projection.
//!
//! Every change the supervisor makes under its control lock, and every
//! snapshot the health monitor takes, is published into a `watch` channel.
//! Readers only ever borrow the last published value, so status queries
//! never wait behind an in-flight start or stop.

use gwsup_monitoring::HealthSnapshot;
use gwsup_process_state::{ServiceState, StateTransition};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

/// Flat status view polled by the desktop UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub uptime_seconds: Option<u64>,
    pub memory_mb: Option<f64>,
    pub cpu_percent: Option<f32>,
}

impl From<&HealthSnapshot> for ServiceStatus {
    fn from(snapshot: &HealthSnapshot) -> Self {
        Self {
            running: snapshot.running,
            pid: snapshot.pid,
            port: snapshot.port,
            uptime_seconds: snapshot.uptime_seconds,
            memory_mb: snapshot.memory_mb,
            cpu_percent: snapshot.cpu_percent,
        }
    }
}

/// Outcome of clearing the gateway port of foreign processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortCleanup {
    pub port: u16,
    pub killed: Vec<u32>,
    /// Pids that could not be killed, with the reason.
    pub failed: Vec<(u32, String)>,
    /// Whether the port stopped accepting connections afterwards.
    pub released: bool,
}

/// Snapshot plus lifecycle and recovery state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupervisorStatus {
    pub state: ServiceState,
    pub snapshot: HealthSnapshot,
    pub restart_attempts: u32,
    /// Automatic recovery gave up; a human has to act.
    pub crash_loop_detected: bool,
    pub last_error: Option<String>,
    pub last_transition: Option<StateTransition>,
}

impl SupervisorStatus {
    pub(crate) fn initial(port: Option<u16>) -> Self {
        Self {
            state: ServiceState::Stopped,
            snapshot: HealthSnapshot::not_running(port),
            restart_attempts: 0,
            crash_loop_detected: false,
            last_error: None,
            last_transition: None,
        }
    }

    pub fn service_status(&self) -> ServiceStatus {
        ServiceStatus::from(&self.snapshot)
    }
}

/// Value carried by the status channel. `generation` ties a snapshot to the
/// launch it describes so late monitor samples cannot overwrite newer state.
#[derive(Debug, Clone)]
pub(crate) struct Published {
    pub generation: u64,
    pub status: SupervisorStatus,
}

/// Read-only handle on the published status. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    rx: watch::Receiver<Published>,
}

impl StatusReporter {
    pub(crate) fn new(rx: watch::Receiver<Published>) -> Self {
        Self { rx }
    }

    pub fn status(&self) -> ServiceStatus {
        self.rx.borrow().status.service_status()
    }

    pub fn detailed_status(&self) -> SupervisorStatus {
        self.rx.borrow().status.clone()
    }

    pub fn state(&self) -> ServiceState {
        self.rx.borrow().status.state
    }

    /// Wait until the published status satisfies `predicate`.
    /// Returns `None` on timeout or if the supervisor is gone.
    pub async fn wait_until<F>(&mut self, timeout: Duration, mut predicate: F) -> Option<SupervisorStatus>
    where
        F: FnMut(&SupervisorStatus) -> bool,
    {
        let wait = self.rx.wait_for(|published| predicate(&published.status));
        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(published)) => Some(published.status.clone()),
            _ => None,
        }
    }

    pub async fn wait_for_state(&mut self, state: ServiceState, timeout: Duration) -> Option<SupervisorStatus> {
        self.wait_until(timeout, |status| status.state == state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (watch::Sender<Published>, StatusReporter) {
        let (tx, rx) = watch::channel(Published {
            generation: 0,
            status: SupervisorStatus::initial(Some(18789)),
        });
        (tx, StatusReporter::new(rx))
    }

    #[test]
    fn test_initial_status() {
        let (_tx, reporter) = channel();
        let status = reporter.status();
        assert!(!status.running);
        assert_eq!(status.pid, None);
        assert_eq!(status.port, Some(18789));
        assert_eq!(reporter.state(), ServiceState::Stopped);
    }

    #[test]
    fn test_status_json_shape() {
        let (_tx, reporter) = channel();
        let json = serde_json::to_value(reporter.status()).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 6);
        for key in ["running", "pid", "port", "uptime_seconds", "memory_mb", "cpu_percent"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert!(json["uptime_seconds"].is_null());
    }

    #[tokio::test]
    async fn test_wait_for_state() {
        let (tx, mut reporter) = channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send_modify(|p| p.status.state = ServiceState::Starting);
            tx.send_modify(|p| p.status.state = ServiceState::Running);
            // Keep the sender alive until the reader has seen it.
            tokio::time::sleep(Duration::from_millis(500)).await;
        });

        let status = reporter
            .wait_for_state(ServiceState::Running, Duration::from_secs(2))
            .await
            .expect("state should be published");
        assert_eq!(status.state, ServiceState::Running);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let (_tx, mut reporter) = channel();
        let result = reporter
            .wait_for_state(ServiceState::Running, Duration::from_millis(50))
            .await;
        assert!(result.is_none());
    }
}
