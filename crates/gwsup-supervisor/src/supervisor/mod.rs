//! Gateway supervisor: one explicitly constructed object owning the gateway's
//! lifecycle.
//!
//! ## Control lock
//!
//! Every control operation (start, stop, restart, kill, automatic recovery,
//! stability confirmation, crash handling) runs while holding a single
//! `tokio::sync::Mutex`. The mutex is FIFO-fair, so operations are
//! linearized in submission order and a second caller waits for the first
//! instead of being dropped. [`Supervisor::try_execute`] is the non-blocking
//! variant that fails with `Busy`.
//!
//! ## Status
//!
//! Status readers never touch the control lock. Each operation publishes the
//! resulting state into a `watch` channel before releasing the lock, and the
//! health monitor publishes samples into the same channel. Readers see the
//! last published value, which may lag an in-flight transition slightly.
//!
//! ## Crash handling
//!
//! The health monitor holds a `Weak` reference to the shared state and
//! reports exits of the process it observed as Running. The report is
//! handled under the control lock like any other caller: a report about a
//! process that a stop or restart already replaced is ignored because the
//! launch generation no longer matches. Automatic relaunches are spawned
//! timers that re-enter through the control lock with `CommandSource::Recovery`;
//! any explicit command bumps the recovery epoch and cancels them.
//!
//! ## Gateway output
//!
//! The gateway appends its stdout and stderr to the configured log file
//! directly. `logs` tails that file, so output survives the process that
//! wrote it and nothing breaks when no one is reading.

mod monitor;
mod router;

#[cfg(test)]
mod tests;

use crate::config::{SupervisorConfig, DEFAULT_LOG_LINES};
use crate::recovery::{RecoveryContext, RecoveryPolicy, RecoveryStats};
use crate::status::{PortCleanup, Published, ServiceStatus, StatusReporter, SupervisorStatus};
use gwsup_common::{Ack, CommandSource, ControlAction, ControlRequest, SupervisorError, SupervisorResult};
use gwsup_log_collection::LogCollector;
use gwsup_monitoring::{
    HealthMonitor, HealthSnapshot, MonitoredService, NullSampler, Observation, ResourceSample, ResourceSampler,
    SysinfoSampler,
};
use gwsup_process::ProcessHandle;
use gwsup_process_state::{ServiceState, ServiceStateMachine, StateTransition};
use parking_lot::Mutex as SyncMutex;
use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// State only touched while holding the control lock.
struct Control {
    process: Option<ProcessHandle>,
    /// Incremented on every launch.
    generation: u64,
    recovery: RecoveryContext,
    /// Incremented whenever pending recovery is scheduled or superseded.
    recovery_epoch: u64,
    recovery_task: Option<JoinHandle<()>>,
    last_error: Option<String>,
    shut_down: bool,
}

pub(crate) struct Shared {
    config: SupervisorConfig,
    policy: RecoveryPolicy,
    control: Mutex<Control>,
    /// Written only while holding `control`; readable without it.
    machine: SyncMutex<ServiceStateMachine>,
    /// What the monitor should look at; `Some` only while Running.
    observed: SyncMutex<Option<Observation>>,
    status_tx: watch::Sender<Published>,
    /// `None` when output capture is disabled.
    logs: Option<LogCollector>,
    monitor: SyncMutex<Option<HealthMonitor>>,
    monitor_wake: Arc<Notify>,
    self_ref: Weak<Shared>,
}

/// Handle on the gateway supervisor. Clones share the same supervisor.
///
/// Construct one per application instance and hand clones to the desktop
/// UI backend and the remote command adapter.
#[derive(Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("command", &self.shared.config.gateway.command)
            .field("state", &self.state())
            .finish()
    }
}

impl Supervisor {
    /// Create a supervisor and start its health monitor.
    ///
    /// Must be called inside a tokio runtime. The gateway is not launched.
    pub fn new(config: SupervisorConfig) -> SupervisorResult<Self> {
        let sampler: Arc<dyn ResourceSampler> = if config.monitoring.sample_resources {
            Arc::new(SysinfoSampler::new())
        } else {
            Arc::new(NullSampler)
        };
        Self::with_sampler(config, sampler)
    }

    /// Like [`new`](Self::new) with a custom resource sampler.
    pub fn with_sampler(config: SupervisorConfig, sampler: Arc<dyn ResourceSampler>) -> SupervisorResult<Self> {
        config
            .validate()
            .map_err(|e| SupervisorError::configuration(format!("{:#}", e)))?;

        let logs = if config.logs.capture {
            Some(LogCollector::new(config.logs.collector_config())?)
        } else {
            None
        };
        let monitor = HealthMonitor::new(config.monitor_config(), sampler);
        let monitor_wake = monitor.waker();
        let (status_tx, _) = watch::channel(Published {
            generation: 0,
            status: SupervisorStatus::initial(config.gateway.port),
        });

        let shared = Arc::new_cyclic(|self_ref| Shared {
            policy: RecoveryPolicy::new(config.recovery.clone()),
            control: Mutex::new(Control {
                process: None,
                generation: 0,
                recovery: RecoveryContext::default(),
                recovery_epoch: 0,
                recovery_task: None,
                last_error: None,
                shut_down: false,
            }),
            machine: SyncMutex::new(ServiceStateMachine::new()),
            observed: SyncMutex::new(None),
            status_tx,
            logs,
            monitor: SyncMutex::new(None),
            monitor_wake,
            self_ref: self_ref.clone(),
            config,
        });

        {
            let mut monitor = monitor;
            let weak: Weak<dyn MonitoredService> = Arc::downgrade(&shared) as Weak<dyn MonitoredService>;
            monitor.start(weak);
            *shared.monitor.lock() = Some(monitor);
        }

        info!(
            command = %shared.config.gateway.command,
            port = ?shared.config.gateway.port,
            "Gateway supervisor created"
        );

        Ok(Self { shared })
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.shared.config
    }

    pub async fn start(&self, source: CommandSource) -> SupervisorResult<Ack> {
        self.execute(ControlRequest::new(ControlAction::Start, source)).await
    }

    pub async fn stop(&self, source: CommandSource) -> SupervisorResult<Ack> {
        self.execute(ControlRequest::new(ControlAction::Stop, source)).await
    }

    /// Stop (if anything is running) then start. Succeeds from any state,
    /// including a detected crash loop, and resets recovery bookkeeping.
    pub async fn restart(&self, source: CommandSource) -> SupervisorResult<Ack> {
        self.execute(ControlRequest::new(ControlAction::Restart, source)).await
    }

    /// Forced termination. A no-op when already stopped.
    pub async fn kill(&self, source: CommandSource) -> SupervisorResult<Ack> {
        self.execute(ControlRequest::new(ControlAction::Kill, source)).await
    }

    /// Force-kill every process bound to the gateway port, for when a stale
    /// gateway from an earlier session blocks `start`. The supervised gateway
    /// is killed first and pending recovery is cancelled. The supervisor's
    /// own process is never touched.
    pub async fn kill_port_occupants(&self, source: CommandSource) -> SupervisorResult<PortCleanup> {
        let mut control = self.shared.control.lock().await;
        self.shared.clear_port(&mut control, source).await
    }

    /// Run `request`, waiting for any operation in flight to finish first.
    pub async fn execute(&self, request: ControlRequest) -> SupervisorResult<Ack> {
        let mut control = self.shared.control.lock().await;
        self.shared.apply(&mut control, request).await
    }

    /// Run `request` only if no other operation is in flight.
    pub async fn try_execute(&self, request: ControlRequest) -> SupervisorResult<Ack> {
        let mut control = self.shared.control.try_lock().map_err(|_| {
            debug!(request_id = %request.request_id, action = %request.action, "Control lock busy");
            SupervisorError::busy(request.action.to_string())
        })?;
        self.shared.apply(&mut control, request).await
    }

    /// Last published snapshot. Never blocks on control operations.
    pub fn status(&self) -> ServiceStatus {
        self.shared.status_tx.borrow().status.service_status()
    }

    pub fn detailed_status(&self) -> SupervisorStatus {
        self.shared.status_tx.borrow().status.clone()
    }

    pub fn state(&self) -> ServiceState {
        self.shared.status_tx.borrow().status.state
    }

    pub fn reporter(&self) -> StatusReporter {
        StatusReporter::new(self.shared.status_tx.subscribe())
    }

    /// Most recent captured lines, oldest first, with secrets redacted.
    /// Empty when capture is disabled or the log file cannot be read.
    pub fn logs(&self, lines: Option<usize>) -> Vec<String> {
        let Some(ref logs) = self.shared.logs else {
            return Vec::new();
        };
        match logs.tail(lines.unwrap_or(DEFAULT_LOG_LINES)) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, file = %logs.path().display(), "Failed to read gateway output");
                Vec::new()
            }
        }
    }

    /// Recorded transitions, oldest first.
    pub fn state_history(&self) -> Vec<StateTransition> {
        self.shared.machine.lock().history().cloned().collect()
    }

    /// Stop the monitor, cancel pending recovery and stop the gateway.
    /// Control requests issued afterwards are rejected.
    pub async fn shutdown(&self) -> SupervisorResult<()> {
        if let Some(mut monitor) = self.shared.monitor.lock().take() {
            monitor.stop();
        }

        let mut control = self.shared.control.lock().await;
        self.shared.shutdown_locked(&mut control).await
    }
}

impl Shared {
    fn state(&self) -> ServiceState {
        self.machine.lock().current_state()
    }

    /// Record a transition. Callers hold the control lock.
    fn transition(&self, control: &Control, target: ServiceState, reason: impl Into<String>) -> SupervisorResult<()> {
        let reason = reason.into();
        let from = {
            let mut machine = self.machine.lock();
            let from = machine.current_state();
            machine.transition_to(target, reason.clone())?;
            from
        };
        info!(from = %from, to = %target, reason = %reason, "Gateway state changed");

        if target != ServiceState::Running {
            *self.observed.lock() = None;
        }
        self.publish_control(control);
        Ok(())
    }

    /// Publish the current control state. Keeps the latest monitor sample
    /// while the same launch is still Running.
    fn publish_control(&self, control: &Control) {
        let (state, last_transition) = {
            let machine = self.machine.lock();
            (machine.current_state(), machine.last_transition().cloned())
        };
        let port = self.config.gateway.port;
        let stats: RecoveryStats = control.recovery.stats();

        self.status_tx.send_modify(|published| {
            let snapshot = match (state, control.process.as_ref()) {
                (ServiceState::Running, Some(process)) => {
                    let same_launch = published.generation == control.generation && published.status.snapshot.running;
                    if same_launch {
                        published.status.snapshot.clone()
                    } else {
                        HealthSnapshot::running(&process.watch(), port, ResourceSample::default())
                    }
                }
                _ => HealthSnapshot::not_running(port),
            };

            published.generation = control.generation;
            published.status = SupervisorStatus {
                state,
                snapshot,
                restart_attempts: stats.restart_attempts,
                crash_loop_detected: stats.crash_loop_detected,
                last_error: control.last_error.clone(),
                last_transition,
            };
        });
    }

    /// Monitor samples go straight into the channel, no control lock.
    fn publish_snapshot(&self, generation: u64, snapshot: HealthSnapshot) {
        self.status_tx.send_if_modified(|published| {
            if published.generation != generation || published.status.state != ServiceState::Running {
                return false;
            }
            published.status.snapshot = snapshot;
            true
        });
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(mut monitor) = self.monitor.get_mut().take() {
            monitor.stop();
        }
        if let Some(task) = self.control.get_mut().recovery_task.take() {
            task.abort();
        }
    }
}
