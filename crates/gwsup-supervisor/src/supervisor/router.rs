//! Control operations. Everything here runs with the control lock held.

use super::{Control, Shared};
use crate::recovery::RecoveryDecision;
use crate::status::PortCleanup;
use gwsup_common::{Ack, CommandSource, ControlAction, ControlRequest, SupervisorError, SupervisorResult};
use gwsup_monitoring::Observation;
use gwsup_process::{
    find_port_owners, force_kill, is_port_listening, wait_for_port, PortReadiness, ProcessHandle, Termination,
    FORCE_KILL_TIMEOUT,
};
use gwsup_process_state::ServiceState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const PORT_POLL_INTERVAL: Duration = Duration::from_millis(250);

impl Shared {
    pub(super) async fn apply(&self, control: &mut Control, request: ControlRequest) -> SupervisorResult<Ack> {
        let ControlRequest {
            action,
            source,
            request_id,
        } = request;

        if control.shut_down {
            return Err(SupervisorError::Internal("supervisor is shut down".to_string()));
        }

        info!(
            request_id = %request_id,
            action = %action,
            source = %source,
            state = %self.state(),
            "Executing control request"
        );

        let result = match action {
            ControlAction::Start => self.do_start(control, source).await,
            ControlAction::Stop => self.do_stop(control, source).await,
            ControlAction::Restart => self.do_restart(control, source).await,
            ControlAction::Kill => self.do_kill(control, source).await,
        };

        match result {
            Ok(pid) => {
                info!(request_id = %request_id, action = %action, pid = ?pid, state = %self.state(), "Control request completed");
                Ok(Ack {
                    request_id,
                    action,
                    pid,
                })
            }
            Err(e) => {
                // do_start records its own failures, possibly superseded by a crash loop.
                if !e.is_state_conflict() && control.last_error.is_none() {
                    control.last_error = Some(e.to_string());
                    self.publish_control(control);
                }
                warn!(request_id = %request_id, action = %action, error = %e, "Control request failed");
                Err(e)
            }
        }
    }

    async fn do_start(&self, control: &mut Control, source: CommandSource) -> SupervisorResult<Option<u32>> {
        let state = self.state();
        if !state.can_start() {
            return Err(SupervisorError::already_running(state.to_string()));
        }

        if source.is_explicit() {
            self.supersede_recovery(control);
            control.last_error = None;
        }
        self.transition(control, ServiceState::Starting, format!("start requested by {}", source))?;

        match self.launch(control).await {
            Ok(pid) => {
                self.transition(control, ServiceState::Running, format!("launched by {}", source))?;
                *self.observed.lock() = control.process.as_ref().map(|process| Observation {
                    generation: control.generation,
                    process: process.watch(),
                    port: self.config.gateway.port,
                    awaiting_stability: control.recovery.awaiting_stability(),
                });
                self.monitor_wake.notify_one();
                Ok(Some(pid))
            }
            Err(e) => {
                if let Some(mut process) = control.process.take() {
                    if let Err(kill_err) = process.terminate(false, Duration::ZERO).await {
                        error!(error = %kill_err, "Failed to clean up gateway after failed start");
                    }
                }
                control.last_error = Some(e.to_string());

                if source == CommandSource::Recovery {
                    self.transition(control, ServiceState::Crashed, format!("recovery launch failed: {}", e))?;
                    self.handle_crash(control);
                } else {
                    self.transition(control, ServiceState::Stopped, format!("launch failed: {}", e))?;
                }
                Err(e)
            }
        }
    }

    /// Spawn the gateway and wait for it to come up. Leaves the handle in
    /// `control.process` on both success and failure.
    async fn launch(&self, control: &mut Control) -> SupervisorResult<u32> {
        let gateway = &self.config.gateway;
        let output_file = match self.logs {
            Some(ref logs) => Some(
                logs.prepare_launch()
                    .map_err(|e| SupervisorError::launch_failure(&gateway.command, e.to_string()))?,
            ),
            None => None,
        };
        let spec = gateway
            .launch_spec(output_file)
            .map_err(|e| SupervisorError::launch_failure(&gateway.command, format!("{:#}", e)))?;

        if let Some(port) = gateway.port {
            if is_port_listening(port).await {
                return Err(SupervisorError::launch_failure(
                    spec.display_command(),
                    format!("port {} already in use", port),
                ));
            }
        }

        let process = ProcessHandle::launch(&spec)?;
        let pid = process.pid();
        control.generation += 1;

        let watch = process.watch();
        control.process = Some(process);

        match gateway.port {
            Some(port) if gateway.wait_for_port => {
                debug!(pid, port, timeout = ?gateway.startup_timeout, "Waiting for gateway port");
                match wait_for_port(port, &watch, gateway.startup_timeout, PORT_POLL_INTERVAL).await {
                    PortReadiness::Ready => info!(pid, port, "Gateway port is accepting connections"),
                    PortReadiness::Exited(exit) => {
                        return Err(SupervisorError::launch_failure(
                            spec.display_command(),
                            format!("exited during startup ({})", exit),
                        ));
                    }
                    PortReadiness::TimedOut => warn!(
                        pid,
                        port,
                        timeout = ?gateway.startup_timeout,
                        "Gateway port not ready in time, treating process as running"
                    ),
                }
            }
            _ => {
                if let Some(exit) = watch.exit_info() {
                    return Err(SupervisorError::launch_failure(
                        spec.display_command(),
                        format!("exited during startup ({})", exit),
                    ));
                }
            }
        }

        Ok(pid)
    }

    async fn do_stop(&self, control: &mut Control, source: CommandSource) -> SupervisorResult<Option<u32>> {
        let state = self.state();
        if !state.can_stop() {
            return Err(SupervisorError::NotRunning);
        }

        if source.is_explicit() {
            self.supersede_recovery(control);
        }
        if state != ServiceState::Stopping {
            self.transition(control, ServiceState::Stopping, format!("stop requested by {}", source))?;
        }

        let graceful_timeout = self.config.gateway.graceful_timeout;
        let pid = self.terminate(control, true, graceful_timeout).await;

        self.transition(control, ServiceState::Stopped, format!("stopped by {}", source))?;
        Ok(pid)
    }

    async fn do_kill(&self, control: &mut Control, source: CommandSource) -> SupervisorResult<Option<u32>> {
        let state = self.state();
        if !state.can_kill() {
            debug!("Kill requested while stopped, nothing to do");
            return Ok(None);
        }

        if source.is_explicit() {
            self.supersede_recovery(control);
        }
        if state != ServiceState::Stopping {
            self.transition(control, ServiceState::Stopping, format!("kill requested by {}", source))?;
        }

        let pid = self.terminate(control, false, Duration::ZERO).await;

        self.transition(control, ServiceState::Stopped, format!("killed by {}", source))?;
        Ok(pid)
    }

    async fn do_restart(&self, control: &mut Control, source: CommandSource) -> SupervisorResult<Option<u32>> {
        if source.is_explicit() {
            self.supersede_recovery(control);
        }

        match self.do_stop(control, source).await {
            Ok(_) | Err(SupervisorError::NotRunning) => {}
            Err(e) => return Err(e),
        }

        self.do_start(control, source).await
    }

    pub(super) async fn clear_port(&self, control: &mut Control, source: CommandSource) -> SupervisorResult<PortCleanup> {
        if control.shut_down {
            return Err(SupervisorError::Internal("supervisor is shut down".to_string()));
        }
        let port = self
            .config
            .gateway
            .port
            .ok_or_else(|| SupervisorError::configuration("no gateway port configured"))?;

        info!(port, source = %source, state = %self.state(), "Clearing gateway port");
        if self.state() != ServiceState::Stopped {
            self.do_kill(control, source).await?;
        }

        let owners = tokio::task::spawn_blocking(move || find_port_owners(port))
            .await
            .map_err(|e| SupervisorError::Internal(format!("port owner lookup failed: {}", e)))??;

        let own_pid = std::process::id();
        let mut cleanup = PortCleanup {
            port,
            killed: Vec::new(),
            failed: Vec::new(),
            released: false,
        };

        for owner in owners.into_iter().filter(|owner| owner.pid != own_pid) {
            match force_kill(owner.pid) {
                Ok(()) => {
                    info!(pid = owner.pid, name = %owner.name, port, "Killed port occupant");
                    cleanup.killed.push(owner.pid);
                }
                Err(e) => {
                    warn!(pid = owner.pid, name = %owner.name, port, error = %e, "Failed to kill port occupant");
                    cleanup.failed.push((owner.pid, e.to_string()));
                }
            }
        }

        let deadline = Instant::now() + FORCE_KILL_TIMEOUT;
        loop {
            if !is_port_listening(port).await {
                cleanup.released = true;
                break;
            }
            if Instant::now() >= deadline {
                warn!(port, "Gateway port still in use after cleanup");
                break;
            }
            tokio::time::sleep(PORT_POLL_INTERVAL).await;
        }

        Ok(cleanup)
    }

    /// Terminate the current process, if any. A process that survives the
    /// forced kill is recorded as an error but never fails the caller.
    async fn terminate(&self, control: &mut Control, graceful: bool, timeout: Duration) -> Option<u32> {
        let mut process = control.process.take()?;
        let pid = process.pid();

        match process.terminate(graceful, timeout).await {
            Ok(Termination::AlreadyExited(exit)) => debug!(pid, exit = %exit, "Gateway had already exited"),
            Ok(Termination::Graceful(exit)) => info!(pid, exit = %exit, "Gateway stopped gracefully"),
            Ok(Termination::Forced(exit)) => info!(pid, exit = %exit, graceful, "Gateway force-killed"),
            Err(e) => {
                error!(pid, error = %e, "Gateway did not exit after forced kill");
                control.last_error = Some(e.to_string());
            }
        }

        Some(pid)
    }

    /// Explicit commands win over pending automatic recovery.
    fn supersede_recovery(&self, control: &mut Control) {
        control.recovery_epoch += 1;
        if let Some(task) = control.recovery_task.take() {
            task.abort();
            info!("Pending automatic restart cancelled by explicit command");
        }
        if control.recovery.restart_attempts() > 0 || control.recovery.crash_loop_detected() {
            debug!(attempts = control.recovery.restart_attempts(), "Recovery context reset");
        }
        control.recovery.reset();
    }

    /// The gateway just entered Crashed. Ask the policy what to do.
    pub(super) fn handle_crash(&self, control: &mut Control) {
        match self.policy.on_crash(&mut control.recovery, Instant::now()) {
            RecoveryDecision::Restart { attempt, delay } => {
                self.schedule_recovery(control, attempt, delay);
            }
            RecoveryDecision::CrashLoop { attempts } => {
                let err = SupervisorError::CrashLoopDetected { attempts };
                error!(error = %err, "Automatic recovery stopped");
                control.last_error = Some(err.to_string());
            }
            RecoveryDecision::Disabled => {
                info!("Gateway crashed, automatic recovery disabled");
            }
        }
        self.publish_control(control);
    }

    fn schedule_recovery(&self, control: &mut Control, attempt: u32, delay: Duration) {
        control.recovery_epoch += 1;
        let epoch = control.recovery_epoch;
        let shared = self.self_ref.clone();

        if let Some(previous) = control.recovery_task.take() {
            previous.abort();
        }

        control.recovery_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(shared) = shared.upgrade() else {
                return;
            };
            Shared::run_recovery(shared, epoch, attempt).await;
        }));
    }

    async fn run_recovery(self: Arc<Self>, epoch: u64, attempt: u32) {
        let mut control = self.control.lock().await;

        if control.shut_down || control.recovery_epoch != epoch || self.state() != ServiceState::Crashed {
            debug!(epoch, attempt, "Automatic restart superseded");
            return;
        }
        // This task is the one running; nothing left to abort.
        control.recovery_task = None;

        info!(attempt, "Attempting automatic restart");
        let request = ControlRequest::new(ControlAction::Start, CommandSource::Recovery);
        if let Err(e) = self.apply(&mut control, request).await {
            warn!(attempt, error = %e, "Automatic restart failed");
        }
    }

    pub(super) async fn shutdown_locked(&self, control: &mut Control) -> SupervisorResult<()> {
        if control.shut_down {
            return Ok(());
        }
        info!("Shutting down gateway supervisor");

        self.supersede_recovery(control);
        let result = match self.do_stop(control, CommandSource::Local).await {
            Ok(_) | Err(SupervisorError::NotRunning) => Ok(()),
            Err(e) => Err(e),
        };
        control.shut_down = true;
        result
    }
}
