use super::Shared;
use async_trait::async_trait;
use gwsup_monitoring::{HealthSnapshot, MonitoredService, Observation};
use gwsup_process::ExitInfo;
use gwsup_process_state::ServiceState;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
impl MonitoredService for Shared {
    fn observe(&self) -> Option<Observation> {
        self.observed.lock().clone()
    }

    fn publish(&self, generation: u64, snapshot: HealthSnapshot) {
        self.publish_snapshot(generation, snapshot);
    }

    async fn report_exit(&self, generation: u64, exit: ExitInfo) {
        let mut control = self.control.lock().await;

        // A stop, kill or restart got here first.
        if control.shut_down || control.generation != generation || self.state() != ServiceState::Running {
            debug!(generation, current = control.generation, "Ignoring exit of replaced gateway process");
            return;
        }

        let pid = match control.process.take() {
            Some(mut process) => {
                // The leader is gone; anything it started goes with it.
                if let Err(e) = process.terminate(false, Duration::ZERO).await {
                    warn!(pid = process.pid(), error = %e, "Failed to clean up after crashed gateway");
                }
                Some(process.pid())
            }
            None => None,
        };
        warn!(pid = ?pid, exit = %exit, "Gateway crashed");
        control.last_error = Some(format!("gateway exited unexpectedly ({})", exit));

        if let Err(e) = self.transition(&control, ServiceState::Crashed, format!("exited unexpectedly ({})", exit)) {
            warn!(error = %e, "Failed to record crash");
            return;
        }
        self.handle_crash(&mut control);
    }

    async fn report_stable(&self, generation: u64) {
        let mut control = self.control.lock().await;

        if control.generation != generation || self.state() != ServiceState::Running {
            return;
        }
        let Some(uptime) = control.process.as_ref().map(|p| p.watch().uptime()) else {
            return;
        };

        if self.policy.confirm_stable(&mut control.recovery, uptime) {
            if let Some(observed) = self.observed.lock().as_mut() {
                observed.awaiting_stability = false;
            }
            self.publish_control(&control);
        }
    }
}
