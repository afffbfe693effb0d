//! Health monitor: periodic sampling and crash detection.
//!
//! The monitor runs as one background task. On every tick it asks the
//! [`MonitoredService`] what to look at; when the service is Running it
//! samples resources and publishes a fresh [`HealthSnapshot`]. Between ticks it
//! also waits on the observed process's exit, so an unexpected exit is
//! reported immediately rather than up to one interval later.
//!
//! The monitor never starts anything itself. Exits and stability
//! confirmations are reported back to the service, which decides what to do
//! under its own control lock.

use crate::sampler::{sample_with_timeout, ResourceSampler};
use crate::HealthSnapshot;
use async_trait::async_trait;
use gwsup_process::{ExitInfo, ProcessWatch};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the monitor should look at on this tick.
#[derive(Debug, Clone)]
pub struct Observation {
    /// Launch generation; lets the service ignore reports about a process
    /// it has already replaced.
    pub generation: u64,
    pub process: ProcessWatch,
    pub port: Option<u16>,
    /// Recovery attempts are pending a stable-run confirmation.
    pub awaiting_stability: bool,
}

/// The service side of the monitor.
#[async_trait]
pub trait MonitoredService: Send + Sync + 'static {
    /// Lock-free look at the service. `None` unless it is Running.
    fn observe(&self) -> Option<Observation>;

    /// Publish a snapshot taken for `generation`.
    fn publish(&self, generation: u64, snapshot: HealthSnapshot);

    /// The process of `generation` exited while observed as Running.
    async fn report_exit(&self, generation: u64, exit: ExitInfo);

    /// The process of `generation` has stayed up past the grace period.
    async fn report_stable(&self, generation: u64);
}

/// Monitor timing.
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    pub interval: Duration,
    /// Upper bound on one resource query.
    pub sample_timeout: Duration,
    /// Uptime after which a launch counts as stable.
    pub stable_after: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            sample_timeout: Duration::from_secs(1),
            stable_after: Duration::from_secs(5),
        }
    }
}

/// Background health monitor.
pub struct HealthMonitor {
    config: HealthMonitorConfig,
    sampler: Arc<dyn ResourceSampler>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl HealthMonitor {
    pub fn new(config: HealthMonitorConfig, sampler: Arc<dyn ResourceSampler>) -> Self {
        Self {
            config,
            sampler,
            wake: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Notifying this runs a pass right away instead of at the next tick.
    pub fn waker(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    /// Start the background loop. The loop ends on [`stop`](Self::stop) or
    /// once the service has been dropped.
    pub fn start(&mut self, service: Weak<dyn MonitoredService>) {
        if self.task_handle.is_some() {
            warn!("Health monitor already started");
            return;
        }

        let config = self.config.clone();
        let sampler = Arc::clone(&self.sampler);
        let wake = Arc::clone(&self.wake);
        let cancel = self.cancel.child_token();

        self.task_handle = Some(tokio::spawn(async move {
            Self::run_loop(service, sampler, config, wake, cancel).await;
        }));

        info!(interval = ?self.config.interval, "Health monitor started");
    }

    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task_handle.take() {
            task.abort();
            debug!("Health monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|t| !t.is_finished())
    }

    async fn run_loop(
        service: Weak<dyn MonitoredService>,
        sampler: Arc<dyn ResourceSampler>,
        config: HealthMonitorConfig,
        wake: Arc<Notify>,
        cancel: CancellationToken,
    ) {
        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut watched: Option<ProcessWatch> = None;

        loop {
            let exited = async {
                match watched.as_mut() {
                    Some(process) => process.wait().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = wake.notified() => debug!("Health monitor woken"),
                _ = exited => debug!("Gateway exit observed between ticks"),
            }

            let Some(service) = service.upgrade() else {
                debug!("Monitored service dropped, health monitor exiting");
                break;
            };

            watched = Self::check(service.as_ref(), &sampler, &config).await;
        }
    }

    /// One monitoring pass. Returns the process to keep watching, if any.
    pub async fn check(
        service: &dyn MonitoredService,
        sampler: &Arc<dyn ResourceSampler>,
        config: &HealthMonitorConfig,
    ) -> Option<ProcessWatch> {
        let observation = service.observe()?;
        let pid = observation.process.pid();

        if let Some(exit) = observation.process.exit_info() {
            warn!(pid, exit = %exit, "Gateway exited unexpectedly");
            service.report_exit(observation.generation, exit).await;
            return None;
        }

        let sample = sample_with_timeout(sampler, pid, config.sample_timeout).await;
        let snapshot = HealthSnapshot::running(&observation.process, observation.port, sample);
        debug!(
            pid,
            uptime = ?snapshot.uptime_seconds,
            memory_mb = ?snapshot.memory_mb,
            cpu_percent = ?snapshot.cpu_percent,
            "Gateway health sampled"
        );
        service.publish(observation.generation, snapshot);

        if observation.awaiting_stability && observation.process.uptime() >= config.stable_after {
            service.report_stable(observation.generation).await;
        }

        Some(observation.process)
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
