//! Resource sampling behind a small capability trait.
//!
//! The supervisor only sees [`ResourceSampler`]; which OS API answers the
//! query is the sampler's business. Failures never propagate: the async
//! wrapper [`sample_with_timeout`] turns errors, panics and slow queries into
//! an empty [`ResourceSample`].

use gwsup_common::{SupervisorError, SupervisorResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, System};
use tracing::{debug, warn};

/// Memory and CPU usage of one process. `None` means not measurable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub memory_mb: Option<f64>,
    pub cpu_percent: Option<f32>,
}

/// Answers `sample(pid) -> {memory, cpu}`.
///
/// Implementations may block briefly; they are always called from a
/// blocking task.
pub trait ResourceSampler: Send + Sync + 'static {
    fn sample(&self, pid: u32) -> SupervisorResult<ResourceSample>;
}

/// Cross-platform sampler backed by `sysinfo`.
///
/// Keeps one `System` between calls: CPU usage is computed from the delta
/// since the previous refresh, so the first sample of a new process reads 0.
pub struct SysinfoSampler {
    system: Mutex<System>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SysinfoSampler {
    fn sample(&self, pid: u32) -> SupervisorResult<ResourceSample> {
        let mut system = self.system.lock();
        let sysinfo_pid = Pid::from_u32(pid);

        // Without an explicit refresh kind sysinfo returns stale zeros.
        let found = system.refresh_process_specifics(
            sysinfo_pid,
            ProcessRefreshKind::new().with_memory().with_cpu(),
        );
        if !found {
            return Err(SupervisorError::sample_unavailable(pid, "process not visible to sysinfo"));
        }

        let process = system
            .process(sysinfo_pid)
            .ok_or_else(|| SupervisorError::sample_unavailable(pid, "process disappeared"))?;

        let memory_mb = process.memory() as f64 / 1024.0 / 1024.0;
        let cpu_percent = process.cpu_usage();

        debug!(pid, memory_mb, cpu_percent, "Sampled gateway resources");

        Ok(ResourceSample {
            memory_mb: Some(memory_mb),
            cpu_percent: Some(cpu_percent),
        })
    }
}

/// Sampler for environments where resource APIs are unavailable or
/// intentionally disabled. Every sample is empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSampler;

impl ResourceSampler for NullSampler {
    fn sample(&self, pid: u32) -> SupervisorResult<ResourceSample> {
        Err(SupervisorError::sample_unavailable(pid, "resource sampling disabled"))
    }
}

/// Run `sampler` on the blocking pool with an upper bound on latency.
pub async fn sample_with_timeout(
    sampler: &Arc<dyn ResourceSampler>,
    pid: u32,
    timeout: Duration,
) -> ResourceSample {
    let sampler = Arc::clone(sampler);
    let task = tokio::task::spawn_blocking(move || sampler.sample(pid));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(sample))) => sample,
        Ok(Ok(Err(e))) => {
            debug!(pid, error = %e, "Resource sample unavailable");
            ResourceSample::default()
        }
        Ok(Err(e)) => {
            warn!(pid, error = %e, "Resource sampler task failed");
            ResourceSample::default()
        }
        Err(_) => {
            debug!(pid, ?timeout, "Resource sample timed out");
            ResourceSample::default()
        }
    }
}
