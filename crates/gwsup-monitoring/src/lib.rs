//! # gwsup-monitoring
//!
//! Health monitoring for the supervised gateway:
//! - [`ResourceSampler`] capability with a `sysinfo` implementation
//! - immutable [`HealthSnapshot`] values
//! - the periodic [`HealthMonitor`] loop

pub mod health_monitor;
pub mod sampler;

pub use health_monitor::{HealthMonitor, HealthMonitorConfig, MonitoredService, Observation};
pub use sampler::{sample_with_timeout, NullSampler, ResourceSample, ResourceSampler, SysinfoSampler};

use chrono::{DateTime, Utc};
use gwsup_process::ProcessWatch;
use serde::{Deserialize, Serialize};

/// Point-in-time status of the gateway. Superseded, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub running: bool,
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub uptime_seconds: Option<u64>,
    pub memory_mb: Option<f64>,
    pub cpu_percent: Option<f32>,
    pub timestamp: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Snapshot for a gateway with no live process.
    pub fn not_running(port: Option<u16>) -> Self {
        Self {
            running: false,
            pid: None,
            port,
            uptime_seconds: None,
            memory_mb: None,
            cpu_percent: None,
            timestamp: Utc::now(),
        }
    }

    /// Snapshot for a live process with the given resource sample.
    pub fn running(process: &ProcessWatch, port: Option<u16>, sample: ResourceSample) -> Self {
        Self {
            running: true,
            pid: Some(process.pid()),
            port,
            uptime_seconds: Some(process.uptime().as_secs()),
            memory_mb: sample.memory_mb,
            cpu_percent: sample.cpu_percent,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_running_snapshot_has_nulls() {
        let snapshot = HealthSnapshot::not_running(Some(18789));
        assert!(!snapshot.running);
        assert_eq!(snapshot.port, Some(18789));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["pid"].is_null());
        assert!(json["uptime_seconds"].is_null());
        assert!(json["memory_mb"].is_null());
        assert!(json["cpu_percent"].is_null());
    }
}
