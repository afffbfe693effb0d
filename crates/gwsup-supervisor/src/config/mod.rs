//! Supervisor configuration (YAML).
//!
//! ```yaml
//! supervisor:
//!   log_level: info
//! gateway:
//!   command: openclaw
//!   args: [gateway, --port, "18789"]
//!   port: 18789
//!   env_file: /home/me/.openclaw/env
//!   graceful_timeout: 5s
//! monitoring:
//!   interval: 3s
//! recovery:
//!   max_attempts: 3
//!   initial_delay: 1s
//!   backoff_multiplier: 2.0
//!   max_delay: 30s
//! logs:
//!   file: /var/log/gwsup/gateway.log
//!   max_file_bytes: 10485760
//! ```

use anyhow::{Context, Result};
use gwsup_log_collection::LogCollectorConfig;
use gwsup_monitoring::HealthMonitorConfig;
use gwsup_process::LaunchSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod env_file;
pub mod validation;

/// Port the gateway listens on unless configured otherwise.
pub const DEFAULT_GATEWAY_PORT: u16 = 18789;

/// Lines returned by `logs` when the caller does not say.
pub const DEFAULT_LOG_LINES: usize = 100;

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub supervisor: SupervisorOptions,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub logs: LogsConfig,
}

/// Options for the supervisor process itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorOptions {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// How to launch and stop the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// `KEY=VALUE` file merged into the environment; `environment` wins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_file: Option<PathBuf>,
    /// Listening port; `None` disables port readiness and occupancy checks.
    #[serde(default = "default_port")]
    pub port: Option<u16>,
    #[serde(default = "default_graceful_timeout", with = "duration_serde")]
    pub graceful_timeout: Duration,
    #[serde(default = "default_startup_timeout", with = "duration_serde")]
    pub startup_timeout: Duration,
    #[serde(default = "default_true")]
    pub wait_for_port: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            working_directory: None,
            environment: HashMap::new(),
            env_file: None,
            port: default_port(),
            graceful_timeout: default_graceful_timeout(),
            startup_timeout: default_startup_timeout(),
            wait_for_port: true,
        }
    }
}

impl GatewayConfig {
    /// Build the launch spec, reading `env_file` if set.
    /// Output goes to `output_file` when set and is discarded otherwise.
    pub fn launch_spec(&self, output_file: Option<PathBuf>) -> Result<LaunchSpec> {
        let mut env = match self.env_file {
            Some(ref path) => env_file::load(path)?,
            None => HashMap::new(),
        };
        env.extend(self.environment.iter().map(|(k, v)| (k.clone(), v.clone())));

        Ok(LaunchSpec {
            command: self.command.clone(),
            args: self.args.clone(),
            working_dir: self.working_directory.clone(),
            env,
            output_file,
        })
    }
}

/// Health monitor timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_monitor_interval", with = "duration_serde")]
    pub interval: Duration,
    #[serde(default = "default_sample_timeout", with = "duration_serde")]
    pub sample_timeout: Duration,
    /// Set to false where process resource APIs are unavailable.
    #[serde(default = "default_true")]
    pub sample_resources: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval: default_monitor_interval(),
            sample_timeout: default_sample_timeout(),
            sample_resources: true,
        }
    }
}

/// Automatic relaunch after unexpected exits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Automatic relaunches allowed within `window` before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,
    /// Crashes further apart than this start a fresh count.
    #[serde(default = "default_window", with = "duration_serde")]
    pub window: Duration,
    /// Uptime after which a relaunch counts as successful.
    #[serde(default = "default_stable_after", with = "duration_serde")]
    pub stable_after: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay: default_max_delay(),
            window: default_window(),
            stable_after: default_stable_after(),
        }
    }
}

/// Output capture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    /// When false the gateway's output is discarded and `logs` is empty.
    #[serde(default = "default_true")]
    pub capture: bool,
    /// Append-only file the gateway writes stdout and stderr to.
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
    /// Rotate to `<file>.1` before a launch once the file is this large.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_true")]
    pub redact_secrets: bool,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            capture: true,
            file: default_log_file(),
            max_file_bytes: default_max_file_bytes(),
            redact_secrets: true,
        }
    }
}

impl LogsConfig {
    pub fn collector_config(&self) -> LogCollectorConfig {
        LogCollectorConfig {
            file: self.file.clone(),
            redact_secrets: self.redact_secrets,
            max_file_bytes: self.max_file_bytes,
        }
    }
}

impl SupervisorConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: SupervisorConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    pub fn monitor_config(&self) -> HealthMonitorConfig {
        HealthMonitorConfig {
            interval: self.monitoring.interval,
            sample_timeout: self.monitoring.sample_timeout,
            stable_after: self.recovery.stable_after,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_command() -> String {
    "openclaw".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "gateway".to_string(),
        "--port".to_string(),
        DEFAULT_GATEWAY_PORT.to_string(),
    ]
}

fn default_port() -> Option<u16> {
    Some(DEFAULT_GATEWAY_PORT)
}

fn default_true() -> bool {
    true
}

fn default_graceful_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_startup_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_monitor_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_sample_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_window() -> Duration {
    Duration::from_secs(60)
}

fn default_stable_after() -> Duration {
    Duration::from_secs(5)
}

fn default_log_file() -> PathBuf {
    std::env::temp_dir().join("gwsup").join("gateway.log")
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

// Durations are written as "250ms", "5s" or "2m".
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() != 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let invalid = || format!("Invalid duration: {}", s);

        // "ms" before "s" since "ms" ends with 's'
        if let Some(num) = s.strip_suffix("ms") {
            num.trim().parse().map(Duration::from_millis).map_err(|_| invalid())
        } else if let Some(num) = s.strip_suffix('s') {
            num.trim().parse().map(Duration::from_secs).map_err(|_| invalid())
        } else if let Some(num) = s.strip_suffix('m') {
            num.trim()
                .parse::<u64>()
                .map(|mins| Duration::from_secs(mins * 60))
                .map_err(|_| invalid())
        } else {
            Err(format!("Duration must end with 'ms', 's' or 'm': {}", s))
        }
    }
}
