//! Error types for the gateway supervisor.
//!
//! Every fallible supervisor operation returns [`SupervisorResult`]. The
//! variants mirror the conditions a caller can observe:
//!
//! - misuse of the command surface (`AlreadyRunning`, `NotRunning`, `Busy`)
//! - launch problems (`LaunchFailure`)
//! - crash loops (`CrashLoopDetected`)
//!
//! Conditions that are absorbed internally (`StopTimeout`, `SampleUnavailable`)
//! still have variants so the lower layers can report them and the supervisor
//! can log them before escalating or degrading.
//!
//! ```rust
//! use gwsup_common::{SupervisorError, SupervisorResult};
//!
//! fn start() -> SupervisorResult<()> {
//!     Err(SupervisorError::already_running("running"))
//! }
//!
//! assert!(matches!(start(), Err(SupervisorError::AlreadyRunning { .. })));
//! ```

use thiserror::Error;

/// Supervisor error variants.
///
/// The enum is `Clone` so that a single outcome can be handed to every
/// waiter of a control operation and stored as the last observed error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SupervisorError {
    #[error("Gateway already running (state: {state})")]
    AlreadyRunning { state: String },

    #[error("Gateway not running")]
    NotRunning,

    #[error("Gateway launch failed: {command} - {reason}")]
    LaunchFailure { command: String, reason: String },

    #[error("Gateway did not stop within {timeout_ms}ms (PID: {pid})")]
    StopTimeout { pid: u32, timeout_ms: u64 },

    #[error("Crash loop detected after {attempts} restart attempts")]
    CrashLoopDetected { attempts: u32 },

    #[error("Resource sample unavailable for PID {pid}: {reason}")]
    SampleUnavailable { pid: u32, reason: String },

    #[error("Control operation in progress: {operation}")]
    Busy { operation: String },

    #[error("Failed to signal PID {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Log output error: {reason}")]
    LogOutput { reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SupervisorError {
    pub fn already_running(state: impl Into<String>) -> Self {
        Self::AlreadyRunning {
            state: state.into(),
        }
    }

    pub fn launch_failure(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LaunchFailure {
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub fn stop_timeout(pid: u32, timeout: std::time::Duration) -> Self {
        Self::StopTimeout {
            pid,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn sample_unavailable(pid: u32, reason: impl Into<String>) -> Self {
        Self::SampleUnavailable {
            pid,
            reason: reason.into(),
        }
    }

    pub fn busy(operation: impl Into<String>) -> Self {
        Self::Busy {
            operation: operation.into(),
        }
    }

    pub fn signal(pid: u32, reason: impl Into<String>) -> Self {
        Self::Signal {
            pid,
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn log_output(reason: impl Into<String>) -> Self {
        Self::LogOutput {
            reason: reason.into(),
        }
    }

    /// True for errors caused by issuing a command in the wrong state.
    pub fn is_state_conflict(&self) -> bool {
        matches!(self, Self::AlreadyRunning { .. } | Self::NotRunning | Self::Busy { .. })
    }
}

/// Result type for supervisor operations.
pub type SupervisorResult<T> = std::result::Result<T, SupervisorError>;
