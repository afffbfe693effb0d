//! Command types shared by every caller of the supervisor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Control action requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Stop,
    Restart,
    Kill,
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlAction::Start => write!(f, "start"),
            ControlAction::Stop => write!(f, "stop"),
            ControlAction::Restart => write!(f, "restart"),
            ControlAction::Kill => write!(f, "kill"),
        }
    }
}

/// Where a control request came from.
///
/// `Recovery` is only produced internally when the recovery policy relaunches
/// a crashed gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandSource {
    /// Local desktop UI.
    Local,
    /// Messaging-channel command such as `/restart`.
    Remote,
    /// Automatic relaunch after an unexpected exit.
    Recovery,
}

impl CommandSource {
    /// Explicit sources reset recovery bookkeeping.
    pub fn is_explicit(&self) -> bool {
        !matches!(self, CommandSource::Recovery)
    }
}

impl fmt::Display for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSource::Local => write!(f, "local"),
            CommandSource::Remote => write!(f, "remote"),
            CommandSource::Recovery => write!(f, "recovery"),
        }
    }
}

/// Monotonic request identifier, unique within one supervisor process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    pub fn next() -> Self {
        Self(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// One control command. Created per call and dropped once answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    pub action: ControlAction,
    pub source: CommandSource,
    pub request_id: RequestId,
}

impl ControlRequest {
    pub fn new(action: ControlAction, source: CommandSource) -> Self {
        Self {
            action,
            source,
            request_id: RequestId::next(),
        }
    }
}

/// Successful completion of a control request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub request_id: RequestId,
    pub action: ControlAction,
    /// PID of the gateway after the command, if one is running.
    pub pid: Option<u32>,
}
