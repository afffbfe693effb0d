//! # gwsup-process-state
//!
//! Lifecycle state machine of the supervised gateway.
//!
//! ```text
//! Stopped ──► Starting ──► Running ──► Stopping ──► Stopped
//!    ▲           │            │           ▲
//!    └───────────┘            ▼           │
//!    (launch failed)       Crashed ───────┘
//!                             │
//!                             └──► Starting (recovery or explicit command)
//! ```

use chrono::{DateTime, Utc};
use gwsup_common::{SupervisorError, SupervisorResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

const MAX_HISTORY: usize = 100;

/// State of the supervised gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    /// No process. Initial state.
    Stopped,
    /// Launch in progress.
    Starting,
    /// Process launched and alive.
    Running,
    /// Termination in progress.
    Stopping,
    /// Process exited unexpectedly and has not been relaunched yet.
    Crashed,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Stopped => write!(f, "stopped"),
            ServiceState::Starting => write!(f, "starting"),
            ServiceState::Running => write!(f, "running"),
            ServiceState::Stopping => write!(f, "stopping"),
            ServiceState::Crashed => write!(f, "crashed"),
        }
    }
}

impl ServiceState {
    /// Starting or Stopping.
    pub fn is_transitional(&self) -> bool {
        matches!(self, ServiceState::Starting | ServiceState::Stopping)
    }

    /// States from which `start` is accepted.
    pub fn can_start(&self) -> bool {
        matches!(self, ServiceState::Stopped | ServiceState::Crashed)
    }

    /// States from which `stop` is accepted.
    pub fn can_stop(&self) -> bool {
        matches!(
            self,
            ServiceState::Starting | ServiceState::Running | ServiceState::Crashed
        )
    }

    /// States from which `kill` has something to do.
    pub fn can_kill(&self) -> bool {
        !matches!(self, ServiceState::Stopped)
    }
}

/// One recorded transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: ServiceState,
    pub to_state: ServiceState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// State machine with a bounded transition history.
#[derive(Debug, Clone)]
pub struct ServiceStateMachine {
    current_state: ServiceState,
    history: VecDeque<StateTransition>,
    last_transition_time: DateTime<Utc>,
}

impl Default for ServiceStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: ServiceState::Stopped,
            history: VecDeque::with_capacity(MAX_HISTORY),
            last_transition_time: Utc::now(),
        }
    }

    pub fn current_state(&self) -> ServiceState {
        self.current_state
    }

    pub fn last_transition_time(&self) -> DateTime<Utc> {
        self.last_transition_time
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.history.back()
    }

    /// Oldest first.
    pub fn history(&self) -> impl Iterator<Item = &StateTransition> {
        self.history.iter()
    }

    pub fn is_valid_transition(&self, target: ServiceState) -> bool {
        use ServiceState::*;

        matches!(
            (self.current_state, target),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopping)
                // launch failed: back to where the start came from
                | (Starting, Stopped)
                | (Starting, Crashed)
                | (Running, Stopping)
                | (Running, Crashed)
                | (Stopping, Stopped)
                | (Crashed, Starting)
                | (Crashed, Stopping)
        )
    }

    pub fn transition_to(&mut self, target: ServiceState, reason: impl Into<String>) -> SupervisorResult<()> {
        if !self.is_valid_transition(target) {
            return Err(SupervisorError::Internal(format!(
                "invalid state transition {} -> {}",
                self.current_state, target
            )));
        }

        let now = Utc::now();
        let reason = reason.into();

        tracing::debug!(
            from = %self.current_state,
            to = %target,
            reason = %reason,
            "Gateway state transition"
        );

        if self.history.len() == MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(StateTransition {
            from_state: self.current_state,
            to_state: target,
            timestamp: now,
            reason: Some(reason),
        });

        self.current_state = target;
        self.last_transition_time = now;
        Ok(())
    }

    /// Number of recorded transitions into `state`.
    pub fn count_transitions_to(&self, state: ServiceState) -> usize {
        self.history.iter().filter(|t| t.to_state == state).count()
    }
}
