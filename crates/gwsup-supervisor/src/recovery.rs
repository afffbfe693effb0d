//! Automatic relaunch policy.
//!
//! [`RecoveryPolicy`] is pure bookkeeping: it looks at a crash and the
//! [`RecoveryContext`] and says whether to relaunch and after what delay.
//! Sleeping and relaunching are the supervisor's job, done through the same
//! control path as every other start.

use crate::config::RecoveryConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of one crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// Relaunch after `delay`. `attempt` is 1-based.
    Restart { attempt: u32, delay: Duration },
    /// Ceiling reached; wait for an explicit command.
    CrashLoop { attempts: u32 },
    /// Automatic recovery is turned off.
    Disabled,
}

/// Restart bookkeeping for the current run of crashes.
#[derive(Debug, Clone, Default)]
pub struct RecoveryContext {
    restart_attempts: u32,
    last_crash: Option<Instant>,
    last_crash_time: Option<DateTime<Utc>>,
    backoff_delay: Option<Duration>,
    crash_loop_detected: bool,
}

impl RecoveryContext {
    pub fn restart_attempts(&self) -> u32 {
        self.restart_attempts
    }

    pub fn last_crash_time(&self) -> Option<DateTime<Utc>> {
        self.last_crash_time
    }

    /// Delay chosen for the most recent automatic relaunch.
    pub fn backoff_delay(&self) -> Option<Duration> {
        self.backoff_delay
    }

    pub fn crash_loop_detected(&self) -> bool {
        self.crash_loop_detected
    }

    /// Automatic relaunches are waiting for a stable run.
    pub fn awaiting_stability(&self) -> bool {
        self.restart_attempts > 0
    }

    /// Forget everything; used on stable runs and explicit commands.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn stats(&self) -> RecoveryStats {
        RecoveryStats {
            restart_attempts: self.restart_attempts,
            last_crash_time: self.last_crash_time,
            backoff_delay_ms: self.backoff_delay.map(|d| d.as_millis() as u64),
            crash_loop_detected: self.crash_loop_detected,
        }
    }
}

/// Serializable view of a [`RecoveryContext`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryStats {
    pub restart_attempts: u32,
    pub last_crash_time: Option<DateTime<Utc>>,
    pub backoff_delay_ms: Option<u64>,
    pub crash_loop_detected: bool,
}

/// Decides what happens after an unexpected exit.
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    config: RecoveryConfig,
}

impl RecoveryPolicy {
    pub fn new(config: RecoveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Record a crash at `now` and decide on a relaunch.
    pub fn on_crash(&self, context: &mut RecoveryContext, now: Instant) -> RecoveryDecision {
        if !self.config.enabled {
            debug!("Automatic recovery disabled");
            context.last_crash = Some(now);
            context.last_crash_time = Some(Utc::now());
            return RecoveryDecision::Disabled;
        }

        if let Some(previous) = context.last_crash {
            if now.saturating_duration_since(previous) > self.config.window {
                debug!(
                    attempts = context.restart_attempts,
                    window = ?self.config.window,
                    "Previous crash outside recovery window, starting a fresh count"
                );
                context.restart_attempts = 0;
                context.crash_loop_detected = false;
            }
        }

        context.last_crash = Some(now);
        context.last_crash_time = Some(Utc::now());

        if context.restart_attempts >= self.config.max_attempts {
            warn!(
                attempts = context.restart_attempts,
                max_attempts = self.config.max_attempts,
                "Restart ceiling reached, crash loop detected"
            );
            context.crash_loop_detected = true;
            context.backoff_delay = None;
            return RecoveryDecision::CrashLoop {
                attempts: context.restart_attempts,
            };
        }

        let delay = self.backoff(context.restart_attempts);
        context.restart_attempts += 1;
        context.backoff_delay = Some(delay);

        info!(
            attempt = context.restart_attempts,
            max_attempts = self.config.max_attempts,
            ?delay,
            "Scheduling automatic restart"
        );

        RecoveryDecision::Restart {
            attempt: context.restart_attempts,
            delay,
        }
    }

    /// Delay before relaunch number `attempt + 1`: exponential, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay.as_secs_f64();
        let multiplier = self.config.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let capped = (base * multiplier).min(self.config.max_delay.as_secs_f64());

        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.config.max_delay
        }
    }

    /// A relaunched process stayed up long enough. Returns true if the
    /// context was reset.
    pub fn confirm_stable(&self, context: &mut RecoveryContext, uptime: Duration) -> bool {
        if !context.awaiting_stability() || uptime < self.config.stable_after {
            return false;
        }

        info!(
            attempts = context.restart_attempts,
            ?uptime,
            "Gateway stable after automatic restart, resetting recovery counters"
        );
        context.reset();
        true
    }
}
