//! Chat-style remote commands.
//!
//! Messaging-channel adapters hand every inbound message to
//! [`RemoteCommandAdapter::handle_message`]. Control commands go through the
//! same [`Supervisor`] entry points as the desktop UI, tagged
//! `CommandSource::Remote`, so serialization and recovery bookkeeping are
//! identical for both callers.
//!
//! | Message | Effect |
//! |---------|--------|
//! | `/start` `/stop` `/restart` `/kill` | control request |
//! | `/status` | one-line status |
//! | `/logs [n]` | last `n` captured lines (default 20) |
//! | `/clearport` | kill whatever holds the gateway port |
//! | `/help` | command list |
//!
//! Telegram-style bot suffixes (`/restart@my_bot`) are accepted.

use crate::supervisor::Supervisor;
use gwsup_common::{CommandSource, ControlAction, SupervisorError};
use std::fmt::Write as _;
use tracing::info;

/// Lines returned by `/logs` without an argument.
pub const DEFAULT_REMOTE_LOG_LINES: usize = 20;

/// Upper bound on `/logs n`; chat messages have size limits.
pub const MAX_REMOTE_LOG_LINES: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    Control(ControlAction),
    Status,
    Logs(usize),
    ClearPort,
    Help,
    /// Looked like a command but was not one we know.
    Unknown(String),
}

impl RemoteCommand {
    /// Parse a chat message. `None` when the message is not a command at all.
    pub fn parse(message: &str) -> Option<Self> {
        let mut words = message.trim().split_whitespace();
        let first = words.next()?.strip_prefix('/')?;
        let name = first.split('@').next().unwrap_or(first).to_ascii_lowercase();

        let command = match name.as_str() {
            "start" => RemoteCommand::Control(ControlAction::Start),
            "stop" => RemoteCommand::Control(ControlAction::Stop),
            "restart" => RemoteCommand::Control(ControlAction::Restart),
            "kill" => RemoteCommand::Control(ControlAction::Kill),
            "status" => RemoteCommand::Status,
            "help" => RemoteCommand::Help,
            "clearport" => RemoteCommand::ClearPort,
            "logs" => match words.next() {
                None => RemoteCommand::Logs(DEFAULT_REMOTE_LOG_LINES),
                Some(n) => match n.parse::<usize>() {
                    Ok(n) => RemoteCommand::Logs(n.min(MAX_REMOTE_LOG_LINES)),
                    Err(_) => RemoteCommand::Unknown(format!("logs {}", n)),
                },
            },
            _ => RemoteCommand::Unknown(name),
        };
        Some(command)
    }
}

/// Turns chat messages into supervisor calls and text replies.
#[derive(Debug, Clone)]
pub struct RemoteCommandAdapter {
    supervisor: Supervisor,
}

impl RemoteCommandAdapter {
    pub fn new(supervisor: Supervisor) -> Self {
        Self { supervisor }
    }

    /// Handle one inbound message. `None` when the message is not a command
    /// and should be passed on untouched.
    pub async fn handle_message(&self, message: &str) -> Option<String> {
        let command = RemoteCommand::parse(message)?;
        info!(?command, "Remote command received");
        Some(self.execute(command).await)
    }

    pub async fn execute(&self, command: RemoteCommand) -> String {
        match command {
            RemoteCommand::Control(action) => self.control(action).await,
            RemoteCommand::Status => self.status_line(),
            RemoteCommand::Logs(lines) => self.logs(lines),
            RemoteCommand::ClearPort => self.clear_port().await,
            RemoteCommand::Help => help_text(),
            RemoteCommand::Unknown(name) => format!("Unknown command: /{}\n\n{}", name, help_text()),
        }
    }

    async fn control(&self, action: ControlAction) -> String {
        let source = CommandSource::Remote;
        let result = match action {
            ControlAction::Start => self.supervisor.start(source).await,
            ControlAction::Stop => self.supervisor.stop(source).await,
            ControlAction::Restart => self.supervisor.restart(source).await,
            ControlAction::Kill => self.supervisor.kill(source).await,
        };

        match result {
            Ok(ack) => {
                let verb = match action {
                    ControlAction::Start => "started",
                    ControlAction::Stop => "stopped",
                    ControlAction::Restart => "restarted",
                    ControlAction::Kill => "killed",
                };
                match (action, ack.pid) {
                    (ControlAction::Start | ControlAction::Restart, Some(pid)) => {
                        format!("Gateway {} (pid {})", verb, pid)
                    }
                    (ControlAction::Kill, None) => "Gateway was not running".to_string(),
                    _ => format!("Gateway {}", verb),
                }
            }
            Err(SupervisorError::NotRunning) => "Gateway is not running".to_string(),
            Err(SupervisorError::AlreadyRunning { state }) => {
                format!("Gateway is already running (state: {})", state)
            }
            Err(e) => format!("Failed to {} gateway: {}", action, e),
        }
    }

    async fn clear_port(&self) -> String {
        match self.supervisor.kill_port_occupants(CommandSource::Remote).await {
            Ok(cleanup) => {
                let mut reply = if cleanup.killed.is_empty() {
                    format!("No processes found on port {}", cleanup.port)
                } else {
                    format!("Killed {} process(es) on port {}", cleanup.killed.len(), cleanup.port)
                };
                for (pid, reason) in &cleanup.failed {
                    let _ = write!(reply, "\nCould not kill pid {}: {}", pid, reason);
                }
                if !cleanup.released {
                    let _ = write!(reply, "\nPort {} is still in use", cleanup.port);
                }
                reply
            }
            Err(e) => format!("Failed to clear port: {}", e),
        }
    }

    fn status_line(&self) -> String {
        let status = self.supervisor.detailed_status();
        let snapshot = &status.snapshot;
        let mut line = format!("Gateway {}", status.state);

        if let Some(pid) = snapshot.pid {
            let _ = write!(line, " | pid {}", pid);
        }
        if let Some(port) = snapshot.port {
            let _ = write!(line, " | port {}", port);
        }
        if let Some(uptime) = snapshot.uptime_seconds {
            let _ = write!(line, " | up {}", format_uptime(uptime));
        }
        if let Some(memory) = snapshot.memory_mb {
            let _ = write!(line, " | mem {:.1} MB", memory);
        }
        if let Some(cpu) = snapshot.cpu_percent {
            let _ = write!(line, " | cpu {:.1}%", cpu);
        }
        if status.restart_attempts > 0 {
            let _ = write!(line, " | restarts {}", status.restart_attempts);
        }
        if status.crash_loop_detected {
            line.push_str("\nCrash loop detected, automatic restarts stopped. Send /restart to try again.");
        } else if let Some(ref error) = status.last_error {
            let _ = write!(line, "\nLast error: {}", error);
        }
        line
    }

    fn logs(&self, lines: usize) -> String {
        let logs = self.supervisor.logs(Some(lines));
        if logs.is_empty() {
            "No captured output".to_string()
        } else {
            logs.join("\n")
        }
    }
}

fn help_text() -> String {
    [
        "/status - gateway status",
        "/start - start the gateway",
        "/stop - stop the gateway",
        "/restart - restart the gateway",
        "/kill - force-kill the gateway",
        "/logs [n] - last n lines of gateway output",
        "/clearport - kill processes holding the gateway port",
    ]
    .join("\n")
}

fn format_uptime(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);
    if h > 0 {
        format!("{}h{:02}m", h, m)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}
