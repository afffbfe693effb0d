//! Handle to one launched gateway process.
//!
//! Ownership of the `tokio::process::Child` moves into a reaper task right
//! after spawn. The reaper waits for exit and publishes an [`ExitInfo`]
//! through a `watch` channel. Liveness checks never block, and observers
//! hold a cheap [`ProcessWatch`] without touching the control path.

use crate::check::process_exists;
use crate::group::ProcessGroup;
use chrono::{DateTime, Utc};
use gwsup_common::{SupervisorError, SupervisorResult};
use std::collections::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long to wait for the reaper after SIGKILL.
pub const FORCE_KILL_TIMEOUT: Duration = Duration::from_secs(3);

const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Everything needed to launch the gateway.
#[derive(Debug, Clone, Default)]
pub struct LaunchSpec {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
    /// Append stdout and stderr to this file. The gateway owns the
    /// descriptors, so it keeps running if the supervisor goes away. Both
    /// streams go to the null device when unset.
    pub output_file: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    /// Command line for log messages.
    pub fn display_command(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// How a process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    /// Terminating signal (Unix only).
    pub signal: Option<i32>,
    pub exited_at: DateTime<Utc>,
}

impl ExitInfo {
    fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
            exited_at: Utc::now(),
        }
    }

    fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
            exited_at: Utc::now(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// Cheap, cloneable view of a launched process.
#[derive(Debug, Clone)]
pub struct ProcessWatch {
    pid: u32,
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
}

impl ProcessWatch {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Non-blocking liveness check.
    pub fn is_alive(&self) -> bool {
        self.exit_rx.borrow().is_none()
    }

    pub fn exit_info(&self) -> Option<ExitInfo> {
        self.exit_rx.borrow().clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at_utc
    }

    /// Wait for the process to exit.
    ///
    /// Returns `None` only if the reaper went away without reporting.
    pub async fn wait(&mut self) -> Option<ExitInfo> {
        match self.exit_rx.wait_for(Option::is_some).await {
            Ok(exit) => exit.clone(),
            Err(_) => None,
        }
    }

    /// Wait up to `timeout` for the process to exit.
    ///
    /// Returns `None` if it is still running when the timeout elapses.
    pub async fn wait_for_exit(&mut self, timeout: Duration) -> Option<ExitInfo> {
        let waited = tokio::time::timeout(timeout, self.exit_rx.wait_for(Option::is_some)).await;
        match waited {
            Ok(Ok(exit)) => exit.clone(),
            _ => None,
        }
    }
}

/// Result of [`ProcessHandle::terminate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The process had already exited before any signal was sent.
    AlreadyExited(ExitInfo),
    /// Exited after the polite signal.
    Graceful(ExitInfo),
    /// Exited after the forced kill.
    Forced(ExitInfo),
}

impl Termination {
    pub fn exit_info(&self) -> &ExitInfo {
        match self {
            Termination::AlreadyExited(e) | Termination::Graceful(e) | Termination::Forced(e) => e,
        }
    }

    pub fn was_forced(&self) -> bool {
        matches!(self, Termination::Forced(_))
    }
}

/// One launched OS process and the processes it started.
pub struct ProcessHandle {
    command: String,
    watch: ProcessWatch,
    group: ProcessGroup,
    reaper: JoinHandle<()>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("command", &self.command)
            .field("pid", &self.watch.pid)
            .field("alive", &self.watch.is_alive())
            .finish()
    }
}

impl ProcessHandle {
    /// Spawn the process described by `spec`.
    ///
    /// stdin is always the null device. stdout/stderr are appended to
    /// `output_file` when set and discarded otherwise; the supervisor's own
    /// streams are never inherited and no pipe links the two processes. The
    /// gateway leads a new process group. Must be called inside a tokio
    /// runtime.
    pub fn launch(spec: &LaunchSpec) -> SupervisorResult<Self> {
        let command_line = spec.display_command();
        info!(command = %command_line, "Launching gateway process");

        let mut cmd = std::process::Command::new(&spec.command);
        cmd.args(&spec.args);

        if let Some(ref wd) = spec.working_dir {
            cmd.current_dir(wd);
        }

        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let (stdout, stderr) = match spec.output_file {
            Some(ref path) => {
                let file = open_output(path)
                    .map_err(|e| SupervisorError::launch_failure(&command_line, format!("{}: {}", path.display(), e)))?;
                let err_file = file
                    .try_clone()
                    .map_err(|e| SupervisorError::launch_failure(&command_line, format!("{}: {}", path.display(), e)))?;
                (Stdio::from(file), Stdio::from(err_file))
            }
            None => (Stdio::null(), Stdio::null()),
        };
        cmd.stdin(Stdio::null()).stdout(stdout).stderr(stderr);

        // Own process group: terminal signals aimed at the supervisor do not
        // reach the gateway, and stop/kill can address the whole tree.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
        }

        let mut child = Command::from(cmd)
            .spawn()
            .map_err(|e| SupervisorError::launch_failure(&command_line, e.to_string()))?;

        let pid = child.id().ok_or_else(|| {
            SupervisorError::launch_failure(&command_line, "process exited before a PID was assigned")
        })?;
        let group = ProcessGroup::attach(pid);

        let (exit_tx, exit_rx) = watch::channel(None);
        let reaper = tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => ExitInfo::from_status(status),
                Err(e) => {
                    warn!(pid, error = %e, "Failed to wait for gateway process");
                    ExitInfo::unknown()
                }
            };
            debug!(pid, exit = %exit, "Gateway process reaped");
            let _ = exit_tx.send(Some(exit));
        });

        info!(pid, command = %command_line, "Gateway process spawned");

        Ok(Self {
            command: command_line,
            watch: ProcessWatch {
                pid,
                started_at: Instant::now(),
                started_at_utc: Utc::now(),
                exit_rx,
            },
            group,
            reaper,
        })
    }

    pub fn pid(&self) -> u32 {
        self.watch.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Non-blocking liveness check of the gateway itself.
    pub fn is_alive(&self) -> bool {
        self.watch.is_alive()
    }

    pub fn watch(&self) -> ProcessWatch {
        self.watch.clone()
    }

    pub fn group(&self) -> &ProcessGroup {
        &self.group
    }

    /// Terminate the gateway and everything it started.
    ///
    /// With `graceful`, sends the polite signal to the whole group and waits
    /// up to `timeout`; if the gateway is still alive the forced kill follows
    /// unconditionally. Without `graceful`, kills immediately. Members that
    /// outlive the gateway are killed once the timeout is used up. The only
    /// error is a gateway that survives the forced kill for
    /// [`FORCE_KILL_TIMEOUT`].
    pub async fn terminate(&mut self, graceful: bool, timeout: Duration) -> SupervisorResult<Termination> {
        let pid = self.pid();
        let deadline = Instant::now() + timeout;

        if let Some(exit) = self.watch.exit_info() {
            debug!(pid, exit = %exit, "Gateway already exited");
            self.kill_stragglers();
            return Ok(Termination::AlreadyExited(exit));
        }

        if graceful {
            match self.group.terminate() {
                Ok(()) => debug!(pid, ?timeout, "Sent graceful termination signal"),
                Err(e) => warn!(pid, error = %e, "Graceful termination signal failed"),
            }

            if let Some(exit) = self.watch.wait_for_exit(timeout).await {
                info!(pid, exit = %exit, "Gateway exited gracefully");
                self.wait_for_group(deadline).await;
                return Ok(Termination::Graceful(exit));
            }

            let err = SupervisorError::stop_timeout(pid, timeout);
            warn!(pid, error = %err, "Escalating to forced kill");
        }

        if let Err(e) = self.group.kill() {
            // Losing the race with a natural exit is fine; anything else is worth a warning.
            if process_exists(pid).unwrap_or(true) {
                warn!(pid, error = %e, "Forced kill failed");
            } else {
                debug!(pid, error = %e, "Process vanished before forced kill");
            }
        }

        match self.watch.wait_for_exit(FORCE_KILL_TIMEOUT).await {
            Some(exit) => {
                info!(pid, exit = %exit, "Gateway killed");
                Ok(Termination::Forced(exit))
            }
            None => Err(SupervisorError::stop_timeout(pid, FORCE_KILL_TIMEOUT)),
        }
    }

    /// Give the rest of the group until `deadline` to follow the gateway out.
    async fn wait_for_group(&self, deadline: Instant) {
        while self.group.has_members() && Instant::now() < deadline {
            tokio::time::sleep(GROUP_POLL_INTERVAL).await;
        }
        self.kill_stragglers();
    }

    fn kill_stragglers(&self) {
        if !self.group.has_members() {
            return;
        }
        debug!(pid = self.pid(), "Killing processes left behind by the gateway");
        if let Err(e) = self.group.kill() {
            warn!(pid = self.pid(), error = %e, "Failed to kill leftover gateway processes");
        }
    }

    /// True once the exit status has been collected.
    pub fn is_reaped(&self) -> bool {
        self.reaper.is_finished()
    }
}

fn open_output(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
