//! Termination signals.
//!
//! All functions are PID based: the child itself is owned by its reaper task
//! (see [`crate::handle`]), so signalling never needs the `Child`. Whole-group
//! signalling for the supervised gateway lives in [`crate::group`].

use gwsup_common::{SupervisorError, SupervisorResult};

/// Ask a process to exit (SIGTERM on Unix, Ctrl+Break on Windows).
pub fn terminate_gracefully(pid: u32) -> SupervisorResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|e| SupervisorError::signal(pid, format!("SIGTERM: {}", e)))
    }

    #[cfg(windows)]
    {
        use windows::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};

        // Works because the gateway is spawned in its own process group.
        unsafe {
            GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid)
                .map_err(|e| SupervisorError::signal(pid, format!("Ctrl+Break: {}", e)))
        }
    }
}

/// Kill a process outright (SIGKILL on Unix, TerminateProcess on Windows).
pub fn force_kill(pid: u32) -> SupervisorResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), Signal::SIGKILL)
            .map_err(|e| SupervisorError::signal(pid, format!("SIGKILL: {}", e)))
    }

    #[cfg(windows)]
    {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        unsafe {
            let handle = match OpenProcess(PROCESS_TERMINATE, false, pid) {
                Ok(h) if !h.is_invalid() => h,
                Ok(_) => {
                    return Err(SupervisorError::signal(pid, "invalid process handle"));
                }
                Err(e) => {
                    return Err(SupervisorError::signal(pid, format!("OpenProcess: {}", e)));
                }
            };

            let result = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);

            result.map_err(|e| SupervisorError::signal(pid, format!("TerminateProcess: {}", e)))
        }
    }
}

/// Send `signal` to every process in group `pgid`. An empty group is not an
/// error.
#[cfg(unix)]
pub fn signal_group(pgid: u32, signal: nix::sys::signal::Signal) -> SupervisorResult<()> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    // killpg(0) would address the supervisor's own group.
    if pgid <= 1 || pgid > i32::MAX as u32 {
        return Err(SupervisorError::signal(pgid, format!("refusing to signal process group {}", pgid)));
    }

    match killpg(Pid::from_raw(pgid as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(SupervisorError::signal(
            pgid,
            format!("{} to process group: {}", signal.as_str(), e),
        )),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;

    #[test]
    fn test_signal_group_refuses_own_and_init_groups() {
        assert!(signal_group(0, Signal::SIGTERM).is_err());
        assert!(signal_group(1, Signal::SIGTERM).is_err());
    }

    #[test]
    fn test_signal_vanished_group_is_ok() {
        // Far above any default pid_max, so no such group exists.
        assert!(signal_group(i32::MAX as u32 - 1, Signal::SIGKILL).is_ok());
    }
}
