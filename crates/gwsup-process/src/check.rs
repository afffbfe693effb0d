//! Process existence checking.

use gwsup_common::{SupervisorError, SupervisorResult};

/// Check if a process with the given PID exists.
///
/// On Unix this is `kill(pid, 0)`: no signal is delivered, only existence and
/// permission are checked. On Windows it opens a limited query handle.
///
/// # Returns
///
/// * `Ok(true)` - process exists (possibly owned by another user)
/// * `Ok(false)` - no such process
/// * `Err(_)` - the check itself failed
///
/// ```rust,no_run
/// use gwsup_process::process_exists;
///
/// if process_exists(1234).unwrap_or(false) {
///     println!("1234 is alive");
/// }
/// ```
pub fn process_exists(pid: u32) -> SupervisorResult<bool> {
    #[cfg(unix)]
    {
        process_exists_unix(pid)
    }

    #[cfg(windows)]
    {
        process_exists_windows(pid)
    }
}

#[cfg(unix)]
fn process_exists_unix(pid: u32) -> SupervisorResult<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    if pid == 0 || pid > i32::MAX as u32 {
        return Ok(false);
    }

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(Errno::EPERM) => Ok(true),
        Err(e) => Err(SupervisorError::signal(
            pid,
            format!("existence check failed: {}", e),
        )),
    }
}

#[cfg(windows)]
fn process_exists_windows(pid: u32) -> SupervisorResult<bool> {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    unsafe {
        match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
            Ok(handle) => {
                let _ = CloseHandle(handle);
                Ok(true)
            }
            Err(e) => match existence_from_open_error(e.code().0 as u32) {
                Some(exists) => Ok(exists),
                None => Err(SupervisorError::signal(
                    pid,
                    format!("existence check failed: {}", e),
                )),
            },
        }
    }
}

/// Map an `OpenProcess` failure to an existence answer, as `kill(pid, 0)`
/// does on Unix: a protected process exists.
#[cfg_attr(not(windows), allow(dead_code))]
fn existence_from_open_error(hresult: u32) -> Option<bool> {
    const ERROR_INVALID_PARAMETER: u32 = 0x80070057;
    const ERROR_ACCESS_DENIED: u32 = 0x80070005;

    match hresult {
        ERROR_INVALID_PARAMETER => Some(false),
        ERROR_ACCESS_DENIED => Some(true),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_means_exists() {
        assert_eq!(existence_from_open_error(0x80070005), Some(true));
        assert_eq!(existence_from_open_error(0x80070057), Some(false));
        assert_eq!(existence_from_open_error(0x80004005), None);
    }

    #[test]
    fn test_current_process_exists() {
        assert!(process_exists(std::process::id()).unwrap());
    }

    #[test]
    #[cfg(unix)]
    fn test_pid_zero_is_not_a_process() {
        // kill(0, ..) would address the whole process group
        assert!(!process_exists(0).unwrap());
    }

    #[test]
    #[cfg(unix)]
    fn test_init_exists() {
        assert!(process_exists(1).unwrap());
    }
}
