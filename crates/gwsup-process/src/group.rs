//! The gateway together with every process it starts.
//!
//! Gateways are often wrappers (an npm shim, a `sh -c` line) around the
//! process that actually holds the port, so stop and kill address the whole
//! tree. On Unix the gateway leads its own process group, spawned with
//! `process_group(0)`, and the group id equals its pid. On Windows the
//! gateway is assigned to a job object created with kill-on-close.

use gwsup_common::SupervisorResult;
#[cfg(windows)]
use tracing::warn;

/// Signalling handle for the gateway's process tree.
pub struct ProcessGroup {
    leader: u32,
    #[cfg(windows)]
    job: Option<job::Job>,
}

impl std::fmt::Debug for ProcessGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessGroup").field("leader", &self.leader).finish()
    }
}

impl ProcessGroup {
    /// Track the tree rooted at `leader`, which must have been spawned as a
    /// group leader.
    pub(crate) fn attach(leader: u32) -> Self {
        #[cfg(windows)]
        let job = match job::Job::assign(leader) {
            Ok(job) => Some(job),
            Err(e) => {
                warn!(pid = leader, error = %e, "Job object unavailable, only the gateway itself will be signalled");
                None
            }
        };

        Self {
            leader,
            #[cfg(windows)]
            job,
        }
    }

    pub fn leader(&self) -> u32 {
        self.leader
    }

    /// Polite termination request to every member.
    pub fn terminate(&self) -> SupervisorResult<()> {
        #[cfg(unix)]
        {
            crate::terminate::signal_group(self.leader, nix::sys::signal::Signal::SIGTERM)
        }

        #[cfg(windows)]
        {
            crate::terminate::terminate_gracefully(self.leader)
        }
    }

    /// Forced kill of every member.
    pub fn kill(&self) -> SupervisorResult<()> {
        #[cfg(unix)]
        {
            crate::terminate::signal_group(self.leader, nix::sys::signal::Signal::SIGKILL)
        }

        #[cfg(windows)]
        {
            match self.job {
                Some(ref job) => job.terminate(self.leader),
                None => crate::terminate::force_kill(self.leader),
            }
        }
    }

    /// True while any member, leader included, still exists.
    pub fn has_members(&self) -> bool {
        #[cfg(unix)]
        {
            use nix::sys::signal::killpg;
            use nix::unistd::Pid;

            if self.leader <= 1 || self.leader > i32::MAX as u32 {
                return false;
            }
            killpg(Pid::from_raw(self.leader as i32), None).is_ok()
        }

        #[cfg(windows)]
        {
            match self.job {
                Some(ref job) => job.active_processes() > 0,
                None => crate::check::process_exists(self.leader).unwrap_or(false),
            }
        }
    }
}

#[cfg(windows)]
mod job {
    use gwsup_common::{SupervisorError, SupervisorResult};
    use std::ffi::c_void;
    use std::mem::size_of;
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::JobObjects::{
        AssignProcessToJobObject, CreateJobObjectW, JobObjectBasicAccountingInformation,
        JobObjectExtendedLimitInformation, QueryInformationJobObject, SetInformationJobObject, TerminateJobObject,
        JOBOBJECT_BASIC_ACCOUNTING_INFORMATION, JOBOBJECT_EXTENDED_LIMIT_INFORMATION,
        JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
    };
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_SET_QUOTA, PROCESS_TERMINATE};

    /// Owned job object handle. Closing it kills whatever is left inside.
    pub(super) struct Job(HANDLE);

    impl Job {
        pub(super) fn assign(pid: u32) -> SupervisorResult<Self> {
            let fail = |step: &str, e: windows::core::Error| SupervisorError::signal(pid, format!("{}: {}", step, e));

            unsafe {
                let job = Job(CreateJobObjectW(None, PCWSTR::null()).map_err(|e| fail("CreateJobObject", e))?);

                let mut limits = JOBOBJECT_EXTENDED_LIMIT_INFORMATION::default();
                limits.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;
                SetInformationJobObject(
                    job.0,
                    JobObjectExtendedLimitInformation,
                    &limits as *const _ as *const c_void,
                    size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
                )
                .map_err(|e| fail("SetInformationJobObject", e))?;

                let process = OpenProcess(PROCESS_SET_QUOTA | PROCESS_TERMINATE, false, pid)
                    .map_err(|e| fail("OpenProcess", e))?;
                let assigned = AssignProcessToJobObject(job.0, process);
                let _ = CloseHandle(process);
                assigned.map_err(|e| fail("AssignProcessToJobObject", e))?;

                Ok(job)
            }
        }

        pub(super) fn terminate(&self, pid: u32) -> SupervisorResult<()> {
            unsafe { TerminateJobObject(self.0, 1) }
                .map_err(|e| SupervisorError::signal(pid, format!("TerminateJobObject: {}", e)))
        }

        pub(super) fn active_processes(&self) -> u32 {
            let mut info = JOBOBJECT_BASIC_ACCOUNTING_INFORMATION::default();
            let queried = unsafe {
                QueryInformationJobObject(
                    self.0,
                    JobObjectBasicAccountingInformation,
                    &mut info as *mut _ as *mut c_void,
                    size_of::<JOBOBJECT_BASIC_ACCOUNTING_INFORMATION>() as u32,
                    None,
                )
            };
            if queried.is_ok() {
                info.ActiveProcesses
            } else {
                0
            }
        }
    }

    impl Drop for Job {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }
}
