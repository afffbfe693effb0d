//! # gwsup-process
//!
//! Low-level process operations for the gateway supervisor:
//! - launching with standard I/O detached from the supervisor
//! - non-blocking liveness through a reaper task
//! - graceful and forced termination of the gateway's process tree
//! - loopback port probing and port owner discovery

pub mod check;
pub mod group;
pub mod handle;
pub mod port;
pub mod terminate;

pub use check::process_exists;
pub use group::ProcessGroup;
pub use handle::{ExitInfo, LaunchSpec, ProcessHandle, ProcessWatch, Termination, FORCE_KILL_TIMEOUT};
pub use port::{find_port_owners, is_port_listening, wait_for_port, PortOwner, PortReadiness};
pub use terminate::{force_kill, terminate_gracefully};
