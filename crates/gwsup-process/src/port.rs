//! Loopback port probing for the gateway's listening port, and discovery of
//! whoever holds it.

use crate::handle::{ExitInfo, ProcessWatch};
use gwsup_common::{SupervisorError, SupervisorResult};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

/// Outcome of waiting for the gateway to start listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortReadiness {
    Ready,
    /// The process exited before the port opened.
    Exited(ExitInfo),
    TimedOut,
}

/// True if something accepts TCP connections on `127.0.0.1:port`.
pub async fn is_port_listening(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    matches!(
        tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

/// Poll until `port` accepts connections, the process exits, or `timeout`
/// elapses.
pub async fn wait_for_port(
    port: u16,
    process: &ProcessWatch,
    timeout: Duration,
    poll_interval: Duration,
) -> PortReadiness {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if let Some(exit) = process.exit_info() {
            return PortReadiness::Exited(exit);
        }

        if is_port_listening(port).await {
            debug!(port, pid = process.pid(), "Gateway port is accepting connections");
            return PortReadiness::Ready;
        }

        if tokio::time::Instant::now() >= deadline {
            return PortReadiness::TimedOut;
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// A process with a socket bound to the gateway port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortOwner {
    pub pid: u32,
    pub name: String,
}

/// Every process with a socket bound to `port`, ordered by pid.
///
/// Blocking: walks the OS socket tables. Processes of other users may be
/// invisible without elevated privileges.
pub fn find_port_owners(port: u16) -> SupervisorResult<Vec<PortOwner>> {
    let listeners = listeners::get_all()
        .map_err(|e| SupervisorError::Internal(format!("failed to list sockets: {}", e)))?;

    let mut owners: Vec<PortOwner> = listeners
        .into_iter()
        .filter(|listener| listener.socket.port() == port && listener.process.pid > 0)
        .map(|listener| PortOwner {
            pid: listener.process.pid,
            name: listener.process.name,
        })
        .collect();
    owners.sort_by_key(|owner| owner.pid);
    owners.dedup_by_key(|owner| owner.pid);

    debug!(port, owners = ?owners, "Port owners discovered");
    Ok(owners)
}
