//! # gwsup-supervisor
//!
//! Supervisor for the gateway background process.
//!
//! - [`Supervisor`]: serialized start/stop/restart/kill, crash detection and
//!   automatic recovery
//! - [`RecoveryPolicy`]: exponential backoff with an attempt ceiling
//! - [`StatusReporter`]: non-blocking status reads
//! - [`Supervisor::kill_port_occupants`]: clearing a port held by a stale gateway
//! - [`RemoteCommandAdapter`]: `/restart`-style chat commands
//! - [`SupervisorConfig`]: YAML configuration
//!
//! ```no_run
//! use gwsup_common::CommandSource;
//! use gwsup_supervisor::{Supervisor, SupervisorConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = SupervisorConfig::load_from_file("gwsup.yaml")?;
//! let supervisor = Supervisor::new(config)?;
//! supervisor.start(CommandSource::Local).await?;
//! println!("{:?}", supervisor.status());
//! supervisor.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod recovery;
pub mod remote;
pub mod status;
pub mod supervisor;

pub use config::SupervisorConfig;
pub use recovery::{RecoveryContext, RecoveryDecision, RecoveryPolicy, RecoveryStats};
pub use remote::{RemoteCommand, RemoteCommandAdapter};
pub use status::{PortCleanup, ServiceStatus, StatusReporter, SupervisorStatus};
pub use supervisor::Supervisor;
