//! # gwsup-common
//!
//! Error and command types shared by every gateway supervisor crate.

pub mod errors;
pub mod types;

pub use errors::{SupervisorError, SupervisorResult};
pub use types::{Ack, CommandSource, ControlAction, ControlRequest, RequestId};
