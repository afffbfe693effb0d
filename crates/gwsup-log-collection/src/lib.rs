//! # gwsup-log-collection
//!
//! Captured output of the gateway:
//! - append-only output file the gateway writes to directly
//! - rotation to `<file>.1` between launches
//! - bounded `tail(n)` with secret redaction on read

pub mod collector;
pub mod redact;
pub mod types;

pub use collector::LogCollector;
pub use redact::redact_secrets;
pub use types::{LogCollectorConfig, MAX_LINE_BYTES, TAIL_WINDOW_BYTES, TRUNCATED_MARKER};
