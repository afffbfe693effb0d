//! Configuration for captured gateway output.

use std::path::PathBuf;

/// Longest line returned by `tail`; longer lines are cut.
pub const MAX_LINE_BYTES: usize = 4096;

/// Bytes read from the end of the file to answer one `tail` call.
pub const TAIL_WINDOW_BYTES: u64 = 1024 * 1024;

/// Appended to lines cut at [`MAX_LINE_BYTES`].
pub const TRUNCATED_MARKER: &str = " ...[truncated]";

/// Log capture configuration.
#[derive(Debug, Clone)]
pub struct LogCollectorConfig {
    /// File the gateway's stdout and stderr are appended to.
    pub file: PathBuf,
    pub redact_secrets: bool,
    /// Size at which the file is rotated to `<file>.1` before the next launch.
    pub max_file_bytes: u64,
}

impl LogCollectorConfig {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            redact_secrets: true,
            max_file_bytes: 10 * 1024 * 1024,
        }
    }

    /// `<file>.1`, where the previous generation of output is kept.
    pub fn rotated_file(&self) -> PathBuf {
        let mut name = self.file.clone().into_os_string();
        name.push(".1");
        PathBuf::from(name)
    }
}
