//! Log collector: serves the tail of the gateway's output file.
//!
//! The gateway writes its stdout and stderr straight into an append-only
//! file; the supervisor never sits between the gateway and its output. Reads
//! look at a bounded window at the end of the file, cut overlong lines and
//! redact secrets on the way out, so the file itself is never rewritten.

use crate::redact::redact_secrets;
use crate::types::{LogCollectorConfig, MAX_LINE_BYTES, TAIL_WINDOW_BYTES, TRUNCATED_MARKER};
use gwsup_common::{SupervisorError, SupervisorResult};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Captured output of the supervised gateway.
///
/// One collector lives as long as the supervisor. Every launch appends to
/// the same file, so `tail` keeps showing the output of a crashed process
/// after it is gone.
#[derive(Debug)]
pub struct LogCollector {
    config: LogCollectorConfig,
}

impl LogCollector {
    /// Create a collector, making sure the output file can be created.
    pub fn new(config: LogCollectorConfig) -> SupervisorResult<Self> {
        if let Some(parent) = config.file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SupervisorError::log_output(format!("create {}: {}", parent.display(), e)))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.file)
            .map_err(|e| SupervisorError::log_output(format!("open {}: {}", config.file.display(), e)))?;

        Ok(Self { config })
    }

    pub fn path(&self) -> &Path {
        &self.config.file
    }

    /// Called before each launch while no gateway is writing. Rotates an
    /// oversized file and returns the path the new gateway should append to.
    pub fn prepare_launch(&self) -> SupervisorResult<PathBuf> {
        let size = match std::fs::metadata(&self.config.file) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => {
                return Err(SupervisorError::log_output(format!(
                    "stat {}: {}",
                    self.config.file.display(),
                    e
                )))
            }
        };

        if size > self.config.max_file_bytes {
            let rotated = self.config.rotated_file();
            std::fs::rename(&self.config.file, &rotated).map_err(|e| {
                SupervisorError::log_output(format!("rotate {}: {}", self.config.file.display(), e))
            })?;
            info!(size, rotated = %rotated.display(), "Rotated gateway output file");
        }

        Ok(self.config.file.clone())
    }

    /// Up to `lines` most recent lines, oldest first. A missing file reads
    /// as empty.
    pub fn tail(&self, lines: usize) -> SupervisorResult<Vec<String>> {
        if lines == 0 {
            return Ok(Vec::new());
        }

        let window = read_window(&self.config.file, TAIL_WINDOW_BYTES)
            .map_err(|e| SupervisorError::log_output(format!("read {}: {}", self.config.file.display(), e)))?;

        let mut raw: Vec<&[u8]> = window.split(|b| *b == b'\n').collect();
        if raw.last().is_some_and(|last| last.is_empty()) {
            raw.pop();
        }
        let skip = raw.len().saturating_sub(lines);

        let tail = raw[skip..]
            .iter()
            .map(|line| self.render(line))
            .collect::<Vec<_>>();
        debug!(requested = lines, returned = tail.len(), "Served gateway output tail");
        Ok(tail)
    }

    fn render(&self, line: &[u8]) -> String {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let truncated = line.len() > MAX_LINE_BYTES;
        let kept = if truncated { &line[..MAX_LINE_BYTES] } else { line };

        // Gateways occasionally print invalid UTF-8; keep the line anyway.
        let mut text = String::from_utf8_lossy(kept).into_owned();
        if truncated {
            text.push_str(TRUNCATED_MARKER);
        }

        if self.config.redact_secrets {
            redact_secrets(&text).into_owned()
        } else {
            text
        }
    }
}

/// The last `window` bytes of `path`, starting at a line boundary when the
/// file is longer than the window.
fn read_window(path: &Path, window: u64) -> std::io::Result<Vec<u8>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let len = file.metadata()?.len();
    let start = len.saturating_sub(window);
    file.seek(SeekFrom::Start(start))?;

    let mut buf = Vec::with_capacity((len - start) as usize);
    // The gateway may still be appending; never read past the window.
    file.take(window).read_to_end(&mut buf)?;

    if start > 0 {
        // Drop the partial first line unless the whole window is one line.
        if let Some(newline) = buf.iter().position(|b| *b == b'\n') {
            if newline + 1 < buf.len() {
                buf.drain(..=newline);
            }
        }
    }
    Ok(buf)
}
