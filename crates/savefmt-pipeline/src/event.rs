//! Save notifications and the filter that decides which ones are acted on.

use crate::locks::BufferId;
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;

/// Operation name editors log when a buffer is written to disk.
pub const PUT_OP: &str = "put";

/// One notification from the editor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SaveEvent {
    /// Buffer identity.
    pub id: BufferId,
    /// Operation, e.g. `put`, `new`, `del`.
    pub op: String,
    /// File name of the buffer.
    pub name: PathBuf,
}

impl SaveEvent {
    /// Build a `put` event.
    pub fn put(id: BufferId, name: impl Into<PathBuf>) -> Self {
        Self {
            id,
            op: PUT_OP.to_string(),
            name: name.into(),
        }
    }

    /// Parse one `ID OP NAME` log line. The name may contain spaces.
    ///
    /// Returns `None` for lines that do not have that shape.
    pub fn parse_log_line(line: &str) -> Option<Self> {
        Self::parse_log_bytes(line.as_bytes())
    }

    /// Like [`parse_log_line`](Self::parse_log_line), for raw bytes.
    ///
    /// The name is taken as-is on unix, so file names that are not UTF-8 still parse.
    /// Elsewhere such a name makes the line unparseable.
    pub fn parse_log_bytes(line: &[u8]) -> Option<Self> {
        let mut line = line;
        while let [rest @ .., b'\r' | b'\n'] = line {
            line = rest;
        }
        let (id, rest) = split_at_space(line)?;
        let (op, name) = split_at_space(rest).unwrap_or((rest, &[][..]));
        if op.is_empty() {
            return None;
        }
        Some(Self {
            id: std::str::from_utf8(id).ok()?.trim().parse().ok()?,
            op: std::str::from_utf8(op).ok()?.to_string(),
            name: path_from_bytes(name)?,
        })
    }
}

fn split_at_space(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let space = bytes.iter().position(|&b| b == b' ')?;
    Some((&bytes[..space], &bytes[space + 1..]))
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> Option<PathBuf> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    Some(PathBuf::from(OsStr::from_bytes(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> Option<PathBuf> {
    std::str::from_utf8(bytes).ok().map(PathBuf::from)
}

/// Which events trigger formatting.
#[derive(Debug, Clone)]
pub struct EventFilter {
    pattern: Regex,
    op: String,
}

impl EventFilter {
    /// `put` events whose file name matches `pattern`.
    pub fn new(pattern: Regex) -> Self {
        Self {
            pattern,
            op: PUT_OP.to_string(),
        }
    }

    /// Match a different operation name.
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = op.into();
        self
    }

    /// Whether `event` should be handled.
    pub fn matches(&self, event: &SaveEvent) -> bool {
        event.op == self.op && self.pattern.is_match(&event.name.to_string_lossy())
    }
}
