use thiserror::Error;

#[derive(Debug, Error)]
/// Errors produced by a [`TextSurface`](crate::TextSurface) implementation.
pub enum SurfaceError {
    #[error("I/O error: {0}")]
    /// Transport or filesystem I/O failed.
    Io(#[from] std::io::Error),

    #[error("buffer content is not valid UTF-8")]
    /// Bytes written to (or loaded into) a text-only surface were not UTF-8.
    InvalidUtf8,

    #[error("surface is closed")]
    /// The surface was used after [`close`](crate::TextSurface::close).
    Closed,
}

#[derive(Debug, Error)]
/// Errors produced while reading a unified diff stream.
pub enum DiffParseError {
    #[error("I/O error while reading diff: {0}")]
    /// Reading the diff stream failed.
    Io(#[from] std::io::Error),

    #[error("invalid diff: missing file header")]
    /// The stream ended before the two `---`/`+++` header lines.
    MissingFileHeader,

    #[error("don't know how to parse diff line {line_number}: {text:?}")]
    /// A line matched neither the hunk-header grammar nor any line prefix.
    UnrecognizedLine {
        /// 1-based line number within the diff stream.
        line_number: usize,
        /// The offending line (lossily decoded).
        text: String,
    },
}

#[derive(Debug, Error)]
/// Errors that abort an in-progress diff replay.
///
/// Edits issued before the error stay applied.
pub enum ApplyError {
    #[error(transparent)]
    /// The diff stream could not be parsed.
    Parse(#[from] DiffParseError),

    #[error(transparent)]
    /// The surface rejected an operation.
    Surface(#[from] SurfaceError),

    #[error("diff line outside of any hunk: {0:?}")]
    /// A line directive arrived before the first hunk header.
    LineOutsideHunk(String),
}
