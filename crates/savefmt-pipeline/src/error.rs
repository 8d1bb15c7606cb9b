use savefmt_core::{ApplyError, SurfaceError};
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors raised while starting or talking to an external process.
pub enum ProcessError {
    #[error("{command}: {source}")]
    /// The process could not be started (not found, not executable, ...).
    Launch {
        /// The command line that failed to start.
        command: String,
        /// The underlying OS error.
        source: std::io::Error,
    },

    #[error("{command}: I/O error: {source}")]
    /// Reading from or waiting on a running process failed.
    Io {
        /// The command line of the process.
        command: String,
        /// The underlying error.
        source: std::io::Error,
    },
}

impl ProcessError {
    /// The command line this error is about.
    pub fn command(&self) -> &str {
        match self {
            Self::Launch { command, .. } | Self::Io { command, .. } => command,
        }
    }
}

#[derive(Debug, Error)]
/// One failure reported for a save event.
pub enum PipelineError {
    #[error("cannot read buffer: {0}")]
    /// The buffer snapshot could not be taken.
    Read(#[source] SurfaceError),

    #[error(transparent)]
    /// A process could not be started or waited on.
    Process(#[from] ProcessError),

    #[error("cannot stage diff input: {0}")]
    /// Setting up the old side of the diff (pipe or temp file) failed.
    DiffInput(#[source] std::io::Error),

    #[error("{command}{}\n{stderr}", signal_note(.code))]
    /// The formatter exited unsuccessfully.
    FormatterFailed {
        /// Formatter command line.
        command: String,
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    #[error("{command}{}\n{output}", signal_note(.code))]
    /// The diff tool exited with a status other than 0 or 1.
    DiffFailed {
        /// Diff command line.
        command: String,
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Captured standard output followed by standard error.
        output: String,
    },

    #[error("cannot apply diff: {0}")]
    /// Replaying the diff on the buffer failed part way.
    Apply(#[source] ApplyError),
}

fn signal_note(code: &Option<i32>) -> &'static str {
    match code {
        Some(_) => "",
        None => ": killed by signal",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors in formatter argument templates.
pub enum TemplateError {
    #[error("unterminated template action in {0:?}")]
    /// A `{{` without a matching `}}`.
    Unterminated(String),

    #[error("unknown template field {field:?} in {arg:?}")]
    /// An action naming anything other than `.Basename`, `.Dirname` or `.Fullname`.
    UnknownField {
        /// The field as written.
        field: String,
        /// The argument it appeared in.
        arg: String,
    },

    #[error("file name is not valid UTF-8: {0}")]
    /// The event's file name cannot be placed into an argument.
    NonUtf8Path(String),
}

#[derive(Debug, Error)]
/// Errors that stop the dispatch loop.
pub enum DispatchError {
    #[error("cannot read events: {0}")]
    /// The event source failed.
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}
