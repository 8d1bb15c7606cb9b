//! Command line.

use clap::{Parser, ValueEnum};
use savefmt_pipeline::{DiffInputStrategy, ErrorSink, PipelineConfig};
use std::path::PathBuf;

/// Reformat files on save and replay the formatter's changes into the open buffer.
///
/// Reads save events (one per line) and, for every `put` of a file matching `--pattern`,
/// runs COMMAND on the buffer contents, diffs the output against the buffer and applies
/// only the changed lines.
///
/// Arguments of COMMAND may use {{.Basename}}, {{.Dirname}} and {{.Fullname}}.
#[derive(Debug, Parser)]
#[command(name = "savefmt", version, about, long_about = None)]
pub struct Args {
    /// Regular expression matched against the saved file name.
    #[arg(short = 'r', long, default_value = "", value_name = "REGEX")]
    pub pattern: String,

    /// Diff program printing unified diffs with diff(1) exit codes.
    #[arg(long, env = "SAVEFMT_DIFF", default_value = "diff", value_name = "PROG")]
    pub diff: String,

    /// How the diff program receives the original buffer.
    #[arg(long, value_enum, default_value_t = DiffInput::default())]
    pub diff_input: DiffInput,

    /// Where formatter and diff failures are shown.
    #[arg(long, value_enum, default_value_t = Errors::Surface)]
    pub errors: Errors,

    /// Read events from FILE instead of standard input.
    #[arg(long, value_name = "FILE")]
    pub events: Option<PathBuf>,

    /// Encoding of the event stream.
    #[arg(long, value_enum, default_value_t = EventFormat::Line)]
    pub event_format: EventFormat,

    /// Formatter command and its arguments.
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    pub command: Vec<String>,
}

impl Args {
    /// Orchestrator settings selected on the command line.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            diff_program: self.diff.clone(),
            diff_strategy: self.diff_input.into(),
            error_sink: self.errors.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiffInput {
    /// Stream the buffer through descriptor 3 (unix).
    PipedFd,
    /// Write the buffer to a temporary file.
    NamedFile,
}

impl Default for DiffInput {
    fn default() -> Self {
        match DiffInputStrategy::default() {
            DiffInputStrategy::PipedFd => Self::PipedFd,
            DiffInputStrategy::NamedFileInDir => Self::NamedFile,
        }
    }
}

impl From<DiffInput> for DiffInputStrategy {
    fn from(input: DiffInput) -> Self {
        match input {
            DiffInput::PipedFd => Self::PipedFd,
            DiffInput::NamedFile => Self::NamedFileInDir,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Errors {
    /// Next to the affected file.
    Surface,
    /// In the log.
    Log,
}

impl From<Errors> for ErrorSink {
    fn from(errors: Errors) -> Self {
        match errors {
            Errors::Surface => Self::Surface,
            Errors::Log => Self::Log,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventFormat {
    /// `ID OP NAME` per line.
    Line,
    /// One JSON object per line.
    Json,
}
