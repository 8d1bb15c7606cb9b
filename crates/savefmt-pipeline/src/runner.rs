//! Spawning external commands with piped stdio.
//!
//! Like the rest of the pipeline this stays runtime-agnostic: stdin is fed and stderr is
//! drained by helper threads, so a child that fills one pipe while the caller drains
//! another never deadlocks.

use crate::error::ProcessError;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A program, its arguments and an optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Program name or path.
    pub program: String,
    /// Arguments, not including the program.
    pub args: Vec<String>,
    /// Directory to run in; inherited when `None`.
    pub working_dir: Option<PathBuf>,
}

impl CommandLine {
    /// A command with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Split `argv` into program and arguments. Returns `None` for an empty slice.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.as_ref()).args(args.iter().map(|a| a.as_ref())))
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir`.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Where a process's standard input comes from.
#[derive(Debug)]
pub enum ProcessInput {
    /// These bytes, written by a feeder thread and then closed.
    Bytes(Arc<[u8]>),
    /// An existing handle, typically another process's stdout.
    Stdio(Stdio),
    /// Nothing (`/dev/null`).
    Null,
}

/// How a process ended, with everything it wrote to stderr.
#[derive(Debug, Clone)]
pub struct ProcessExit {
    /// Raw exit status.
    pub status: ExitStatus,
    /// Captured standard error.
    pub stderr: Vec<u8>,
}

impl ProcessExit {
    /// Exit code, `None` when the process was killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Standard error, lossily decoded.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// A started process.
pub struct RunningProcess {
    command_line: String,
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<io::Result<Vec<u8>>>>,
    feeder: Option<JoinHandle<io::Result<()>>>,
}

/// Starts processes.
pub struct ProcessRunner;

impl ProcessRunner {
    /// Start `cmd` with stdout and stderr piped.
    ///
    /// A launch failure is returned as [`ProcessError::Launch`]. A non-zero exit is not an
    /// error here; callers interpret exit codes.
    pub fn spawn(cmd: &CommandLine, input: ProcessInput) -> Result<RunningProcess, ProcessError> {
        Self::spawn_with(cmd, input, |_| {})
    }

    /// Like [`spawn`](Self::spawn), letting `configure` adjust the [`Command`] last.
    pub fn spawn_with<F>(
        cmd: &CommandLine,
        input: ProcessInput,
        configure: F,
    ) -> Result<RunningProcess, ProcessError>
    where
        F: FnOnce(&mut Command),
    {
        let command_line = cmd.to_string();
        let mut command = cmd.to_command();
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let bytes = match input {
            ProcessInput::Bytes(bytes) => {
                command.stdin(Stdio::piped());
                Some(bytes)
            }
            ProcessInput::Stdio(stdio) => {
                command.stdin(stdio);
                None
            }
            ProcessInput::Null => {
                command.stdin(Stdio::null());
                None
            }
        };
        configure(&mut command);

        let mut child = command.spawn().map_err(|source| ProcessError::Launch {
            command: command_line.clone(),
            source,
        })?;
        log::debug!("started `{}` (pid {})", command_line, child.id());

        let feeder = match (bytes, child.stdin.take()) {
            (Some(bytes), Some(stdin)) => Some(thread::spawn(move || feed(stdin, &bytes))),
            _ => None,
        };
        let stderr = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                stderr.read_to_end(&mut buf)?;
                Ok(buf)
            })
        });
        let stdout = child.stdout.take();

        Ok(RunningProcess {
            command_line,
            child,
            stdout,
            stderr,
            feeder,
        })
    }
}

/// Write `data` and close the pipe. A reader that exits early is not an error.
pub(crate) fn feed<W: Write>(mut writer: W, data: &[u8]) -> io::Result<()> {
    match writer.write_all(data) {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

impl RunningProcess {
    /// The command line as displayed to users.
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// OS process id.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Take the stdout pipe, e.g. to connect it to another process.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Block until the process exits.
    ///
    /// If stdout was not taken it is closed first, so a chatty child cannot block on it.
    pub fn wait(mut self) -> Result<ProcessExit, ProcessError> {
        drop(self.stdout.take());
        self.finish()
    }

    /// Read stdout to the end, then wait for the process.
    pub fn wait_with_output(mut self) -> Result<(ProcessExit, Vec<u8>), ProcessError> {
        let mut output = Vec::new();
        if let Some(mut stdout) = self.stdout.take() {
            stdout
                .read_to_end(&mut output)
                .map_err(|source| self.io_error(source))?;
        }
        let exit = self.finish()?;
        Ok((exit, output))
    }

    fn finish(mut self) -> Result<ProcessExit, ProcessError> {
        let status = self.child.wait().map_err(|source| self.io_error(source))?;

        if let Some(feeder) = self.feeder.take() {
            join(feeder)
                .and_then(|result| result)
                .map_err(|source| self.io_error(source))?;
        }
        let stderr = match self.stderr.take() {
            Some(reader) => join(reader)
                .and_then(|result| result)
                .map_err(|source| self.io_error(source))?,
            None => Vec::new(),
        };

        log::debug!("`{}` exited with {}", self.command_line, status);
        Ok(ProcessExit { status, stderr })
    }

    fn io_error(&self, source: io::Error) -> ProcessError {
        ProcessError::Io {
            command: self.command_line.clone(),
            source,
        }
    }
}

fn join<T>(handle: JoinHandle<T>) -> io::Result<T> {
    handle
        .join()
        .map_err(|_| io::Error::other("pipe helper thread panicked"))
}
