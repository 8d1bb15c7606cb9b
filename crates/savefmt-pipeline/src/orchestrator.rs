//! Format → diff → apply for one save event.
//!
//! ```text
//!              snapshot ──────────────┐ (old side: fd 3 or temp file)
//!                 │                   ▼
//! surface ──► formatter ──stdout──► diff -u ──► EditTranslator ──► surface
//!                 │
//!                 └─ waiter thread (exit status + stderr)
//! ```
//!
//! The formatter and the diff tool run concurrently. The formatter's exit is collected on
//! its own thread and joined before the event finishes, so its errors are always reported
//! ahead of the diff's.

use crate::error::{PipelineError, ProcessError};
use crate::runner::{CommandLine, ProcessExit, ProcessInput, ProcessRunner, RunningProcess};
use savefmt_core::{ApplyStats, TextSurface, apply_unified_diff};
use std::io::{self, Write};
use std::path::Path;
use std::process::ChildStdout;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// How the diff tool receives the original (old-side) content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffInputStrategy {
    /// `diff -u /dev/fd/3 /dev/fd/0`, with the snapshot streamed through a pipe installed
    /// as descriptor 3 in the child. Unix only.
    PipedFd,
    /// The snapshot is written once to a temporary file; diff runs in that file's
    /// directory as `diff -u NAME -`.
    NamedFileInDir,
}

impl Default for DiffInputStrategy {
    fn default() -> Self {
        if cfg!(unix) {
            Self::PipedFd
        } else {
            Self::NamedFileInDir
        }
    }
}

/// Where user-visible failures go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorSink {
    /// [`TextSurface::report_error`], next to the affected file.
    #[default]
    Surface,
    /// The process log, tagged with the file name.
    Log,
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Diff program; must follow the diff(1) exit convention and print unified diffs.
    pub diff_program: String,
    /// How the old side reaches the diff tool.
    pub diff_strategy: DiffInputStrategy,
    /// Where failures are reported.
    pub error_sink: ErrorSink,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            diff_program: "diff".to_string(),
            diff_strategy: DiffInputStrategy::default(),
            error_sink: ErrorSink::default(),
        }
    }
}

/// Progress of one event through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Not handling anything.
    Idle,
    /// Taking the buffer snapshot.
    Reading,
    /// Formatter started.
    Formatting,
    /// Diff tool started.
    Diffing,
    /// Replaying the diff on the buffer.
    Applying,
}

/// What happened to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The formatter's output equals the buffer; nothing was touched.
    Unchanged,
    /// The diff was replayed.
    Applied(ApplyStats),
    /// Something failed; see [`EventReport::errors`]. The buffer may be partially edited
    /// only if the failure happened while applying.
    Failed,
}

/// Result of handling one event.
#[derive(Debug)]
pub struct EventReport {
    /// What happened to the buffer.
    pub outcome: EventOutcome,
    /// Failures, formatter first, in the order they were reported.
    pub errors: Vec<PipelineError>,
    /// Formatter diagnostics printed on a successful run.
    pub warnings: Vec<String>,
}

impl EventReport {
    fn failed(err: PipelineError) -> Self {
        Self {
            outcome: EventOutcome::Failed,
            errors: vec![err],
            warnings: Vec::new(),
        }
    }
}

/// Keeps the old side of the diff alive until the diff tool exits.
enum OldSide {
    Pipe(JoinHandle<io::Result<()>>),
    File(tempfile::NamedTempFile),
}

/// Runs format → diff → apply.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    config: PipelineConfig,
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// The active settings.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle one save of `name`, open as `surface`, formatting with `formatter`.
    ///
    /// Every warning and error in the returned report has already been delivered to the
    /// configured [`ErrorSink`].
    pub fn run<S>(&self, surface: &mut S, formatter: &CommandLine, name: &Path) -> EventReport
    where
        S: TextSurface + ?Sized,
    {
        let report = self.execute(surface, formatter, name);
        self.deliver(surface, name, &report);
        self.enter(name, PipelineStage::Idle);
        report
    }

    fn enter(&self, name: &Path, stage: PipelineStage) {
        log::debug!("{}: {:?}", name.display(), stage);
    }

    fn execute<S>(&self, surface: &mut S, formatter: &CommandLine, name: &Path) -> EventReport
    where
        S: TextSurface + ?Sized,
    {
        self.enter(name, PipelineStage::Reading);
        let snapshot: Arc<[u8]> = match surface.read_all() {
            Ok(bytes) => bytes.into(),
            Err(err) => return EventReport::failed(PipelineError::Read(err)),
        };

        self.enter(name, PipelineStage::Formatting);
        let mut format =
            match ProcessRunner::spawn(formatter, ProcessInput::Bytes(snapshot.clone())) {
                Ok(process) => process,
                Err(err) => return EventReport::failed(err.into()),
            };
        let formatted = format.take_stdout();
        let format_command = format.command_line().to_string();
        let waiter = thread::spawn(move || format.wait());

        self.enter(name, PipelineStage::Diffing);
        let diff_result = match formatted {
            Some(formatted) => self.run_diff(&snapshot, formatted),
            None => Err(PipelineError::DiffInput(io::Error::other(
                "formatter stdout is not piped",
            ))),
        };
        let format_result = waiter.join().unwrap_or_else(|_| {
            Err(ProcessError::Io {
                command: format_command.clone(),
                source: io::Error::other("formatter waiter thread panicked"),
            })
        });

        let mut report = EventReport {
            outcome: EventOutcome::Failed,
            errors: Vec::new(),
            warnings: Vec::new(),
        };
        match format_result {
            Ok(exit) if exit.success() => {
                if !exit.stderr.is_empty() {
                    report.warnings.push(exit.stderr_text());
                }
            }
            // No diff read its stdout, so it died of SIGPIPE. The diff error is reported.
            Ok(exit) if exit.code().is_none() && diff_result.is_err() => {
                log::debug!(
                    "{}: `{}` killed after its reader went away",
                    name.display(),
                    format_command
                );
            }
            Ok(exit) => report.errors.push(PipelineError::FormatterFailed {
                command: format_command,
                code: exit.code(),
                stderr: exit.stderr_text(),
            }),
            Err(err) => report.errors.push(err.into()),
        }
        let formatter_ok = report.errors.is_empty();

        let (command, exit, output) = match diff_result {
            Ok(result) => result,
            Err(err) => {
                report.errors.push(err);
                return report;
            }
        };

        // From diff(1): 0 if inputs are the same, 1 if different, 2 if trouble.
        match exit.code() {
            Some(0) if formatter_ok => report.outcome = EventOutcome::Unchanged,
            Some(1) if formatter_ok => {
                self.enter(name, PipelineStage::Applying);
                match apply_unified_diff(&mut *surface, output.as_slice()) {
                    Ok(stats) => {
                        log::info!(
                            "{}: reformatted ({} hunk(s), +{} -{})",
                            name.display(),
                            stats.hunks,
                            stats.inserted,
                            stats.deleted
                        );
                        report.outcome = EventOutcome::Applied(stats);
                    }
                    Err(err) => report.errors.push(PipelineError::Apply(err)),
                }
            }
            Some(0 | 1) => {
                log::debug!(
                    "{}: formatter failed, leaving buffer untouched",
                    name.display()
                );
            }
            code => {
                let mut text = String::from_utf8_lossy(&output).into_owned();
                text.push_str(&exit.stderr_text());
                report.errors.push(PipelineError::DiffFailed {
                    command,
                    code,
                    output: text,
                });
            }
        }
        report
    }

    /// Start the diff tool against `snapshot` and the formatter's stdout, and collect it.
    fn run_diff(
        &self,
        snapshot: &Arc<[u8]>,
        formatted: ChildStdout,
    ) -> Result<(String, ProcessExit, Vec<u8>), PipelineError> {
        let (process, old_side) = match self.config.diff_strategy {
            #[cfg(unix)]
            DiffInputStrategy::PipedFd => self.spawn_diff_piped(snapshot, formatted)?,
            #[cfg(not(unix))]
            DiffInputStrategy::PipedFd => {
                log::warn!("piped diff input needs unix; using a temporary file");
                self.spawn_diff_named(snapshot, formatted)?
            }
            DiffInputStrategy::NamedFileInDir => self.spawn_diff_named(snapshot, formatted)?,
        };

        let command = process.command_line().to_string();
        let (exit, output) = process.wait_with_output()?;
        match old_side {
            OldSide::Pipe(feeder) => {
                // A diff that bails out early closes fd 3; the exit code says why.
                if let Ok(Err(err)) = feeder.join() {
                    log::debug!("{command}: old side not fully written: {err}");
                }
            }
            OldSide::File(file) => drop(file),
        }
        Ok((command, exit, output))
    }

    #[cfg(unix)]
    fn spawn_diff_piped(
        &self,
        snapshot: &Arc<[u8]>,
        formatted: ChildStdout,
    ) -> Result<(RunningProcess, OldSide), PipelineError> {
        use std::os::fd::AsRawFd;
        use std::os::unix::process::CommandExt;

        const OLD_FD: i32 = 3;

        let (reader, writer) = io::pipe().map_err(PipelineError::DiffInput)?;
        let reader_fd = reader.as_raw_fd();
        let cmd = CommandLine::new(&self.config.diff_program).args([
            "-u".to_string(),
            format!("/dev/fd/{OLD_FD}"),
            "/dev/fd/0".to_string(),
        ]);

        let process =
            ProcessRunner::spawn_with(&cmd, ProcessInput::Stdio(formatted.into()), |command| {
                // SAFETY: the hook only calls async-signal-safe fcntl/dup2 on a descriptor
                // that stays open until `spawn` returns.
                unsafe {
                    command.pre_exec(move || inherit_fd_as(reader_fd, OLD_FD));
                }
            })?;
        // The child holds its own copy now.
        drop(reader);

        let data = snapshot.clone();
        let feeder = thread::spawn(move || crate::runner::feed(writer, &data));
        Ok((process, OldSide::Pipe(feeder)))
    }

    fn spawn_diff_named(
        &self,
        snapshot: &Arc<[u8]>,
        formatted: ChildStdout,
    ) -> Result<(RunningProcess, OldSide), PipelineError> {
        let mut file = tempfile::Builder::new()
            .prefix("savefmt-")
            .tempfile()
            .map_err(PipelineError::DiffInput)?;
        file.write_all(snapshot).map_err(PipelineError::DiffInput)?;
        file.flush().map_err(PipelineError::DiffInput)?;

        let path = file.path();
        let (Some(dir), Some(file_name)) = (path.parent(), path.file_name()) else {
            return Err(PipelineError::DiffInput(io::Error::other(format!(
                "unusable temporary path {}",
                path.display()
            ))));
        };
        let cmd = CommandLine::new(&self.config.diff_program)
            .args(["-u".to_string(), file_name.to_string_lossy().into_owned()])
            .arg("-")
            .current_dir(dir);

        let process = ProcessRunner::spawn(&cmd, ProcessInput::Stdio(formatted.into()))?;
        Ok((process, OldSide::File(file)))
    }

    fn deliver<S>(&self, surface: &mut S, name: &Path, report: &EventReport)
    where
        S: TextSurface + ?Sized,
    {
        match self.config.error_sink {
            ErrorSink::Surface => {
                for warning in &report.warnings {
                    surface.report_error(warning);
                }
                for err in &report.errors {
                    surface.report_error(&err.to_string());
                }
            }
            ErrorSink::Log => {
                for warning in &report.warnings {
                    log::warn!("{}: {}", name.display(), warning.trim_end());
                }
                for err in &report.errors {
                    log::error!("{}: {}", name.display(), err.to_string().trim_end());
                }
            }
        }
    }
}

/// Make `fd` available as `target` in a freshly forked child.
#[cfg(unix)]
fn inherit_fd_as(fd: i32, target: i32) -> io::Result<()> {
    if fd == target {
        // dup2 onto itself would keep FD_CLOEXEC set.
        // SAFETY: plain fcntl on a descriptor we own.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) } < 0 {
            return Err(io::Error::last_os_error());
        }
    } else if unsafe { libc::dup2(fd, target) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
