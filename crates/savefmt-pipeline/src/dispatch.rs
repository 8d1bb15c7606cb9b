//! The event loop: one worker thread per matching save.

use crate::error::DispatchError;
use crate::event::{EventFilter, SaveEvent};
use crate::locks::{BufferLocks, acquire};
use crate::orchestrator::{EventOutcome, Orchestrator};
use crate::runner::CommandLine;
use crate::template::ArgTemplate;
use savefmt_core::{SurfaceError, TextSurface};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Opens the live buffer an event refers to.
pub trait SurfaceOpener: Send + Sync + 'static {
    /// The surface type handed to the orchestrator.
    type Surface: TextSurface;

    /// Open the buffer named by `event`.
    fn open(&self, event: &SaveEvent) -> Result<Self::Surface, SurfaceError>;
}

/// Counts of what the loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Events read from the source.
    pub received: usize,
    /// Events that passed the filter.
    pub matched: usize,
    /// Matched events dropped because their arguments could not be expanded.
    pub skipped: usize,
    /// Buffers the diff was replayed on.
    pub applied: usize,
    /// Buffers already formatted.
    pub unchanged: usize,
    /// Events that failed (open, tool, or apply errors).
    pub failed: usize,
}

impl DispatchSummary {
    fn record(&mut self, outcome: WorkerOutcome) {
        match outcome {
            WorkerOutcome::Handled(EventOutcome::Applied(_)) => self.applied += 1,
            WorkerOutcome::Handled(EventOutcome::Unchanged) => self.unchanged += 1,
            WorkerOutcome::Handled(EventOutcome::Failed) | WorkerOutcome::OpenFailed => {
                self.failed += 1
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum WorkerOutcome {
    Handled(EventOutcome),
    OpenFailed,
}

/// Reads events sequentially and fans each matching one out to a worker.
pub struct Dispatcher<O> {
    opener: Arc<O>,
    orchestrator: Arc<Orchestrator>,
    filter: EventFilter,
    template: ArgTemplate,
    locks: BufferLocks,
}

impl<O: SurfaceOpener> Dispatcher<O> {
    /// Create a dispatcher.
    pub fn new(
        opener: O,
        orchestrator: Orchestrator,
        filter: EventFilter,
        template: ArgTemplate,
    ) -> Self {
        Self {
            opener: Arc::new(opener),
            orchestrator: Arc::new(orchestrator),
            filter,
            template,
            locks: BufferLocks::new(),
        }
    }

    /// The per-buffer lock registry shared by all workers.
    pub fn locks(&self) -> &BufferLocks {
        &self.locks
    }

    /// Consume `events` until the source ends, then wait for every worker.
    ///
    /// A source error stops the loop; workers already started still finish.
    pub fn run<I, E>(&self, events: I) -> Result<DispatchSummary, DispatchError>
    where
        I: IntoIterator<Item = Result<SaveEvent, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut summary = DispatchSummary::default();
        let mut workers: Vec<JoinHandle<WorkerOutcome>> = Vec::new();
        let mut source_error = None;

        for event in events {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    source_error = Some(DispatchError::Source(Box::new(err)));
                    break;
                }
            };
            summary.received += 1;
            if !self.filter.matches(&event) {
                continue;
            }
            summary.matched += 1;

            let argv = match self.template.expand_for(&event.name) {
                Ok(argv) => argv,
                Err(err) => {
                    log::error!("{}: {}", event.name.display(), err);
                    summary.skipped += 1;
                    continue;
                }
            };
            let Some(formatter) = CommandLine::from_argv(&argv) else {
                log::error!("{}: empty formatter command", event.name.display());
                summary.skipped += 1;
                continue;
            };

            Self::reap(&mut workers, &mut summary);
            workers.push(self.spawn_worker(event, formatter));
        }

        for worker in workers {
            summary.record(join_worker(worker));
        }
        match source_error {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }

    fn spawn_worker(&self, event: SaveEvent, formatter: CommandLine) -> JoinHandle<WorkerOutcome> {
        let opener = Arc::clone(&self.opener);
        let orchestrator = Arc::clone(&self.orchestrator);
        let lock = self.locks.lock_for(event.id);

        thread::spawn(move || {
            let _guard = acquire(&lock);
            let mut surface = match opener.open(&event) {
                Ok(surface) => surface,
                Err(err) => {
                    log::error!("{}: cannot open buffer {}: {}", event.name.display(), event.id, err);
                    return WorkerOutcome::OpenFailed;
                }
            };

            let report = orchestrator.run(&mut surface, &formatter, &event.name);
            if let Err(err) = surface.close() {
                log::error!("{}: {}", event.name.display(), err);
                return WorkerOutcome::Handled(EventOutcome::Failed);
            }
            WorkerOutcome::Handled(report.outcome)
        })
    }

    /// Collect workers that already finished so long-running loops do not pile up handles.
    fn reap(workers: &mut Vec<JoinHandle<WorkerOutcome>>, summary: &mut DispatchSummary) {
        let (finished, running): (Vec<_>, Vec<_>) =
            workers.drain(..).partition(|worker| worker.is_finished());
        *workers = running;
        for worker in finished {
            summary.record(join_worker(worker));
        }
    }
}

fn join_worker(worker: JoinHandle<WorkerOutcome>) -> WorkerOutcome {
    worker.join().unwrap_or_else(|_| {
        log::error!("format worker panicked");
        WorkerOutcome::Handled(EventOutcome::Failed)
    })
}
