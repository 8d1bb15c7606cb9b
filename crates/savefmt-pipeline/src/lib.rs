#![warn(missing_docs)]
//! `savefmt-pipeline` - run a formatter and diff tool for each save and replay the result.
//!
//! This crate wires [`savefmt_core`] to the outside world: it spawns the external formatter
//! and diff tool ([`runner`]), drives one save through format → diff → apply
//! ([`orchestrator`]), and runs the event loop that fans saves out to worker threads while
//! keeping at most one apply per buffer ([`dispatch`], [`locks`]).
//!
//! No async runtime is required; concurrency is plain threads and pipes.

pub mod dispatch;
pub mod error;
pub mod event;
pub mod locks;
pub mod orchestrator;
pub mod runner;
pub mod template;

pub use dispatch::{DispatchSummary, Dispatcher, SurfaceOpener};
pub use error::{DispatchError, PipelineError, ProcessError, TemplateError};
pub use event::{EventFilter, PUT_OP, SaveEvent};
pub use locks::{BufferId, BufferLocks};
pub use orchestrator::{
    DiffInputStrategy, ErrorSink, EventOutcome, EventReport, Orchestrator, PipelineConfig,
    PipelineStage,
};
pub use runner::{CommandLine, ProcessExit, ProcessInput, ProcessRunner, RunningProcess};
pub use template::{ArgTemplate, FileParams};
