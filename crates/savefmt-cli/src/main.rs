//! `savefmt` - reformat files as they are saved, editing the open buffer in place.

mod cli;
mod events;
mod file_surface;

use clap::Parser;
use cli::Args;
use events::EventReader;
use file_surface::FileOpener;
use regex::Regex;
use savefmt_pipeline::{
    ArgTemplate, DispatchError, DispatchSummary, Dispatcher, EventFilter, Orchestrator,
    TemplateError,
};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid file pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid formatter arguments: {0}")]
    Template(#[from] TemplateError),

    #[error("cannot open event log {}: {source}", path.display())]
    Events { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

fn run(args: Args) -> Result<DispatchSummary, CliError> {
    let filter = EventFilter::new(Regex::new(&args.pattern)?);
    let template = ArgTemplate::parse(&args.command)?;
    let config = args.pipeline_config();
    log::debug!("{config:?}, formatter {:?}", args.command);

    let dispatcher = Dispatcher::new(FileOpener, Orchestrator::new(config), filter, template);
    let summary = match &args.events {
        Some(path) => {
            let file = File::open(path).map_err(|source| CliError::Events {
                path: path.clone(),
                source,
            })?;
            dispatcher.run(EventReader::new(BufReader::new(file), args.event_format))?
        }
        None => dispatcher.run(EventReader::new(io::stdin().lock(), args.event_format))?,
    };
    Ok(summary)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(summary) => {
            log::info!(
                "{} event(s), {} matched: {} reformatted, {} unchanged, {} failed, {} skipped",
                summary.received,
                summary.matched,
                summary.applied,
                summary.unchanged,
                summary.failed,
                summary.skipped
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
