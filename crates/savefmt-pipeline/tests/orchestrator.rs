#![cfg(unix)]

use pretty_assertions::assert_eq;
use savefmt_core::{RecordingSurface, SurfaceOp};
use savefmt_pipeline::{
    CommandLine, DiffInputStrategy, ErrorSink, EventOutcome, Orchestrator, PipelineConfig,
    PipelineError, ProcessError,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const NAME: &str = "/src/example.txt";

fn orchestrator(strategy: DiffInputStrategy) -> Orchestrator {
    Orchestrator::new(PipelineConfig {
        diff_strategy: strategy,
        ..PipelineConfig::default()
    })
}

fn sh(script: &str) -> CommandLine {
    CommandLine::new("sh").args(["-c", script])
}

fn reported(surface: &RecordingSurface) -> Vec<String> {
    surface
        .ops()
        .iter()
        .filter_map(|op| match op {
            SurfaceOp::ReportError(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_formatter_output_is_replayed_in_place() {
    for strategy in [DiffInputStrategy::PipedFd, DiffInputStrategy::NamedFileInDir] {
        let mut surface = RecordingSurface::new("a\nb\nc\n");
        let report = orchestrator(strategy).run(
            &mut surface,
            &CommandLine::new("sed").arg("s/b/X/"),
            Path::new(NAME),
        );

        assert!(report.errors.is_empty(), "{strategy:?}: {:?}", report.errors);
        match report.outcome {
            EventOutcome::Applied(stats) => {
                assert_eq!(stats.hunks, 1);
                assert_eq!(stats.inserted, 1);
                assert_eq!(stats.deleted, 1);
            }
            other => panic!("{strategy:?}: unexpected outcome {other:?}"),
        }
        assert_eq!(surface.text(), "a\nX\nc\n");

        // The reformat is a single undo step.
        assert!(surface.inner_mut().undo());
        assert_eq!(surface.text(), "a\nb\nc\n");
    }
}

#[test]
fn test_identical_output_touches_nothing() {
    let mut surface = RecordingSurface::new("already\nformatted\n");
    let report = orchestrator(DiffInputStrategy::default()).run(
        &mut surface,
        &CommandLine::new("cat"),
        Path::new(NAME),
    );

    assert_eq!(report.outcome, EventOutcome::Unchanged);
    assert!(report.errors.is_empty());
    assert_eq!(surface.ops(), &[SurfaceOp::ReadAll]);
}

#[test]
fn test_strips_trailing_whitespace_across_several_hunks() {
    let old: String = (0..40)
        .map(|i| {
            if i % 9 == 0 {
                format!("line {i}   \n")
            } else {
                format!("line {i}\n")
            }
        })
        .collect();
    let expected: String = (0..40).map(|i| format!("line {i}\n")).collect();

    let mut surface = RecordingSurface::new(&old);
    let report = orchestrator(DiffInputStrategy::PipedFd).run(
        &mut surface,
        &CommandLine::new("sed").arg("s/[[:space:]]*$//"),
        Path::new(NAME),
    );

    assert!(matches!(report.outcome, EventOutcome::Applied(stats) if stats.deleted == 5));
    assert_eq!(surface.text(), expected);
}

#[test]
fn test_trailing_newline_presence_is_reproduced() {
    let mut surface = RecordingSurface::new("a\nb\n");
    let report = orchestrator(DiffInputStrategy::PipedFd).run(
        &mut surface,
        &sh("cat >/dev/null; printf 'a\\nb'"),
        Path::new(NAME),
    );
    assert!(matches!(report.outcome, EventOutcome::Applied(_)));
    assert_eq!(surface.text(), "a\nb");

    let report = orchestrator(DiffInputStrategy::NamedFileInDir).run(
        &mut surface,
        &sh("cat; echo"),
        Path::new(NAME),
    );
    assert!(matches!(report.outcome, EventOutcome::Applied(_)));
    assert_eq!(surface.text(), "a\nb\n");
}

#[test]
fn test_diff_tool_failure_is_surfaced_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let fake_diff = dir.path().join("fake-diff");
    fs::write(&fake_diff, "#!/bin/sh\necho 'diff: invalid option' >&2\nexit 2\n").unwrap();
    fs::set_permissions(&fake_diff, fs::Permissions::from_mode(0o755)).unwrap();

    let orchestrator = Orchestrator::new(PipelineConfig {
        diff_program: fake_diff.to_string_lossy().into_owned(),
        ..PipelineConfig::default()
    });
    let mut surface = RecordingSurface::new("x\n");
    let report = orchestrator.run(&mut surface, &CommandLine::new("true"), Path::new(NAME));

    assert_eq!(report.outcome, EventOutcome::Failed);
    assert_eq!(report.errors.len(), 1);
    match &report.errors[0] {
        PipelineError::DiffFailed { code, output, .. } => {
            assert_eq!(*code, Some(2));
            assert_eq!(output, "diff: invalid option\n");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(surface.edit_ops().is_empty());
    let messages = reported(&surface);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("diff: invalid option"));
    assert!(messages[0].starts_with(&fake_diff.to_string_lossy().into_owned()));
    assert_eq!(surface.text(), "x\n");
}

#[test]
fn test_formatter_launch_failure_leaves_buffer_untouched() {
    let mut surface = RecordingSurface::new("x\n");
    let report = orchestrator(DiffInputStrategy::default()).run(
        &mut surface,
        &CommandLine::new("savefmt-test-missing-formatter"),
        Path::new(NAME),
    );

    assert_eq!(report.outcome, EventOutcome::Failed);
    assert!(matches!(report.errors[..], [PipelineError::Process(_)]));
    assert_eq!(surface.ops().len(), 2);
    assert_eq!(surface.ops()[0], SurfaceOp::ReadAll);
    assert!(reported(&surface)[0].contains("savefmt-test-missing-formatter"));
}

#[test]
fn test_failed_formatter_never_reaches_apply() {
    let mut surface = RecordingSurface::new("keep me\n");
    let formatter = sh("echo 'example.txt:1: syntax error' >&2; exit 1");
    let report = orchestrator(DiffInputStrategy::default()).run(
        &mut surface,
        &formatter,
        Path::new(NAME),
    );

    assert_eq!(report.outcome, EventOutcome::Failed);
    match &report.errors[..] {
        [PipelineError::FormatterFailed { command, code, stderr }] => {
            assert_eq!(command, &formatter.to_string());
            assert_eq!(*code, Some(1));
            assert_eq!(stderr, "example.txt:1: syntax error\n");
        }
        other => panic!("unexpected errors {other:?}"),
    }
    assert!(surface.edit_ops().is_empty());
    assert_eq!(surface.text(), "keep me\n");
}

#[test]
fn test_formatter_warnings_are_shown_on_success() {
    let mut surface = RecordingSurface::new("ok\n");
    let report = orchestrator(DiffInputStrategy::default()).run(
        &mut surface,
        &sh("cat; echo 'warning: deprecated option' >&2"),
        Path::new(NAME),
    );

    assert_eq!(report.outcome, EventOutcome::Unchanged);
    assert_eq!(report.warnings, vec!["warning: deprecated option\n".to_string()]);
    assert_eq!(reported(&surface), vec!["warning: deprecated option\n".to_string()]);
}

#[test]
fn test_log_sink_keeps_errors_off_the_surface() {
    let orchestrator = Orchestrator::new(PipelineConfig {
        error_sink: ErrorSink::Log,
        ..PipelineConfig::default()
    });
    let mut surface = RecordingSurface::new("x\n");
    let report = orchestrator.run(
        &mut surface,
        &CommandLine::new("savefmt-test-missing-formatter"),
        Path::new(NAME),
    );

    assert_eq!(report.outcome, EventOutcome::Failed);
    assert!(reported(&surface).is_empty());
}

#[test]
fn test_missing_diff_program_is_the_only_error() {
    let orchestrator = Orchestrator::new(PipelineConfig {
        diff_program: "savefmt-test-missing-diff".to_string(),
        ..PipelineConfig::default()
    });
    // Large enough that `cat` is still writing when its reader disappears.
    let text: String = (0..200_000).map(|i| format!("line {i}\n")).collect();
    let mut surface = RecordingSurface::new(&text);
    let report = orchestrator.run(&mut surface, &CommandLine::new("cat"), Path::new(NAME));

    assert_eq!(report.outcome, EventOutcome::Failed);
    match &report.errors[..] {
        [PipelineError::Process(ProcessError::Launch { command, .. })] => {
            assert!(command.starts_with("savefmt-test-missing-diff -u"));
        }
        other => panic!("unexpected errors {other:?}"),
    }
    let messages = reported(&surface);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("savefmt-test-missing-diff"));
    assert!(surface.edit_ops().is_empty());
}
