#![cfg(unix)]

use pretty_assertions::assert_eq;
use regex::Regex;
use savefmt_core::{Address, RopeSurface, SurfaceError, TextSurface};
use savefmt_pipeline::{
    ArgTemplate, DispatchError, DispatchSummary, Dispatcher, EventFilter, Orchestrator,
    PipelineConfig, SaveEvent, SurfaceOpener,
};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// A buffer shared between the test and the workers.
#[derive(Clone)]
struct SharedSurface(Arc<Mutex<RopeSurface>>);

impl SharedSurface {
    fn new(text: &str) -> Self {
        Self(Arc::new(Mutex::new(RopeSurface::new(text))))
    }

    fn get(&self) -> MutexGuard<'_, RopeSurface> {
        self.0.lock().unwrap()
    }
}

impl TextSurface for SharedSurface {
    fn read_all(&mut self) -> Result<Vec<u8>, SurfaceError> {
        self.get().read_all()
    }

    fn set_cursor(&mut self, addr: Address) -> Result<(), SurfaceError> {
        self.get().set_cursor(addr)
    }

    fn extend_selection(&mut self, addr: Address) -> Result<(), SurfaceError> {
        self.get().extend_selection(addr)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SurfaceError> {
        self.get().write(data)
    }

    fn clear_undo_group(&mut self) -> Result<(), SurfaceError> {
        self.get().clear_undo_group()
    }

    fn begin_undo_group(&mut self) -> Result<(), SurfaceError> {
        self.get().begin_undo_group()
    }

    fn report_error(&mut self, text: &str) {
        self.get().report_error(text)
    }

    // The buffer outlives one event, so closing only drops this handle.
    fn close(&mut self) -> Result<(), SurfaceError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Buffers(Arc<Mutex<HashMap<u64, SharedSurface>>>);

impl Buffers {
    fn insert(&self, id: u64, text: &str) -> SharedSurface {
        let surface = SharedSurface::new(text);
        self.0.lock().unwrap().insert(id, surface.clone());
        surface
    }
}

impl SurfaceOpener for Buffers {
    type Surface = SharedSurface;

    fn open(&self, event: &SaveEvent) -> Result<SharedSurface, SurfaceError> {
        self.0
            .lock()
            .unwrap()
            .get(&event.id)
            .cloned()
            .ok_or(SurfaceError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no buffer {}", event.id),
            )))
    }
}

fn dispatcher(buffers: Buffers, pattern: &str, argv: &[&str]) -> Dispatcher<Buffers> {
    Dispatcher::new(
        buffers,
        Orchestrator::new(PipelineConfig::default()),
        EventFilter::new(Regex::new(pattern).unwrap()),
        ArgTemplate::parse(argv).unwrap(),
    )
}

fn ok(events: Vec<SaveEvent>) -> impl Iterator<Item = Result<SaveEvent, io::Error>> {
    events.into_iter().map(Ok)
}

#[test]
fn test_saves_of_one_buffer_are_serialized() {
    let buffers = Buffers::default();
    let first = buffers.insert(1, "a\nb\nc\n");
    let second = buffers.insert(2, "b\nb\n");

    let summary = dispatcher(buffers, r"\.txt$", &["sed", "s/b/X/"])
        .run(ok(vec![
            SaveEvent::put(1, "/src/one.txt"),
            SaveEvent::put(1, "/src/one.txt"),
            SaveEvent::put(2, "/src/two.txt"),
            SaveEvent::put(3, "/src/three.rs"),
        ]))
        .unwrap();

    // Whichever save of buffer 1 runs second sees the first one's result.
    assert_eq!(
        summary,
        DispatchSummary {
            received: 4,
            matched: 3,
            skipped: 0,
            applied: 2,
            unchanged: 1,
            failed: 0,
        }
    );
    assert_eq!(first.get().text(), "a\nX\nc\n");
    assert_eq!(second.get().text(), "X\nX\n");
    assert_eq!(first.get().undo_depth(), 1);
}

#[test]
fn test_non_put_operations_are_ignored() {
    let buffers = Buffers::default();
    let buffer = buffers.insert(1, "b\n");

    let summary = dispatcher(buffers, "", &["sed", "s/b/X/"])
        .run(ok(vec![SaveEvent {
            id: 1,
            op: "new".to_string(),
            name: "/src/one.txt".into(),
        }]))
        .unwrap();

    assert_eq!(summary.received, 1);
    assert_eq!(summary.matched, 0);
    assert_eq!(buffer.get().text(), "b\n");
}

#[test]
fn test_file_name_is_templated_into_arguments() {
    let buffers = Buffers::default();
    let buffer = buffers.insert(5, "old\n");

    let summary = dispatcher(
        buffers,
        "",
        &["sh", "-c", "cat >/dev/null; echo \"$1\"", "sh", "{{.Basename}} in {{.Dirname}}"],
    )
    .run(ok(vec![SaveEvent::put(5, "/home/me/notes.txt")]))
    .unwrap();

    assert_eq!(summary.applied, 1);
    assert_eq!(buffer.get().text(), "notes.txt in /home/me\n");
}

#[test]
fn test_unopenable_buffer_counts_as_failed() {
    let summary = dispatcher(Buffers::default(), "", &["cat"])
        .run(ok(vec![SaveEvent::put(42, "/src/gone.txt")]))
        .unwrap();

    assert_eq!(summary.matched, 1);
    assert_eq!(summary.failed, 1);
}

#[test]
fn test_non_utf8_name_is_skipped() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let buffers = Buffers::default();
    buffers.insert(1, "b\n");
    let name = OsStr::from_bytes(b"/src/\xff.txt");

    let summary = dispatcher(buffers, "", &["sed", "s/b/X/", "{{.Fullname}}"])
        .run(ok(vec![SaveEvent::put(1, name)]))
        .unwrap();

    assert_eq!(summary.matched, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
}

#[test]
fn test_source_error_stops_the_loop_after_running_workers() {
    let buffers = Buffers::default();
    let buffer = buffers.insert(1, "b\n");

    let events = vec![
        Ok(SaveEvent::put(1, "/src/one.txt")),
        Err(io::Error::new(io::ErrorKind::UnexpectedEof, "event log closed")),
        Ok(SaveEvent::put(1, "/src/one.txt")),
    ];
    let err = dispatcher(buffers, "", &["sed", "s/b/X/"])
        .run(events)
        .unwrap_err();

    assert!(matches!(err, DispatchError::Source(_)));
    assert!(err.to_string().contains("event log closed"));
    assert_eq!(buffer.get().text(), "X\n");
}
