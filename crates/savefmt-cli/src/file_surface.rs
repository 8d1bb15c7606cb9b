//! Buffers backed by files on disk.

use savefmt_core::{Address, RopeSurface, SurfaceError, TextSurface};
use savefmt_pipeline::{SaveEvent, SurfaceOpener};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A file loaded into a [`RopeSurface`]. Edits reach the disk on [`close`](TextSurface::close).
#[derive(Debug)]
pub struct FileSurface {
    path: PathBuf,
    inner: RopeSurface,
}

impl FileSurface {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SurfaceError> {
        let path = path.into();
        let data = fs::read(&path)?;
        let inner = RopeSurface::from_bytes(&data)?;
        Ok(Self { path, inner })
    }

    /// Replace the file with the buffer contents in one rename.
    fn write_back(&self) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let permissions = fs::metadata(&self.path)?.permissions();

        let mut file = tempfile::Builder::new()
            .prefix(".savefmt-")
            .tempfile_in(dir)?;
        file.write_all(self.inner.text().as_bytes())?;
        file.as_file().sync_all()?;
        file.as_file().set_permissions(permissions)?;
        file.persist(&self.path)?;
        Ok(())
    }
}

impl TextSurface for FileSurface {
    fn read_all(&mut self) -> Result<Vec<u8>, SurfaceError> {
        self.inner.read_all()
    }

    fn set_cursor(&mut self, addr: Address) -> Result<(), SurfaceError> {
        self.inner.set_cursor(addr)
    }

    fn extend_selection(&mut self, addr: Address) -> Result<(), SurfaceError> {
        self.inner.extend_selection(addr)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SurfaceError> {
        self.inner.write(data)
    }

    fn clear_undo_group(&mut self) -> Result<(), SurfaceError> {
        self.inner.clear_undo_group()
    }

    fn begin_undo_group(&mut self) -> Result<(), SurfaceError> {
        self.inner.begin_undo_group()
    }

    fn report_error(&mut self, text: &str) {
        eprintln!("{}: {}", self.path.display(), text.trim_end());
        self.inner.report_error(text);
    }

    fn close(&mut self) -> Result<(), SurfaceError> {
        if self.inner.is_modified() {
            self.write_back()?;
            log::debug!("{}: written back", self.path.display());
        }
        self.inner.close()
    }
}

/// Opens the file each event names.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileOpener;

impl SurfaceOpener for FileOpener {
    type Surface = FileSurface;

    fn open(&self, event: &SaveEvent) -> Result<FileSurface, SurfaceError> {
        FileSurface::open(&event.name)
    }
}
