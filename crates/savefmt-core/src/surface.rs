//! The live text surface abstraction.
//!
//! A surface is one open, editable buffer addressed the way line-oriented editors address
//! text: a *dot* (either an empty point or a selection) that is moved by line-oriented
//! address expressions, and a `write` that replaces the dot.

use crate::error::SurfaceError;

/// Line-oriented address expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// Absolute line `n` (0-based), column 0: the point after the first `n` lines.
    LineStart(usize),
    /// Current position plus one line.
    NextLine,
}

/// An open, editable buffer.
///
/// Implementations must follow these conventions:
/// - `set_cursor(LineStart(n))` makes dot the empty point at the start of line `n`, clamped
///   to the end of the buffer.
/// - `set_cursor(NextLine)` moves dot to the empty point at the start of the line after the
///   one dot ends in.
/// - `extend_selection(NextLine)` keeps dot's start and moves its end to the end of the line
///   that begins at dot's end (newline included). From an empty point this selects one line.
/// - `write` replaces dot with `data` and leaves dot as the empty point after the written
///   bytes. Writing nothing over an empty point changes nothing.
pub trait TextSurface {
    /// Snapshot the whole buffer.
    fn read_all(&mut self) -> Result<Vec<u8>, SurfaceError>;

    /// Move dot.
    fn set_cursor(&mut self, addr: Address) -> Result<(), SurfaceError>;

    /// Grow the current selection.
    fn extend_selection(&mut self, addr: Address) -> Result<(), SurfaceError>;

    /// Replace dot with `data`.
    fn write(&mut self, data: &[u8]) -> Result<(), SurfaceError>;

    /// Stop grouping edits under the current undo mark.
    fn clear_undo_group(&mut self) -> Result<(), SurfaceError>;

    /// Start a new undo group; every following edit undoes together.
    fn begin_undo_group(&mut self) -> Result<(), SurfaceError>;

    /// Show an error to the user, attributed to this buffer's file.
    fn report_error(&mut self, text: &str);

    /// Release the buffer.
    fn close(&mut self) -> Result<(), SurfaceError>;
}

impl<S: TextSurface + ?Sized> TextSurface for &mut S {
    fn read_all(&mut self) -> Result<Vec<u8>, SurfaceError> {
        (**self).read_all()
    }

    fn set_cursor(&mut self, addr: Address) -> Result<(), SurfaceError> {
        (**self).set_cursor(addr)
    }

    fn extend_selection(&mut self, addr: Address) -> Result<(), SurfaceError> {
        (**self).extend_selection(addr)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SurfaceError> {
        (**self).write(data)
    }

    fn clear_undo_group(&mut self) -> Result<(), SurfaceError> {
        (**self).clear_undo_group()
    }

    fn begin_undo_group(&mut self) -> Result<(), SurfaceError> {
        (**self).begin_undo_group()
    }

    fn report_error(&mut self, text: &str) {
        (**self).report_error(text)
    }

    fn close(&mut self) -> Result<(), SurfaceError> {
        (**self).close()
    }
}

impl<S: TextSurface + ?Sized> TextSurface for Box<S> {
    fn read_all(&mut self) -> Result<Vec<u8>, SurfaceError> {
        (**self).read_all()
    }

    fn set_cursor(&mut self, addr: Address) -> Result<(), SurfaceError> {
        (**self).set_cursor(addr)
    }

    fn extend_selection(&mut self, addr: Address) -> Result<(), SurfaceError> {
        (**self).extend_selection(addr)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SurfaceError> {
        (**self).write(data)
    }

    fn clear_undo_group(&mut self) -> Result<(), SurfaceError> {
        (**self).clear_undo_group()
    }

    fn begin_undo_group(&mut self) -> Result<(), SurfaceError> {
        (**self).begin_undo_group()
    }

    fn report_error(&mut self, text: &str) {
        (**self).report_error(text)
    }

    fn close(&mut self) -> Result<(), SurfaceError> {
        (**self).close()
    }
}
