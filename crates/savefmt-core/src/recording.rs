//! A surface that records every call, for asserting exact operation sequences in tests.

use crate::error::SurfaceError;
use crate::rope::RopeSurface;
use crate::surface::{Address, TextSurface};

/// One recorded call against a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    /// `read_all`
    ReadAll,
    /// `set_cursor`
    SetCursor(Address),
    /// `extend_selection`
    ExtendSelection(Address),
    /// `write`, with the written text (lossily decoded)
    Write(String),
    /// `clear_undo_group`
    ClearUndoGroup,
    /// `begin_undo_group`
    BeginUndoGroup,
    /// `report_error`
    ReportError(String),
    /// `close`
    Close,
}

impl SurfaceOp {
    /// Whether this call can change the buffer or its dot.
    pub fn is_edit(&self) -> bool {
        matches!(
            self,
            Self::SetCursor(_) | Self::ExtendSelection(_) | Self::Write(_)
        )
    }
}

/// [`RopeSurface`] wrapper that logs each call before forwarding it.
#[derive(Debug)]
pub struct RecordingSurface {
    inner: RopeSurface,
    ops: Vec<SurfaceOp>,
}

impl RecordingSurface {
    /// Create a recording surface holding `text`.
    pub fn new(text: &str) -> Self {
        Self {
            inner: RopeSurface::new(text),
            ops: Vec::new(),
        }
    }

    /// Calls made so far, oldest first.
    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    /// Calls that touch the buffer or its dot.
    pub fn edit_ops(&self) -> Vec<SurfaceOp> {
        self.ops.iter().filter(|op| op.is_edit()).cloned().collect()
    }

    /// Forget the recorded calls.
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// The wrapped surface.
    pub fn inner(&self) -> &RopeSurface {
        &self.inner
    }

    /// Mutable access to the wrapped surface (calls made through it are not recorded).
    pub fn inner_mut(&mut self) -> &mut RopeSurface {
        &mut self.inner
    }

    /// Full buffer text.
    pub fn text(&self) -> String {
        self.inner.text()
    }
}

impl TextSurface for RecordingSurface {
    fn read_all(&mut self) -> Result<Vec<u8>, SurfaceError> {
        self.ops.push(SurfaceOp::ReadAll);
        self.inner.read_all()
    }

    fn set_cursor(&mut self, addr: Address) -> Result<(), SurfaceError> {
        self.ops.push(SurfaceOp::SetCursor(addr));
        self.inner.set_cursor(addr)
    }

    fn extend_selection(&mut self, addr: Address) -> Result<(), SurfaceError> {
        self.ops.push(SurfaceOp::ExtendSelection(addr));
        self.inner.extend_selection(addr)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SurfaceError> {
        self.ops
            .push(SurfaceOp::Write(String::from_utf8_lossy(data).into_owned()));
        self.inner.write(data)
    }

    fn clear_undo_group(&mut self) -> Result<(), SurfaceError> {
        self.ops.push(SurfaceOp::ClearUndoGroup);
        self.inner.clear_undo_group()
    }

    fn begin_undo_group(&mut self) -> Result<(), SurfaceError> {
        self.ops.push(SurfaceOp::BeginUndoGroup);
        self.inner.begin_undo_group()
    }

    fn report_error(&mut self, text: &str) {
        self.ops.push(SurfaceOp::ReportError(text.to_string()));
        self.inner.report_error(text);
    }

    fn close(&mut self) -> Result<(), SurfaceError> {
        self.ops.push(SurfaceOp::Close);
        self.inner.close()
    }
}
