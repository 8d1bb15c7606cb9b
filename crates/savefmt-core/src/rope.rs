//! In-memory [`TextSurface`] backed by a rope.
//!
//! Only `\n` counts as a line break here, matching how `diff` numbers lines; `\r` is
//! ordinary content.

use crate::error::SurfaceError;
use crate::surface::{Address, TextSurface};
use ropey::Rope;

#[derive(Debug, Clone)]
struct TextEdit {
    /// Char offset the edit starts at.
    start: usize,
    deleted: String,
    inserted: String,
}

#[derive(Debug, Clone)]
struct UndoStep {
    group_id: usize,
    edit: TextEdit,
}

/// Undo history grouped by marks.
///
/// Edits made while a group is open share its id and undo together. Edits made with no
/// open group each get a group of their own.
#[derive(Debug, Default)]
struct UndoHistory {
    steps: Vec<UndoStep>,
    next_group_id: usize,
    open_group_id: Option<usize>,
}

impl UndoHistory {
    fn begin_group(&mut self) {
        self.open_group_id = Some(self.allocate_group());
    }

    fn end_group(&mut self) {
        self.open_group_id = None;
    }

    fn allocate_group(&mut self) -> usize {
        let id = self.next_group_id;
        self.next_group_id = self.next_group_id.wrapping_add(1);
        id
    }

    fn push(&mut self, edit: TextEdit) {
        let group_id = match self.open_group_id {
            Some(id) => id,
            None => self.allocate_group(),
        };
        self.steps.push(UndoStep { group_id, edit });
    }

    fn pop_group(&mut self) -> Option<Vec<TextEdit>> {
        let last_group_id = self.steps.last().map(|s| s.group_id)?;
        let mut edits = Vec::new();
        while let Some(step) = self.steps.pop_if(|s| s.group_id == last_group_id) {
            edits.push(step.edit);
        }
        Some(edits)
    }

    fn depth(&self) -> usize {
        let mut groups = 0;
        let mut last = None;
        for step in &self.steps {
            if last != Some(step.group_id) {
                groups += 1;
                last = Some(step.group_id);
            }
        }
        groups
    }
}

/// A text buffer with a dot, line addressing and grouped undo.
///
/// # Example
///
/// ```rust
/// use savefmt_core::{Address, RopeSurface, TextSurface};
///
/// let mut surface = RopeSurface::new("a\nb\nc\n");
/// surface.set_cursor(Address::LineStart(1)).unwrap();
/// surface.extend_selection(Address::NextLine).unwrap();
/// surface.write(b"X\n").unwrap();
/// assert_eq!(surface.text(), "a\nX\nc\n");
/// ```
#[derive(Debug)]
pub struct RopeSurface {
    rope: Rope,
    /// Dot as a half-open char range.
    dot: (usize, usize),
    undo: UndoHistory,
    errors: Vec<String>,
    modified: bool,
    closed: bool,
}

impl RopeSurface {
    /// Create a surface holding `text`, dot at the start.
    pub fn new(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            dot: (0, 0),
            undo: UndoHistory::default(),
            errors: Vec::new(),
            modified: false,
            closed: false,
        }
    }

    /// Create a surface from raw bytes, which must be UTF-8.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SurfaceError> {
        let text = std::str::from_utf8(data).map_err(|_| SurfaceError::InvalidUtf8)?;
        Ok(Self::new(text))
    }

    /// Full buffer text.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Current dot as char offsets `(start, end)`.
    pub fn dot(&self) -> (usize, usize) {
        self.dot
    }

    /// Number of lines as the rope counts them (a trailing newline opens an empty last line).
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Whether any write changed the buffer since creation.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Errors passed to [`TextSurface::report_error`], oldest first.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Number of undoable groups.
    pub fn undo_depth(&self) -> usize {
        self.undo.depth()
    }

    /// Revert the most recent undo group. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(edits) = self.undo.pop_group() else {
            return false;
        };

        // `edits` is newest first, which is the order they must be reverted in.
        for edit in &edits {
            let inserted_len = edit.inserted.chars().count();
            self.rope.remove(edit.start..edit.start + inserted_len);
            self.rope.insert(edit.start, &edit.deleted);
        }

        if let Some(oldest) = edits.last() {
            self.dot = (oldest.start, oldest.start);
        }
        self.undo.end_group();
        true
    }

    fn ensure_open(&self) -> Result<(), SurfaceError> {
        if self.closed {
            Err(SurfaceError::Closed)
        } else {
            Ok(())
        }
    }

    fn line_start(&self, line: usize) -> usize {
        let line = line.min(self.rope.len_lines());
        self.rope.line_to_char(line)
    }

    /// Char offset just past the line containing `pos` (its newline included).
    fn end_of_line_at(&self, pos: usize) -> usize {
        if pos >= self.rope.len_chars() {
            return self.rope.len_chars();
        }
        let line = self.rope.char_to_line(pos);
        self.rope.line_to_char(line + 1)
    }
}

impl TextSurface for RopeSurface {
    fn read_all(&mut self) -> Result<Vec<u8>, SurfaceError> {
        self.ensure_open()?;
        Ok(self.text().into_bytes())
    }

    fn set_cursor(&mut self, addr: Address) -> Result<(), SurfaceError> {
        self.ensure_open()?;
        let pos = match addr {
            Address::LineStart(line) => self.line_start(line),
            Address::NextLine => self.end_of_line_at(self.dot.1),
        };
        self.dot = (pos, pos);
        Ok(())
    }

    fn extend_selection(&mut self, addr: Address) -> Result<(), SurfaceError> {
        self.ensure_open()?;
        let end = match addr {
            Address::LineStart(line) => self.line_start(line).max(self.dot.0),
            Address::NextLine => self.end_of_line_at(self.dot.1),
        };
        self.dot.1 = end;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SurfaceError> {
        self.ensure_open()?;
        let inserted = std::str::from_utf8(data).map_err(|_| SurfaceError::InvalidUtf8)?;
        let (start, end) = self.dot;
        if start == end && inserted.is_empty() {
            return Ok(());
        }

        let deleted = self.rope.slice(start..end).to_string();
        self.rope.remove(start..end);
        self.rope.insert(start, inserted);

        let pos = start + inserted.chars().count();
        self.dot = (pos, pos);
        self.modified = true;
        self.undo.push(TextEdit {
            start,
            deleted,
            inserted: inserted.to_string(),
        });
        Ok(())
    }

    fn clear_undo_group(&mut self) -> Result<(), SurfaceError> {
        self.ensure_open()?;
        self.undo.end_group();
        Ok(())
    }

    fn begin_undo_group(&mut self) -> Result<(), SurfaceError> {
        self.ensure_open()?;
        self.undo.begin_group();
        Ok(())
    }

    fn report_error(&mut self, text: &str) {
        self.errors.push(text.to_string());
    }

    fn close(&mut self) -> Result<(), SurfaceError> {
        self.closed = true;
        Ok(())
    }
}
