//! Replays a parsed unified diff as in-place edits on a [`TextSurface`].
//!
//! Hunks are applied top to bottom. A hunk's `new_start` is therefore already valid in the
//! partially edited buffer: every hunk above it has been applied and nothing below it has.
//!
//! Transition table (`pending` is [`CursorState::pending_delete`]):
//!
//! | item         | surface calls                                        | pending |
//! |--------------|------------------------------------------------------|---------|
//! | first hunk   | `clear_undo_group`, `begin_undo_group`, then as hunk |         |
//! | hunk `ns`    | flush, `set_cursor(LineStart(ns - 1))`               | false   |
//! | removed      | `extend_selection(NextLine)`                         | true    |
//! | context      | `write("")`, `set_cursor(NextLine)`                  | false   |
//! | blank        | same as context                                      | false   |
//! | added        | `write(text + "\n")` over dot                        | false   |
//! | no-newline   | nothing                                              | same    |
//! | end of input | flush                                                | false   |
//!
//! "flush" writes nothing over a pending selection, deleting the removed lines.

use crate::diff::{DiffItem, DiffLine, parse_unified};
use crate::error::{ApplyError, DiffParseError};
use crate::surface::{Address, TextSurface};
use std::io::BufRead;

/// Counters describing one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Hunks applied.
    pub hunks: usize,
    /// Lines inserted.
    pub inserted: usize,
    /// Lines deleted.
    pub deleted: usize,
    /// Context lines stepped over.
    pub context: usize,
}

impl ApplyStats {
    /// Whether the replay touched the surface at all.
    pub fn is_empty(&self) -> bool {
        self.hunks == 0
    }
}

/// Translator state besides the surface's own dot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorState {
    /// A selection of removed lines is being accumulated and has not been deleted yet.
    pub pending_delete: bool,
}

/// Drives a surface from a stream of [`DiffItem`]s.
pub struct EditTranslator<S> {
    surface: S,
    state: CursorState,
    started: bool,
    stats: ApplyStats,
}

impl<S: TextSurface> EditTranslator<S> {
    /// Create a translator over `surface`. Nothing is sent to the surface yet.
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            state: CursorState::default(),
            started: false,
            stats: ApplyStats::default(),
        }
    }

    /// Current cursor state.
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> ApplyStats {
        self.stats
    }

    /// Give back the surface.
    pub fn into_inner(self) -> S {
        self.surface
    }

    /// Apply one item.
    pub fn step(&mut self, item: &DiffItem) -> Result<(), ApplyError> {
        match item {
            DiffItem::Hunk(header) => {
                if self.started {
                    self.flush_pending()?;
                } else {
                    // One undo group spans the whole replay.
                    self.surface.clear_undo_group()?;
                    self.surface.begin_undo_group()?;
                    self.started = true;
                }
                self.surface
                    .set_cursor(Address::LineStart(header.new_start.saturating_sub(1)))?;
                self.state.pending_delete = false;
                self.stats.hunks += 1;
            }
            DiffItem::Line(DiffLine::NoNewlineMarker) => {}
            DiffItem::Line(line) if !self.started => {
                return Err(ApplyError::LineOutsideHunk(describe(line)));
            }
            DiffItem::Line(DiffLine::Removed(_)) => {
                self.surface.extend_selection(Address::NextLine)?;
                self.state.pending_delete = true;
                self.stats.deleted += 1;
            }
            DiffItem::Line(DiffLine::Context(_) | DiffLine::Blank) => {
                self.surface.write(b"")?;
                self.surface.set_cursor(Address::NextLine)?;
                self.state.pending_delete = false;
                self.stats.context += 1;
            }
            DiffItem::Line(DiffLine::Added { text, newline }) => {
                let mut data = Vec::with_capacity(text.len() + 1);
                data.extend_from_slice(text);
                if *newline {
                    data.push(b'\n');
                }
                self.surface.write(&data)?;
                self.state.pending_delete = false;
                self.stats.inserted += 1;
            }
        }
        Ok(())
    }

    /// Apply every item, then terminate any open delete range.
    ///
    /// Stops at the first error; edits already issued stay applied.
    pub fn apply<I>(mut self, items: I) -> Result<ApplyStats, ApplyError>
    where
        I: IntoIterator<Item = Result<DiffItem, DiffParseError>>,
    {
        for item in items {
            self.step(&item?)?;
        }
        self.finish()
    }

    /// Terminate any open delete range and return the counters.
    pub fn finish(mut self) -> Result<ApplyStats, ApplyError> {
        self.flush_pending()?;
        Ok(self.stats)
    }

    fn flush_pending(&mut self) -> Result<(), ApplyError> {
        if self.state.pending_delete {
            self.surface.write(b"")?;
            self.state.pending_delete = false;
        }
        Ok(())
    }
}

/// Parse `reader` as `diff -u` output and replay it on `surface`.
pub fn apply_unified_diff<S, R>(surface: S, reader: R) -> Result<ApplyStats, ApplyError>
where
    S: TextSurface,
    R: BufRead,
{
    let stats = EditTranslator::new(surface).apply(parse_unified(reader))?;
    log::debug!(
        "applied {} hunk(s): +{} -{} ({} context)",
        stats.hunks,
        stats.inserted,
        stats.deleted,
        stats.context
    );
    Ok(stats)
}

fn describe(line: &DiffLine) -> String {
    match line {
        DiffLine::Context(text) => format!(" {}", String::from_utf8_lossy(text)),
        DiffLine::Removed(text) => format!("-{}", String::from_utf8_lossy(text)),
        DiffLine::Added { text, .. } => format!("+{}", String::from_utf8_lossy(text)),
        DiffLine::NoNewlineMarker => "\\".to_string(),
        DiffLine::Blank => String::new(),
    }
}
