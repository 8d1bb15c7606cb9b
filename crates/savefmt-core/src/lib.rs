#![warn(missing_docs)]
//! `savefmt-core` - replay a unified diff as minimal in-place edits.
//!
//! # Overview
//!
//! Reformatting a file that is open in an editor by replacing the whole buffer throws away
//! the cursor, the scroll offset and any marks, and leaves one huge undo entry. This crate
//! instead takes the `diff -u` between the buffer and its formatted version and replays it
//! line by line against the live buffer, touching only the lines that changed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  translate: EditTranslator                  │  ← diff items → surface calls
//! ├─────────────────────────────────────────────┤
//! │  diff: parse_unified (lazy, single pass)    │  ← bytes → DiffItem
//! ├─────────────────────────────────────────────┤
//! │  surface: TextSurface (dot, write, undo)    │  ← the live buffer
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use savefmt_core::{RopeSurface, apply_unified_diff};
//!
//! let mut surface = RopeSurface::new("a\nb\nc\n");
//! let diff = "--- old\n+++ new\n@@ -1,3 +1,3 @@\n a\n-b\n+X\n c\n";
//!
//! let stats = apply_unified_diff(&mut surface, diff.as_bytes()).unwrap();
//! assert_eq!(surface.text(), "a\nX\nc\n");
//! assert_eq!(stats.hunks, 1);
//!
//! // The whole replay is one undo step.
//! assert!(surface.undo());
//! assert_eq!(surface.text(), "a\nb\nc\n");
//! ```
//!
//! # Line addressing
//!
//! Replay is only exact when the surface and the diff tool agree on what "line N" is:
//! lines end at `\n` and edits never split a line. [`RopeSurface`] follows that rule.

pub mod diff;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod recording;
pub mod rope;
pub mod surface;
pub mod translate;

pub use diff::{DiffItem, DiffLine, HunkHeader, UnifiedDiff, parse_unified};
pub use error::{ApplyError, DiffParseError, SurfaceError};
#[cfg(any(test, feature = "testing"))]
pub use recording::{RecordingSurface, SurfaceOp};
pub use rope::RopeSurface;
pub use surface::{Address, TextSurface};
pub use translate::{ApplyStats, CursorState, EditTranslator, apply_unified_diff};
