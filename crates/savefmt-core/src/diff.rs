//! Lazy reader for `diff -u` output.
//!
//! The reader yields [`DiffItem`]s one line at a time:
//!
//! ```text
//! --- old            (skipped, not validated)
//! +++ new            (skipped, not validated)
//! @@ -1,3 +1,3 @@    -> DiffItem::Hunk
//!  a                 -> DiffLine::Context
//! -b                 -> DiffLine::Removed
//! +X                 -> DiffLine::Added
//!  c                 -> DiffLine::Context
//! ```
//!
//! A `\ No newline at end of file` marker never shows up as an item of its own. When it
//! follows an added line, that line is reported with `newline: false`; elsewhere it is
//! dropped.

use crate::error::DiffParseError;
use regex::bytes::Regex;
use std::io::{self, BufRead};
use std::sync::LazyLock;

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@\s*-(?P<os>\d+)(?:,(?P<ol>\d+))?\s+\+(?P<ns>\d+)(?:,(?P<nl>\d+))?")
        .expect("hunk header pattern is valid")
});

/// Location of one hunk in the old and new file (1-based lines).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    /// First line of the hunk in the old file.
    pub old_start: usize,
    /// Number of old lines covered.
    pub old_len: usize,
    /// First line of the hunk in the new file.
    pub new_start: usize,
    /// Number of new lines covered.
    pub new_len: usize,
}

impl HunkHeader {
    /// Parse a `@@ -os,ol +ns,nl @@` line.
    ///
    /// A missing `,len` means a length of 1. Returns `None` for anything that does not fit
    /// the grammar, including numbers that overflow `usize`.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let caps = HUNK_HEADER.captures(line)?;
        let number = |name: &str, default: Option<usize>| -> Option<usize> {
            match caps.name(name) {
                Some(m) => std::str::from_utf8(m.as_bytes()).ok()?.parse().ok(),
                None => default,
            }
        };

        Some(Self {
            old_start: number("os", None)?,
            old_len: number("ol", Some(1))?,
            new_start: number("ns", None)?,
            new_len: number("nl", Some(1))?,
        })
    }
}

/// One line inside a hunk, with its prefix stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    /// Unchanged line (` ` prefix).
    Context(Vec<u8>),
    /// Line present only in the old file (`-` prefix).
    Removed(Vec<u8>),
    /// Line present only in the new file (`+` prefix).
    Added {
        /// Line content without the trailing newline.
        text: Vec<u8>,
        /// False when the new file ends right after this line without a newline.
        newline: bool,
    },
    /// `\ No newline at end of file`.
    NoNewlineMarker,
    /// Empty diff line, i.e. an empty context line whose leading space was stripped.
    Blank,
}

impl DiffLine {
    /// Classify a raw diff line by its first byte.
    ///
    /// Returns `None` when the line matches no known shape.
    pub fn classify(line: &[u8]) -> Option<Self> {
        let (&first, rest) = match line.split_first() {
            Some(split) => split,
            None => return Some(Self::Blank),
        };

        match first {
            b' ' => Some(Self::Context(rest.to_vec())),
            b'-' => Some(Self::Removed(rest.to_vec())),
            b'+' => Some(Self::Added {
                text: rest.to_vec(),
                newline: true,
            }),
            b'\\' => Some(Self::NoNewlineMarker),
            _ => None,
        }
    }
}

/// One element of a parsed diff stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffItem {
    /// Start of a new hunk.
    Hunk(HunkHeader),
    /// A line directive belonging to the current hunk.
    Line(DiffLine),
}

/// Single-pass iterator over the items of a unified diff.
///
/// Created by [`parse_unified`]. The iterator stops after the first error.
pub struct UnifiedDiff<R> {
    reader: R,
    line_number: usize,
    header_skipped: bool,
    lookahead: Option<Vec<u8>>,
    done: bool,
}

/// Start reading a unified diff from `reader`.
///
/// An entirely empty stream yields no items (the inputs were identical).
pub fn parse_unified<R: BufRead>(reader: R) -> UnifiedDiff<R> {
    UnifiedDiff {
        reader,
        line_number: 0,
        header_skipped: false,
        lookahead: None,
        done: false,
    }
}

impl<R: BufRead> UnifiedDiff<R> {
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        self.line_number += 1;
        Ok(Some(line))
    }

    fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self.lookahead.take() {
            Some(line) => Ok(Some(line)),
            None => self.read_line(),
        }
    }

    fn skip_file_header(&mut self) -> Result<bool, DiffParseError> {
        self.header_skipped = true;
        if self.read_line()?.is_none() {
            return Ok(false);
        }
        if self.read_line()?.is_none() {
            return Err(DiffParseError::MissingFileHeader);
        }
        Ok(true)
    }

    /// Consume a no-newline marker if it is the next line.
    fn take_no_newline_marker(&mut self) -> io::Result<bool> {
        if self.lookahead.is_none() {
            self.lookahead = self.read_line()?;
        }
        match &self.lookahead {
            Some(line) if line.first() == Some(&b'\\') => {
                self.lookahead = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn next_item(&mut self) -> Result<Option<DiffItem>, DiffParseError> {
        if !self.header_skipped && !self.skip_file_header()? {
            return Ok(None);
        }

        loop {
            let Some(line) = self.next_line()? else {
                return Ok(None);
            };
            let line_number = self.line_number;

            if let Some(header) = HunkHeader::parse(&line) {
                return Ok(Some(DiffItem::Hunk(header)));
            }

            match DiffLine::classify(&line) {
                Some(DiffLine::NoNewlineMarker) => continue,
                Some(DiffLine::Added { text, .. }) => {
                    let newline = !self.take_no_newline_marker()?;
                    return Ok(Some(DiffItem::Line(DiffLine::Added { text, newline })));
                }
                Some(other) => return Ok(Some(DiffItem::Line(other))),
                None => {
                    return Err(DiffParseError::UnrecognizedLine {
                        line_number,
                        text: String::from_utf8_lossy(&line).into_owned(),
                    });
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for UnifiedDiff<R> {
    type Item = Result<DiffItem, DiffParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_item() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn items(diff: &str) -> Vec<Result<DiffItem, String>> {
        parse_unified(diff.as_bytes())
            .map(|item| item.map_err(|err| err.to_string()))
            .collect()
    }

    fn added(text: &str, newline: bool) -> DiffItem {
        DiffItem::Line(DiffLine::Added {
            text: text.as_bytes().to_vec(),
            newline,
        })
    }

    #[test]
    fn test_hunk_header_full_form() {
        assert_eq!(
            HunkHeader::parse(b"@@ -12,7 +14,9 @@ fn main() {"),
            Some(HunkHeader {
                old_start: 12,
                old_len: 7,
                new_start: 14,
                new_len: 9,
            })
        );
    }

    #[test]
    fn test_hunk_header_omitted_lengths_default_to_one() {
        assert_eq!(
            HunkHeader::parse(b"@@ -3 +4,0 @@"),
            Some(HunkHeader {
                old_start: 3,
                old_len: 1,
                new_start: 4,
                new_len: 0,
            })
        );
    }

    #[test]
    fn test_hunk_header_rejects_malformed() {
        assert_eq!(HunkHeader::parse(b"@@ garbage @@"), None);
        assert_eq!(HunkHeader::parse(b" @@ -1,2 +1,2 @@"), None);
        assert_eq!(
            HunkHeader::parse(b"@@ -1,2 +99999999999999999999999,2 @@"),
            None
        );
    }

    #[test]
    fn test_file_header_is_skipped_without_validation() {
        let diff = "garbage one\ngarbage two\n@@ -1,1 +1,1 @@\n-a\n+b\n";
        assert_eq!(
            items(diff),
            vec![
                Ok(DiffItem::Hunk(HunkHeader {
                    old_start: 1,
                    old_len: 1,
                    new_start: 1,
                    new_len: 1,
                })),
                Ok(DiffItem::Line(DiffLine::Removed(b"a".to_vec()))),
                Ok(added("b", true)),
            ]
        );
    }

    #[test]
    fn test_empty_stream_yields_nothing() {
        assert!(items("").is_empty());
    }

    #[test]
    fn test_single_line_stream_is_missing_header() {
        assert_eq!(
            items("--- a\n"),
            vec![Err("invalid diff: missing file header".to_string())]
        );
    }

    #[test]
    fn test_line_kinds_in_order() {
        let diff = "--- a\n+++ b\n@@ -1,4 +1,4 @@\n keep\n-old\n+new\n\n";
        let got: Vec<_> = items(diff).into_iter().skip(1).collect();
        assert_eq!(
            got,
            vec![
                Ok(DiffItem::Line(DiffLine::Context(b"keep".to_vec()))),
                Ok(DiffItem::Line(DiffLine::Removed(b"old".to_vec()))),
                Ok(added("new", true)),
                Ok(DiffItem::Line(DiffLine::Blank)),
            ]
        );
    }

    #[test]
    fn test_no_newline_marker_clears_newline_on_added_line() {
        let diff = "--- a\n+++ b\n@@ -1 +1 @@\n-x\n\\ No newline at end of file\n+y\n\\ No newline at end of file\n";
        let got: Vec<_> = items(diff).into_iter().skip(1).collect();
        assert_eq!(
            got,
            vec![
                Ok(DiffItem::Line(DiffLine::Removed(b"x".to_vec()))),
                Ok(added("y", false)),
            ]
        );
    }

    #[test]
    fn test_unrecognized_line_stops_iteration() {
        let diff = "--- a\n+++ b\n@@ -1,1 +1,1 @@\n a\n?what\n a\n";
        let got = items(diff);
        assert_eq!(got.len(), 3);
        assert_eq!(
            got[2],
            Err("don't know how to parse diff line 5: \"?what\"".to_string())
        );
    }

    #[test]
    fn test_malformed_header_falls_through_to_line_dispatch() {
        let diff = "--- a\n+++ b\n@@ nonsense\n";
        assert_eq!(
            items(diff),
            vec![Err(
                "don't know how to parse diff line 3: \"@@ nonsense\"".to_string()
            )]
        );
    }

    #[test]
    fn test_carriage_return_is_content() {
        let diff = "--- a\n+++ b\n@@ -1 +1 @@\n-a\r\n+a\n";
        let got: Vec<_> = items(diff).into_iter().skip(1).collect();
        assert_eq!(
            got,
            vec![
                Ok(DiffItem::Line(DiffLine::Removed(b"a\r".to_vec()))),
                Ok(added("a", true)),
            ]
        );
    }
}
