use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

/// A 1-based line/column position, matching the addressing scheme of the
/// editor widgets this crate is meant to sit behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open region of the buffer: `start` is inclusive, `end` exclusive.
///
/// An end column of [`END_OF_LINE`] is a sentinel meaning "through the end of
/// that line's content" and is clamped by the buffer at edit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// Sentinel end column for "the full remainder of the line".
pub const END_OF_LINE: usize = usize::MAX;

impl Range {
    pub fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start: Position::new(start_line, start_column),
            end: Position::new(end_line, end_column),
        }
    }

    /// Number of whole lines a pure deletion collapses (zero for same-line edits).
    pub fn line_span(&self) -> usize {
        self.end.line.saturating_sub(self.start.line)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Provenance tag attached to every edit and preserved verbatim into its
/// [`ContentChange`] record.
///
/// Modeled as an explicit value rather than a bare boolean marker so the
/// synchronizer's classification heuristic stays visible and testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
    /// Written by the synchronizer itself while applying a composition.
    Internal,
    /// The one-time removal of the initial placeholder message.
    PlaceholderRemoval,
    /// Anything else: a user keystroke, paste, or host-driven edit.
    External,
}

/// One entry of the buffer's change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    /// The region that was replaced, with columns clamped to line extents.
    pub range: Range,
    /// The replacement text (empty for a pure deletion).
    pub text: String,
    /// Unicode scalar count of the removed span, newlines included.
    pub removed_chars: usize,
    /// Provenance of the edit that produced this change.
    pub origin: EditOrigin,
}

impl ContentChange {
    pub fn is_deletion(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("edit range {range} out of bounds in buffer of {line_count} lines")]
    OutOfBounds { range: Range, line_count: usize },

    #[error("edit range {range} has start after end")]
    InvertedRange { range: Range },
}

/// In-memory line-addressed text buffer with atomic range replacement and a
/// drainable change feed.
///
/// Stands in for the host editor's document model: every edit is applied as a
/// single replacement over a line/column range and emits exactly one
/// [`ContentChange`] carrying the edit's [`EditOrigin`] through unmodified.
#[derive(Debug)]
pub struct TextBuffer {
    lines: Vec<String>,
    changes: VecDeque<ContentChange>,
}

impl Default for TextBuffer {
    /// Same as `TextBuffer::new("")`: one empty line, never zero lines.
    fn default() -> Self {
        Self::new("")
    }
}

impl TextBuffer {
    /// Create a buffer holding `text`. An empty string yields a single empty line.
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
            changes: VecDeque::new(),
        }
    }

    /// Full buffer content, lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Character length of a 1-based line, or `None` if out of bounds.
    pub fn line_len(&self, line: usize) -> Option<usize> {
        self.lines.get(line.checked_sub(1)?).map(|l| l.chars().count())
    }

    /// Replace the entire buffer content in one edit.
    pub fn set_text(&mut self, text: &str, origin: EditOrigin) -> ContentChange {
        let full = Range::new(1, 1, self.lines.len(), END_OF_LINE);
        // The full range is always valid, so this cannot fail.
        self.apply_edit(full, text, origin)
            .expect("full-buffer range is always valid")
    }

    /// Atomically replace `range` with `text`, recording one change.
    ///
    /// Columns beyond a line's content (including the [`END_OF_LINE`]
    /// sentinel) are clamped to the line's end before the splice.
    pub fn apply_edit(
        &mut self,
        range: Range,
        text: &str,
        origin: EditOrigin,
    ) -> Result<ContentChange, BufferError> {
        let line_count = self.lines.len();
        if range.start.line == 0
            || range.end.line == 0
            || range.start.line > line_count
            || range.end.line > line_count
        {
            return Err(BufferError::OutOfBounds { range, line_count });
        }
        if range.start.line > range.end.line {
            return Err(BufferError::InvertedRange { range });
        }

        let start_line = &self.lines[range.start.line - 1];
        let end_line = &self.lines[range.end.line - 1];
        let start_col = clamp_column(start_line, range.start.column);
        let end_col = clamp_column(end_line, range.end.column);
        if range.start.line == range.end.line && start_col > end_col {
            return Err(BufferError::InvertedRange { range });
        }

        let removed_chars = self.removed_char_count(&range, start_col, end_col);

        let prefix = start_line[..byte_index(start_line, start_col)].to_string();
        let suffix = end_line[byte_index(end_line, end_col)..].to_string();
        let spliced = format!("{prefix}{text}{suffix}");
        let replacement: Vec<String> = spliced.split('\n').map(str::to_string).collect();
        self.lines
            .splice(range.start.line - 1..range.end.line, replacement);

        let change = ContentChange {
            range: Range::new(
                range.start.line,
                start_col + 1,
                range.end.line,
                end_col + 1,
            ),
            text: text.to_string(),
            removed_chars,
            origin,
        };
        self.changes.push_back(change.clone());
        Ok(change)
    }

    /// Take all changes recorded since the last drain, oldest first.
    pub fn drain_changes(&mut self) -> Vec<ContentChange> {
        self.changes.drain(..).collect()
    }

    fn removed_char_count(&self, range: &Range, start_col: usize, end_col: usize) -> usize {
        if range.start.line == range.end.line {
            return end_col - start_col;
        }
        let first = self.lines[range.start.line - 1].chars().count() - start_col;
        let middle: usize = self.lines[range.start.line..range.end.line - 1]
            .iter()
            .map(|l| l.chars().count() + 1)
            .sum();
        // +1 for the newline ending the first line.
        first + 1 + middle + end_col
    }
}

/// Clamp a 1-based column to the line's character extent, 0-based.
fn clamp_column(line: &str, column: usize) -> usize {
    column.saturating_sub(1).min(line.chars().count())
}

/// Byte offset of a 0-based character index within `line`.
fn byte_index(line: &str, char_idx: usize) -> usize {
    line.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(line.len())
}
