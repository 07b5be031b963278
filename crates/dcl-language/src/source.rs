//! Source locations for language tree elements.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Identifies the script a tree was parsed from (usually a file name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceIdentifier(pub String);

impl SourceIdentifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 1-based line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Where an element lives in the source text.
///
/// `start..end` is a byte range into the original text; `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceData {
    pub identifier: SourceIdentifier,
    pub start: usize,
    pub end: usize,
    pub start_position: Position,
    pub end_position: Position,
}

impl SourceData {
    /// The byte range covered by the element.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Returns the text of the element.
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        source.get(self.range()).unwrap_or("")
    }

    /// Builds the smallest span covering both `self` and `other`.
    pub fn join(&self, other: &SourceData) -> SourceData {
        let (start, start_position) = if other.start < self.start {
            (other.start, other.start_position)
        } else {
            (self.start, self.start_position)
        };
        let (end, end_position) = if other.end > self.end {
            (other.end, other.end_position)
        } else {
            (self.end, self.end_position)
        };
        SourceData {
            identifier: self.identifier.clone(),
            start,
            end,
            start_position,
            end_position,
        }
    }
}

impl fmt::Display for SourceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "indexes: {}..{}, line/column: {}/{}..{}/{}, file: {}",
            self.start,
            self.end,
            self.start_position.line,
            self.start_position.column,
            self.end_position.line,
            self.end_position.column,
            self.identifier
        )
    }
}

/// Maps byte offsets of one text to line/column positions.
#[derive(Debug, Clone)]
pub(crate) struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset + 1);
            }
        }
        Self { line_starts }
    }

    pub(crate) fn position(&self, text: &str, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        let column = text
            .get(line_start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(offset - line_start);
        Position {
            line: line as u32 + 1,
            column: column as u32 + 1,
        }
    }
}
