//! `Position` and the line-offset index used to translate between LSP
//! `(line, character)` coordinates and byte offsets into document text.
//!
//! `character` counts UTF-16 code units, matching the wire protocol. This
//! module is the single place that decision is made; every other caller
//! goes through
//! [`LineIndex::position_to_offset`] / [`LineIndex::offset_to_position`].

use serde::{Deserialize, Serialize};

/// Zero-based `(line, character)` coordinate, `character` in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    #[must_use]
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl From<lsp_types::Position> for Position {
    fn from(p: lsp_types::Position) -> Self {
        Self::new(p.line, p.character)
    }
}

impl From<Position> for lsp_types::Position {
    fn from(p: Position) -> Self {
        Self::new(p.line, p.character)
    }
}

/// A start/end pair of [`Position`]s, exclusive of `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl From<lsp_types::Range> for Range {
    fn from(r: lsp_types::Range) -> Self {
        Self {
            start: r.start.into(),
            end: r.end.into(),
        }
    }
}

/// Line-offset index: `L[0] = 0`, `L[i]` is the byte offset immediately
/// following the `i-1`th line terminator. Recognizes `\n`, `\r\n`, and lone
/// `\r` as terminators, each advancing the line count by exactly one.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    offsets: Vec<usize>,
}

impl LineIndex {
    /// Build a fresh index from document text. `O(n)` in the length of `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut offsets = vec![0usize];
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    offsets.push(i + 1);
                    i += 1;
                }
                b'\r' => {
                    if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                        offsets.push(i + 2);
                        i += 2;
                    } else {
                        offsets.push(i + 1);
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }
        Self { offsets }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Byte offset at which line `line` starts, or `None` if out of range.
    #[must_use]
    pub fn line_start(&self, line: u32) -> Option<usize> {
        self.offsets.get(line as usize).copied()
    }

    /// Translate a [`Position`] to a byte offset into `text`, decoding the
    /// UTF-16 `character` count against the line's content.
    ///
    /// If `position.line >= L.len()`, the position is treated as
    /// end-of-text. `character` is clamped to the end of the line if it
    /// overruns.
    #[must_use]
    pub fn position_to_offset(&self, text: &str, position: Position) -> usize {
        let line_idx = position.line as usize;
        if line_idx >= self.offsets.len() {
            return text.len();
        }
        let line_start = self.offsets[line_idx];
        let line_end = self
            .offsets
            .get(line_idx + 1)
            .copied()
            .unwrap_or(text.len());
        let line = &text[line_start..line_end];
        line_start + utf16_offset_to_byte_offset(line, position.character)
    }

    /// Translate a byte offset back into a [`Position`], encoding the
    /// within-line portion as a UTF-16 code-unit count.
    #[must_use]
    pub fn offset_to_position(&self, text: &str, offset: usize) -> Position {
        let line_idx = match self.offsets.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.offsets[line_idx];
        let line_end = self
            .offsets
            .get(line_idx + 1)
            .copied()
            .unwrap_or(text.len());
        let clamped = offset.min(line_end).max(line_start);
        let line = &text[line_start..clamped];
        let character = line.encode_utf16().count() as u32;
        Position::new(line_idx as u32, character)
    }
}

/// Convert a UTF-16 code-unit count within `line` to a byte offset, clamping
/// to the line's length if `utf16_character` overruns it.
fn utf16_offset_to_byte_offset(line: &str, utf16_character: u32) -> usize {
    let mut utf16_count = 0u32;
    for (byte_idx, ch) in line.char_indices() {
        if utf16_count >= utf16_character {
            return byte_idx;
        }
        utf16_count += ch.len_utf16() as u32;
    }
    line.len()
}
