//! Per-URI document model and the incremental edit algebra.
//!
//! Grounded on the general shape of
//! `examples/other_examples/*perl-lsp*state-document.rs` (a document struct
//! owning text + version + a position index, rebuilt wholesale on every
//! edit) but using a plain `String` + [`LineIndex`] representation rather
//! than a rope, since the required properties only need `O(n)`
//! rebuild-on-edit, not `O(log n)` incremental maintenance.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{LspError, Result};
use crate::position::{LineIndex, Position};
use crate::uri::parse_uri;

/// A single content-change event from `textDocument/didChange`.
#[derive(Debug, Clone)]
pub enum ContentChange {
    /// `Range`-scoped edit: replace `range` with `text`.
    Incremental { range: crate::position::Range, text: String },
    /// Whole-document replacement.
    Whole { text: String },
}

impl ContentChange {
    #[must_use]
    pub fn is_whole_document(&self) -> bool {
        matches!(self, Self::Whole { .. })
    }
}

impl TryFrom<lsp_types::TextDocumentContentChangeEvent> for ContentChange {
    type Error = LspError;

    fn try_from(event: lsp_types::TextDocumentContentChangeEvent) -> Result<Self> {
        Ok(match event.range {
            Some(range) => Self::Incremental {
                range: range.into(),
                text: event.text,
            },
            None => Self::Whole { text: event.text },
        })
    }
}

/// A single owned document: URI, language id, version, text, and a line
/// index recomputed from scratch on every `apply`.
///
/// The whole of `apply` executes under one internal mutex so a document is
/// never observed partially edited; [`TextDocument::text`] and
/// [`TextDocument::version`] take a fresh snapshot rather than re-entering
/// that lock, so handlers may read a document's current state from inside
/// a task that is itself mid-edit-pipeline without risking deadlock: the
/// apparent need for a recursive mutex is satisfied by never needing to
/// re-enter the lock, rather than by a reentrant lock type.
pub struct TextDocument {
    uri: String,
    path: Option<PathBuf>,
    language_id: String,
    state: Mutex<DocumentState>,
}

struct DocumentState {
    version: i32,
    text: String,
    line_index: LineIndex,
}

impl TextDocument {
    /// Create a new document. Validates that `uri` starts with `file:`
    /// (optionally `file://`) and eagerly derives the canonical filesystem
    /// path.
    ///
    /// # Errors
    ///
    /// Returns [`LspError::invalid_params`] if `uri` is not a `file:` URI.
    pub fn new(
        uri: impl Into<String>,
        language_id: impl Into<String>,
        version: i32,
        text: impl Into<String>,
    ) -> Result<Self> {
        let uri = uri.into();
        let parsed = parse_uri(&uri).map_err(|e| LspError::invalid_params(e.to_string()))?;
        if !parsed.is_file {
            return Err(LspError::invalid_params(format!(
                "document URI must use the file: scheme: {uri}"
            )));
        }
        let text = text.into();
        let line_index = LineIndex::new(&text);
        Ok(Self {
            uri,
            path: parsed.path,
            language_id: language_id.into(),
            state: Mutex::new(DocumentState {
                version,
                text,
                line_index,
            }),
        })
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Snapshot of the current text.
    #[must_use]
    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    #[must_use]
    pub fn version(&self) -> i32 {
        self.lock().version
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Apply a batch of content changes atomically and set the document's
    /// version to `new_version`.
    ///
    /// Steps:
    /// 1. Sort changes by start offset ascending.
    /// 2. Translate each to `(start_byte, end_byte, patch)`, validating
    ///    ranges.
    /// 3. Fold the sorted batch into a new buffer.
    /// 4. Replace text, rebuild the line index, set version.
    ///
    /// # Errors
    ///
    /// Returns [`LspError::invalid_params`] if any change has
    /// `start > end`, or if the batch contains overlapping ranges.
    pub fn apply(&self, changes: Vec<ContentChange>, new_version: i32) -> Result<()> {
        let mut guard = self.lock();

        if changes.is_empty() {
            guard.version = new_version;
            return Ok(());
        }

        // A whole-document change discards everything else in the batch;
        // LSP clients never mix the two, and the last whole-document
        // change (if more than one were sent) wins.
        if let Some(ContentChange::Whole { text }) = changes
            .iter()
            .rev()
            .find(|c| c.is_whole_document())
            .cloned()
        {
            guard.text = text;
            guard.line_index = LineIndex::new(&guard.text);
            guard.version = new_version;
            return Ok(());
        }

        let mut edits = Vec::with_capacity(changes.len());
        for change in changes {
            let ContentChange::Incremental { range, text } = change else {
                unreachable!("whole-document changes handled above")
            };
            edits.push(translate_edit(&guard.line_index, &guard.text, range, text)?);
        }
        edits.sort_by_key(|(start, _, _)| *start);

        let mut buffer = String::with_capacity(guard.text.len());
        let mut cursor = 0usize;
        for (start, end, patch) in &edits {
            if *start < cursor {
                return Err(LspError::invalid_params(
                    "overlapping ranges in a single didChange batch",
                ));
            }
            buffer.push_str(&guard.text[cursor..*start]);
            buffer.push_str(patch);
            cursor = *end;
        }
        buffer.push_str(&guard.text[cursor..]);

        guard.text = buffer;
        guard.line_index = LineIndex::new(&guard.text);
        guard.version = new_version;
        Ok(())
    }
}

impl Clone for ContentChange {
    fn clone(&self) -> Self {
        match self {
            Self::Incremental { range, text } => Self::Incremental {
                range: *range,
                text: text.clone(),
            },
            Self::Whole { text } => Self::Whole { text: text.clone() },
        }
    }
}

/// Translate one incremental change into `(start_byte, end_byte, patch)`,
/// validating the range against the document's current extent.
fn translate_edit(
    line_index: &LineIndex,
    text: &str,
    range: crate::position::Range,
    patch: String,
) -> Result<(usize, usize, String)> {
    let start = range.start;
    let end = range.end;

    if start.line > end.line || (start.line == end.line && start.character > end.character) {
        return Err(LspError::invalid_params(format!(
            "range start {start:?} is after end {end:?}"
        )));
    }

    let len_lines = line_index.len() as u32;
    if start.line > len_lines {
        return Err(LspError::invalid_params(format!(
            "range start line {} exceeds document line count {len_lines}",
            start.line
        )));
    }

    let j = if start.line == len_lines {
        text.len()
    } else {
        line_index.position_to_offset(text, start)
    };

    let k = if end.line > len_lines {
        j + patch.len()
    } else {
        line_index.position_to_offset(text, end)
    };

    Ok((j, k, patch))
}

/// Translate an incremental change against a caller-provided `(text, line_index)`
/// pair, used by [`TextDocument::apply`]'s semantic-shortcut property tests
/// to apply changes one at a time to an intermediate document.
#[cfg(test)]
pub(crate) fn apply_single_for_test(text: &str, change: &ContentChange, version: i32) -> (String, i32) {
    let doc = TextDocument::new("file:///t.txt", "text", 0, text).unwrap();
    doc.apply(vec![change.clone()], version).unwrap();
    (doc.text(), doc.version())
}
