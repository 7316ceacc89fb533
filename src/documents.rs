//! URI → [`TextDocument`] map, shared/exclusive-locked.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::document::TextDocument;

/// The server's open-document table. Readers (accessors, validators) may
/// traverse concurrently; `didOpen`/`didClose`/`didRenameFiles` take the
/// write lock.
#[derive(Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<String, Arc<TextDocument>>>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<TextDocument>>> {
        self.documents
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<TextDocument>>> {
        self.documents
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Insert a newly opened document, replacing any existing entry for the
    /// same URI (a `didOpen` for an already-open URI is treated as a reset,
    /// matching common editor behavior around reloads).
    pub fn open(&self, document: TextDocument) {
        self.write()
            .insert(document.uri().to_string(), Arc::new(document));
    }

    /// Look up a document by URI.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<Arc<TextDocument>> {
        self.read().get(uri).cloned()
    }

    /// Remove a document by URI, returning it if present.
    pub fn close(&self, uri: &str) -> Option<Arc<TextDocument>> {
        self.write().remove(uri)
    }

    /// Move a document from `old_uri` to `new_uri`, used by
    /// `workspace/didRenameFiles`. No-op if `old_uri` is not open.
    pub fn rename(&self, old_uri: &str, new_uri: &str) {
        let mut guard = self.write();
        if let Some(doc) = guard.remove(old_uri) {
            guard.insert(new_uri.to_string(), doc);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn uris(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }
}
