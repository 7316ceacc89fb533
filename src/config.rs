//! URI → configuration cache.
//!
//! `workspace/didChangeConfiguration` invalidates the whole cache; handlers
//! that need a document's effective configuration call
//! [`ConfigCache::get_or_fetch`], which serves a cached value or fetches a
//! fresh one (typically via a server-initiated `workspace/configuration`
//! request) and remembers it until the next invalidation.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

#[derive(Default)]
pub struct ConfigCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl ConfigCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Serve a cached configuration value for `uri`, or compute and cache
    /// one with `fetch` on a miss.
    pub fn get_or_fetch(&self, uri: &str, fetch: impl FnOnce() -> Value) -> Value {
        if let Some(value) = self.lock().get(uri).cloned() {
            return value;
        }
        let value = fetch();
        self.lock().insert(uri.to_string(), value.clone());
        value
    }

    /// Drop every cached entry, forcing the next `get_or_fetch` per URI to
    /// re-fetch. Called on `workspace/didChangeConfiguration`.
    pub fn invalidate_all(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
