//! `$/cancelRequest` bookkeeping.
//!
//! The core recognizes cancellation at the protocol layer but imposes no
//! preemption: a handler that wants to honor it polls
//! [`CancellationRegistry::is_cancelled`] between units of work.

use std::collections::HashSet;
use std::sync::Mutex;

use serde_json::Value;

/// Tracks request ids the client has asked to cancel.
#[derive(Default)]
pub struct CancellationRegistry {
    cancelled: Mutex<HashSet<IdKey>>,
}

/// A `Value` wrapper with the `Eq`/`Hash` that JSON-RPC ids (integers or
/// strings) need to live in a `HashSet`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdKey {
    Int(i64),
    Str(String),
}

impl IdKey {
    fn from_value(id: &Value) -> Option<Self> {
        if let Some(n) = id.as_i64() {
            Some(Self::Int(n))
        } else {
            id.as_str().map(|s| Self::Str(s.to_string()))
        }
    }
}

impl CancellationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id` has been asked to cancel. No-op for ids that are
    /// neither integers nor strings.
    pub fn cancel(&self, id: &Value) {
        if let Some(key) = IdKey::from_value(id) {
            self.cancelled
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(key);
        }
    }

    /// Cooperative check a handler may poll between units of work.
    #[must_use]
    pub fn is_cancelled(&self, id: &Value) -> bool {
        match IdKey::from_value(id) {
            Some(key) => self
                .cancelled
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .contains(&key),
            None => false,
        }
    }

    /// Forget a request id once it has been answered, so the set does not
    /// grow without bound over the server's lifetime.
    pub fn forget(&self, id: &Value) {
        if let Some(key) = IdKey::from_value(id) {
            self.cancelled
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cancel_then_is_cancelled_reports_true() {
        let reg = CancellationRegistry::new();
        reg.cancel(&json!(7));
        assert!(reg.is_cancelled(&json!(7)));
    }

    #[test]
    fn unrelated_id_is_not_cancelled() {
        let reg = CancellationRegistry::new();
        reg.cancel(&json!(7));
        assert!(!reg.is_cancelled(&json!(8)));
    }

    #[test]
    fn forget_clears_the_entry() {
        let reg = CancellationRegistry::new();
        reg.cancel(&json!("abc"));
        reg.forget(&json!("abc"));
        assert!(!reg.is_cancelled(&json!("abc")));
    }
}
