//! The dispatch engine: message classification, lifecycle state machine,
//! outgoing-request correlation, and the extension trait subclasses
//! implement.
//!
//! The "one virtual method per LSP operation" design of the original is
//! modeled here as a single [`LanguageServerHandlers`] trait with
//! defaulted methods rather than a table of function pointers. This keeps
//! the unsupported-method path `Err(MethodNotFound)` by default and lets a
//! per-language subclass override only what it supports, at `O(1)`
//! dispatch cost (one virtual call per message).

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Mutex;
use std::collections::HashMap;

use serde_json::Value;

use crate::cancellation::CancellationRegistry;
use crate::error::LspError;
use crate::protocol::{self, Message, ResponseError};
use crate::queue::MessageQueue;

/// The three lifecycle atomics, plus the transitions between them.
#[derive(Default)]
pub struct Lifecycle {
    initialized: AtomicBool,
    shutdown: AtomicBool,
    exit: AtomicBool,
}

impl Lifecycle {
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_exit(&self) -> bool {
        self.exit.load(Ordering::Acquire)
    }

    /// Reserve the `initialized` flag (Uninitialized -> Initializing).
    ///
    /// # Errors
    ///
    /// Returns [`LspError::invalid_request`] if the server was already
    /// initialized.
    fn begin_initialize(&self) -> Result<(), LspError> {
        self.initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| LspError::invalid_request("server has already been initialized"))
    }

    /// Roll back a reservation made by `begin_initialize` when the
    /// `initialize` handler itself fails (Initializing -> Uninitialized).
    fn rollback_initialize(&self) {
        self.initialized.store(false, Ordering::Release);
    }

    /// Reserve the `shutdown` flag (Initialized -> ShuttingDown).
    ///
    /// # Errors
    ///
    /// Returns [`LspError::request_failed`] if already shutting down.
    fn begin_shutdown(&self) -> Result<(), LspError> {
        self.shutdown
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| LspError::request_failed("server is already shutting down"))
    }

    fn set_exit(&self) {
        self.exit.store(true, Ordering::Release);
    }

    /// Guard applied before dispatching any request other than `initialize`.
    fn guard_request(&self, method: &str) -> Result<(), LspError> {
        if self.is_shutdown() {
            return Err(LspError::request_failed(format!(
                "the server is shutting down and cannot service {method}"
            )));
        }
        if !self.is_initialized() {
            return Err(LspError::server_not_initialized());
        }
        Ok(())
    }

    /// `exit` is the only notification delivered while uninitialized;
    /// everything else is silently dropped.
    fn allows_notification(&self, method: &str) -> bool {
        method == "exit" || self.is_initialized()
    }
}

/// Hooks a language-specific server implements. Every method defaults to
/// "not supported"; a subclass overrides only what it handles.
pub trait LanguageServerHandlers: Send + Sync {
    /// Handle the `initialize` handshake and return the result payload
    /// (typically `InitializeResult`, as JSON). Required: every server
    /// must answer this.
    ///
    /// # Errors
    ///
    /// Any handshake-level failure (e.g. unsupported root URI).
    fn initialize(&self, params: Value) -> Result<Value, LspError>;

    /// Handle `shutdown`. Default: succeed with no side effects.
    ///
    /// # Errors
    ///
    /// Implementations may refuse to shut down cleanly.
    fn shutdown(&self) -> Result<Value, LspError> {
        Ok(Value::Null)
    }

    /// Handle any request other than `initialize`/`shutdown`. Default:
    /// `MethodNotFound`.
    ///
    /// # Errors
    ///
    /// Propagates whatever the concrete handler returns; the dispatcher
    /// converts it to a JSON-RPC error response.
    fn handle_request(&self, method: &str, _params: Option<Value>) -> Result<Value, LspError> {
        Err(LspError::method_not_found(method))
    }

    /// Handle any notification other than `initialized`/`exit`/
    /// `$/cancelRequest`. Default: ignore.
    fn handle_notification(&self, _method: &str, _params: Option<Value>) {}

    /// Invoked when a response to a server-initiated request arrives,
    /// after the pending-request table entry has been removed. Default:
    /// ignore.
    fn handle_response(&self, _method: &str, _result: Result<Value, ResponseError>) {}
}

/// Outcome of dispatching one incoming message.
pub enum DispatchOutcome {
    Response(Value),
    NoReply,
}

/// The dispatch engine. Generic over the handler implementation so a
/// per-language server is a concrete `LspLanguageServer<MyHandlers>`.
pub struct LspLanguageServer<H: LanguageServerHandlers> {
    handlers: H,
    lifecycle: Lifecycle,
    pending: Mutex<HashMap<i64, String>>,
    next_request_id: AtomicI64,
    outgoing: std::sync::Arc<MessageQueue<String>>,
    exit_signal: Mutex<Option<Sender<()>>>,
    cancellation: CancellationRegistry,
}

impl<H: LanguageServerHandlers> LspLanguageServer<H> {
    pub fn new(
        handlers: H,
        outgoing: std::sync::Arc<MessageQueue<String>>,
        exit_signal: Sender<()>,
    ) -> Self {
        Self {
            handlers,
            lifecycle: Lifecycle::default(),
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicI64::new(1),
            outgoing,
            exit_signal: Mutex::new(Some(exit_signal)),
            cancellation: CancellationRegistry::new(),
        }
    }

    #[must_use]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    #[must_use]
    pub fn handlers(&self) -> &H {
        &self.handlers
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationRegistry {
        &self.cancellation
    }

    /// Parse, classify, and route one raw message. A default
    /// `Response { id: null }` shape backs any failure prior to or during
    /// parsing.
    pub fn dispatch(&self, raw: &str) -> DispatchOutcome {
        let message = match Message::parse(raw) {
            Ok(m) => m,
            Err(err) => return DispatchOutcome::Response(protocol::error_response(Value::Null, &err)),
        };

        match message {
            Message::Request { id, method, params } => {
                let result = self.dispatch_request(&method, params);
                let body = match result {
                    Ok(value) => protocol::success_response(id, value),
                    Err(err) => protocol::error_response(id, &err),
                };
                DispatchOutcome::Response(body)
            }
            Message::Notification { method, params } => {
                self.dispatch_notification(&method, params);
                DispatchOutcome::NoReply
            }
            Message::Response { id, result, error } => {
                self.dispatch_response(&id, result, error);
                DispatchOutcome::NoReply
            }
        }
    }

    /// Convenience wrapper around [`Self::dispatch`] that enqueues any
    /// resulting response onto the outgoing queue. `send_id` is an opaque
    /// ordinal a caller may use to correlate log lines with the order
    /// messages were received in; the dispatcher does not use it to order
    /// writes (see DESIGN.md for why).
    pub fn handle_message(&self, raw: &str, send_id: u64) {
        match self.dispatch(raw) {
            DispatchOutcome::Response(value) => {
                let body = value.to_string();
                if !self.outgoing.enqueue(body) {
                    tracing::warn!(send_id, "outgoing queue stopped; dropping response");
                }
            }
            DispatchOutcome::NoReply => {}
        }
    }

    fn dispatch_request(&self, method: &str, params: Option<Value>) -> Result<Value, LspError> {
        if method == "initialize" {
            self.lifecycle.begin_initialize()?;
            let result = self.handlers.initialize(params.unwrap_or(Value::Null));
            if result.is_err() {
                self.lifecycle.rollback_initialize();
            }
            return result;
        }

        self.lifecycle.guard_request(method)?;

        if method == "shutdown" {
            self.lifecycle.begin_shutdown()?;
            return self.handlers.shutdown();
        }

        self.handlers.handle_request(method, params)
    }

    fn dispatch_notification(&self, method: &str, params: Option<Value>) {
        if !self.lifecycle.allows_notification(method) {
            tracing::debug!(method, "dropping notification received before initialization");
            return;
        }

        match method {
            "exit" => {
                if !self.lifecycle.is_shutdown() {
                    tracing::warn!("received exit before shutdown");
                }
                self.lifecycle.set_exit();
                if let Some(tx) = self
                    .exit_signal
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .take()
                {
                    let _ = tx.send(());
                }
            }
            "$/cancelRequest" => {
                if let Some(id) = params.as_ref().and_then(|p| p.get("id")) {
                    self.cancellation.cancel(id);
                }
            }
            _ => self.handlers.handle_notification(method, params),
        }
    }

    fn dispatch_response(&self, id: &Value, result: Option<Value>, error: Option<ResponseError>) {
        let Some(method) = self.take_pending(id) else {
            tracing::warn!(?id, "received response for unknown request id; dropping");
            return;
        };
        match error {
            Some(err) => self.handlers.handle_response(&method, Err(err)),
            None => self
                .handlers
                .handle_response(&method, Ok(result.unwrap_or(Value::Null))),
        }
    }

    fn take_pending(&self, id: &Value) -> Option<String> {
        let key = id.as_i64()?;
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&key)
    }

    /// Allocate a fresh request id, record `(id, method)` in the pending
    /// table, and enqueue the outgoing request. Returns `false` if the
    /// outgoing queue has been stopped, in which case no entry is left
    /// behind.
    pub fn send_request(&self, method: &str, params: Value) -> bool {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(id, method.to_string());

        let body = protocol::request_body(id, method, params).to_string();
        if self.outgoing.enqueue(body) {
            true
        } else {
            self.pending
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .remove(&id);
            false
        }
    }

    /// Enqueue a server-initiated notification.
    pub fn send_notification(&self, method: &str, params: Value) -> bool {
        let body = protocol::notification_body(method, params).to_string();
        self.outgoing.enqueue(body)
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}
