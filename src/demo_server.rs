//! A per-language server demonstrating validator wiring: on `didOpen`/
//! `textDocument/didChange` it schedules a validation task on the worker pool and
//! publishes the resulting diagnostics. No specific language analyzer is
//! implemented here, only the wiring a real one would plug into via
//! [`Validator`].

use std::sync::Arc;

use serde_json::{json, Value};

use crate::base_server::{text_document_sync_capability, BaseLspLanguageServer};
use crate::error::{LspError, Result};
use crate::protocol;
use crate::queue::MessageQueue;
use crate::server::LanguageServerHandlers;
use crate::thread_pool::ThreadPool;
use crate::validator::Validator;

/// A `LanguageServerHandlers` implementation that validates documents on
/// open/change using a pluggable [`Validator`], publishing diagnostics via
/// `textDocument/publishDiagnostics` notifications.
pub struct ValidatingLanguageServer<V: Validator + 'static> {
    base: BaseLspLanguageServer,
    validator: Arc<V>,
    workers: Arc<ThreadPool>,
    outgoing: Arc<MessageQueue<String>>,
}

impl<V: Validator + 'static> ValidatingLanguageServer<V> {
    pub fn new(validator: V, workers: Arc<ThreadPool>, outgoing: Arc<MessageQueue<String>>) -> Self {
        Self {
            base: BaseLspLanguageServer::new(),
            validator: Arc::new(validator),
            workers,
            outgoing,
        }
    }

    #[must_use]
    pub fn base(&self) -> &BaseLspLanguageServer {
        &self.base
    }

    /// Schedule a validation pass for `uri` on the worker pool. A panic
    /// inside the validator is caught by the pool and logged; no
    /// diagnostics are published in that case.
    fn schedule_validation(&self, uri: &str) {
        let Some(document) = self.base.documents.get(uri) else {
            return;
        };
        let validator = Arc::clone(&self.validator);
        let outgoing = Arc::clone(&self.outgoing);
        let uri = uri.to_string();
        self.workers.execute(move |_thread_name, _thread_id| {
            let path = document.path().map_or_else(
                || std::path::PathBuf::from(&uri),
                std::path::Path::to_path_buf,
            );
            let options = json!({});
            let diagnostics: Vec<Value> = validator
                .validate(&path, &document.text(), &options)
                .into_iter()
                .map(|d| serde_json::to_value(d.to_lsp()).unwrap_or(Value::Null))
                .collect();

            let params = json!({
                "uri": uri,
                "version": document.version(),
                "diagnostics": diagnostics,
            });
            let body = protocol::notification_body("textDocument/publishDiagnostics", params);
            let _ = outgoing.enqueue(body.to_string());
        });
    }
}

impl<V: Validator + 'static> LanguageServerHandlers for ValidatingLanguageServer<V> {
    fn initialize(&self, _params: Value) -> Result<Value> {
        Ok(json!({
            "capabilities": {
                "textDocumentSync": text_document_sync_capability(),
            }
        }))
    }

    fn handle_request(&self, method: &str, _params: Option<Value>) -> Result<Value> {
        Err(LspError::method_not_found(method))
    }

    fn handle_notification(&self, method: &str, params: Option<Value>) {
        let params = params.unwrap_or(Value::Null);
        let result = match method {
            "textDocument/didOpen" => self.base.did_open(params.clone()).map(|()| {
                if let Some(uri) = params["textDocument"]["uri"].as_str() {
                    self.schedule_validation(uri);
                }
            }),
            "textDocument/didChange" => self.base.did_change(params.clone()).map(|()| {
                if let Some(uri) = params["textDocument"]["uri"].as_str() {
                    self.schedule_validation(uri);
                }
            }),
            "textDocument/didClose" => self.base.did_close(params),
            "workspace/didRenameFiles" => self.base.did_rename_files(params),
            "workspace/didChangeConfiguration" => {
                self.base.did_change_configuration(params);
                Ok(())
            }
            _ => return,
        };
        if let Err(err) = result {
            tracing::warn!(method, %err, "notification handler failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::{Diagnostic, Severity};
    use std::path::Path;
    use std::time::Duration;

    struct AlwaysFlagsFirstLine;

    impl Validator for AlwaysFlagsFirstLine {
        fn validate(&self, _path: &Path, _text: &str, _options: &Value) -> Vec<Diagnostic> {
            vec![Diagnostic {
                first_line: 1,
                first_column: 1,
                last_line: 1,
                last_column: 2,
                severity: Severity::Warning,
                message: "flagged".into(),
            }]
        }
    }

    #[test]
    fn did_open_schedules_validation_and_publishes_diagnostics() {
        let outgoing = Arc::new(MessageQueue::new(8));
        let workers = Arc::new(ThreadPool::new("validate", 1));
        let server = ValidatingLanguageServer::new(AlwaysFlagsFirstLine, workers, Arc::clone(&outgoing));

        server.handle_notification(
            "textDocument/didOpen",
            Some(json!({
                "textDocument": {
                    "uri": "file:///a.txt",
                    "languageId": "plaintext",
                    "version": 1,
                    "text": "bad code"
                }
            })),
        );

        let raw = outgoing
            .dequeue()
            .expect("a publishDiagnostics notification");
        let body: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(body["method"], json!("textDocument/publishDiagnostics"));
        assert_eq!(body["params"]["diagnostics"][0]["message"], json!("flagged"));
    }

    #[test]
    fn did_open_on_unparseable_params_does_not_panic() {
        let outgoing = Arc::new(MessageQueue::new(8));
        let workers = Arc::new(ThreadPool::new("validate", 1));
        let server = ValidatingLanguageServer::new(AlwaysFlagsFirstLine, workers, outgoing);
        server.handle_notification("textDocument/didOpen", Some(json!({"bad": true})));
    }

    #[test]
    fn initialize_advertises_incremental_sync() {
        let outgoing = Arc::new(MessageQueue::new(8));
        let workers = Arc::new(ThreadPool::new("validate", 1));
        let server = ValidatingLanguageServer::new(AlwaysFlagsFirstLine, workers, outgoing);
        let result = server.initialize(Value::Null).unwrap();
        assert_eq!(result["capabilities"]["textDocumentSync"]["change"], json!(2));
        std::thread::sleep(Duration::from_millis(1));
    }
}
