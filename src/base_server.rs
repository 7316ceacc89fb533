//! `BaseLspLanguageServer`: the document-lifecycle handlers every
//! per-language server needs, wired to [`DocumentStore`] and
//! [`ConfigCache`].
//!
//! A concrete per-language server embeds a [`BaseLspLanguageServer`] and
//! delegates to it from its own [`LanguageServerHandlers`] impl, overriding
//! only the feature requests (hover, completion, ...) it actually supports.
//! See [`crate::demo_server`] for the validator-backed example.

use std::convert::TryInto;

use serde_json::{json, Value};

use crate::config::ConfigCache;
use crate::document::{ContentChange, TextDocument};
use crate::documents::DocumentStore;
use crate::error::{LspError, Result};

/// The document-sync capabilities every `BaseLspLanguageServer` advertises
/// in its `initialize` result: open/close notifications, incremental
/// change events, and saves without the full text attached.
#[must_use]
pub fn text_document_sync_capability() -> Value {
    json!({
        "openClose": true,
        "change": 2,
        "save": { "includeText": false }
    })
}

/// Shared document-lifecycle state a concrete server embeds.
#[derive(Default)]
pub struct BaseLspLanguageServer {
    pub documents: DocumentStore,
    pub config: ConfigCache,
}

impl BaseLspLanguageServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `textDocument/didOpen`.
    ///
    /// # Errors
    ///
    /// Returns [`LspError::invalid_params`] if `params` is not a conforming
    /// `DidOpenTextDocumentParams` payload, or the URI is not `file:`.
    pub fn did_open(&self, params: Value) -> Result<()> {
        let params: lsp_types::DidOpenTextDocumentParams = serde_json::from_value(params)
            .map_err(|e| LspError::invalid_params(e.to_string()))?;
        let item = params.text_document;
        let document = TextDocument::new(
            item.uri.to_string(),
            item.language_id,
            item.version,
            item.text,
        )?;
        self.documents.open(document);
        Ok(())
    }

    /// `textDocument/didChange`.
    ///
    /// # Errors
    ///
    /// Returns [`LspError::request_failed`] if the URI is not open, or
    /// propagates [`TextDocument::apply`]'s edit-validation errors.
    pub fn did_change(&self, params: Value) -> Result<()> {
        let params: lsp_types::DidChangeTextDocumentParams = serde_json::from_value(params)
            .map_err(|e| LspError::invalid_params(e.to_string()))?;
        let uri = params.text_document.uri.to_string();
        let document = self
            .documents
            .get(&uri)
            .ok_or_else(|| LspError::request_failed(format!("document not open: {uri}")))?;

        let changes: Vec<ContentChange> = params
            .content_changes
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<_>>()?;
        document.apply(changes, params.text_document.version)
    }

    /// `textDocument/didClose`.
    ///
    /// # Errors
    ///
    /// Returns [`LspError::invalid_params`] if `params` does not conform.
    pub fn did_close(&self, params: Value) -> Result<()> {
        let params: lsp_types::DidCloseTextDocumentParams = serde_json::from_value(params)
            .map_err(|e| LspError::invalid_params(e.to_string()))?;
        self.documents.close(params.text_document.uri.as_str());
        Ok(())
    }

    /// `workspace/didRenameFiles`.
    ///
    /// # Errors
    ///
    /// Returns [`LspError::invalid_params`] if `params` does not conform.
    pub fn did_rename_files(&self, params: Value) -> Result<()> {
        let params: lsp_types::RenameFilesParams = serde_json::from_value(params)
            .map_err(|e| LspError::invalid_params(e.to_string()))?;
        for file in params.files {
            self.documents.rename(&file.old_uri, &file.new_uri);
        }
        Ok(())
    }

    /// `workspace/didChangeConfiguration`: invalidate the whole cache so the
    /// next per-document lookup re-fetches.
    pub fn did_change_configuration(&self, _params: Value) {
        self.config.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn did_open_params(uri: &str, text: &str) -> Value {
        json!({
            "textDocument": {
                "uri": uri,
                "languageId": "plaintext",
                "version": 1,
                "text": text
            }
        })
    }

    #[test]
    fn did_open_then_did_change_updates_text() {
        let base = BaseLspLanguageServer::new();
        base.did_open(did_open_params("file:///a.txt", "hello")).unwrap();

        let change_params = json!({
            "textDocument": { "uri": "file:///a.txt", "version": 2 },
            "contentChanges": [
                { "range": { "start": {"line":0,"character":0}, "end": {"line":0,"character":5} }, "text": "bye" }
            ]
        });
        base.did_change(change_params).unwrap();
        assert_eq!(base.documents.get("file:///a.txt").unwrap().text(), "bye");
    }

    #[test]
    fn did_change_without_open_fails_request_failed() {
        let base = BaseLspLanguageServer::new();
        let change_params = json!({
            "textDocument": { "uri": "file:///missing.txt", "version": 2 },
            "contentChanges": [{ "text": "x" }]
        });
        let err = base.did_change(change_params).unwrap_err();
        assert_eq!(err.code, crate::error::REQUEST_FAILED);
    }

    #[test]
    fn did_close_removes_document() {
        let base = BaseLspLanguageServer::new();
        base.did_open(did_open_params("file:///a.txt", "hello")).unwrap();
        base.did_close(json!({"textDocument": {"uri": "file:///a.txt"}})).unwrap();
        assert!(base.documents.get("file:///a.txt").is_none());
    }

    #[test]
    fn did_rename_files_moves_open_document() {
        let base = BaseLspLanguageServer::new();
        base.did_open(did_open_params("file:///old.txt", "hello")).unwrap();
        base.did_rename_files(json!({
            "files": [{"oldUri": "file:///old.txt", "newUri": "file:///new.txt"}]
        }))
        .unwrap();
        assert!(base.documents.get("file:///old.txt").is_none());
        assert_eq!(base.documents.get("file:///new.txt").unwrap().text(), "hello");
    }

    #[test]
    fn did_change_configuration_clears_cache() {
        let base = BaseLspLanguageServer::new();
        base.config.get_or_fetch("file:///a.txt", || json!(1));
        base.did_change_configuration(Value::Null);
        assert!(base.config.is_empty());
    }
}
