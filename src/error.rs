//! JSON-RPC error codes and the `LspError` type used to signal protocol,
//! parameter, lifecycle, and dispatch errors.
//!
//! Handlers return `Result<Value, LspError>`, and the dispatch loop
//! converts any `Err` into a JSON-RPC `error` payload. Kept dependency
//! free (no `thiserror`), matching an `anyhow`-only error-handling style;
//! a hand-written `Display`/`Error` impl is enough for a type this small.

use serde_json::Value;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const SERVER_NOT_INITIALIZED: i64 = -32002;
pub const REQUEST_FAILED: i64 = -32803;
pub const SERVER_CANCELLED: i64 = -32802;
pub const CONTENT_MODIFIED: i64 = -32801;
pub const REQUEST_CANCELLED: i64 = -32800;

/// A JSON-RPC-visible error: a code from the constants above, a message,
/// and optional structured data.
#[derive(Debug, Clone)]
pub struct LspError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

pub type Result<T> = std::result::Result<T, LspError>;

impl LspError {
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, message)
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }

    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    /// Wrap a non-domain error as `InternalError`, keeping the original
    /// cause in the logged message but presenting a generic user-facing
    /// message on the wire.
    #[must_use]
    pub fn internal(source: &(dyn std::error::Error + 'static)) -> Self {
        tracing::error!(error = %source, "internal error during request handling");
        Self::new(INTERNAL_ERROR, "internal server error")
    }

    #[must_use]
    pub fn server_not_initialized() -> Self {
        Self::new(
            SERVER_NOT_INITIALIZED,
            "the server has not been initialized",
        )
    }

    #[must_use]
    pub fn request_failed(message: impl Into<String>) -> Self {
        Self::new(REQUEST_FAILED, message)
    }
}

impl std::fmt::Display for LspError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for LspError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let err = LspError::method_not_found("foo/bar");
        assert!(err.to_string().contains("-32601"));
        assert!(err.to_string().contains("foo/bar"));
    }
}
