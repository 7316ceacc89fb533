//! JSON-RPC 2.0 message shapes and parsing.

use serde_json::{json, Value};

use crate::error::{self, LspError};

pub const JSONRPC_VERSION: &str = "2.0";

/// Methods the core always dispatches as requests (require an `id`).
const KNOWN_REQUEST_METHODS: &[&str] = &["initialize", "shutdown"];

/// Methods the core always dispatches as notifications (ignore any `id`).
const KNOWN_NOTIFICATION_METHODS: &[&str] = &[
    "initialized",
    "exit",
    "$/cancelRequest",
    "textDocument/didOpen",
    "textDocument/didChange",
    "textDocument/didClose",
    "workspace/didRenameFiles",
    "workspace/didChangeConfiguration",
];

/// A JSON-RPC error payload: `{code, message, data?}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<LspError> for ResponseError {
    fn from(err: LspError) -> Self {
        Self {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

/// A parsed incoming or outgoing message, classified by which of
/// `method`/`result`/`error` is present.
#[derive(Debug, Clone)]
pub enum Message {
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Response {
        id: Value,
        result: Option<Value>,
        error: Option<ResponseError>,
    },
}

impl Message {
    /// Parse a raw message body, classifying it as follows: `method`
    /// present → request/notification; else `result` → response; else
    /// `error` → error response; else `InvalidRequest`.
    ///
    /// A `method` present in [`KNOWN_REQUEST_METHODS`] or
    /// [`KNOWN_NOTIFICATION_METHODS`] is classified by that closed-set
    /// membership rather than by `id` presence: a known request method
    /// without an `id` is `InvalidParams` rather than a silently dropped
    /// notification, and a known notification method keeps its
    /// classification even if a client mistakenly attaches an `id`. A
    /// `method` not in either set falls back to the `id`-presence
    /// heuristic.
    ///
    /// # Errors
    ///
    /// Returns [`LspError::parse_error`] if `raw` is not valid JSON, or
    /// [`LspError::invalid_params`]/[`LspError::invalid_request`] if it is
    /// valid JSON but not a conforming JSON-RPC object (including a
    /// top-level array, which would be a batched request — out of scope
    /// here), or if a known request method arrives without an `id`.
    pub fn parse(raw: &str) -> Result<Self, LspError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| LspError::parse_error(e.to_string()))?;

        let Value::Object(obj) = value else {
            return Err(LspError::invalid_params(
                "batched or non-object JSON-RPC messages are not supported",
            ));
        };

        if let Some(method) = obj.get("method") {
            let method = method
                .as_str()
                .ok_or_else(|| LspError::invalid_request("method must be a string"))?
                .to_string();
            let params = obj.get("params").cloned();
            let id = obj.get("id").cloned();

            if KNOWN_REQUEST_METHODS.contains(&method.as_str()) {
                let id = id.ok_or_else(|| {
                    LspError::invalid_params(format!("{method} requires an id"))
                })?;
                return Ok(Self::Request { id, method, params });
            }
            if KNOWN_NOTIFICATION_METHODS.contains(&method.as_str()) {
                return Ok(Self::Notification { method, params });
            }
            return Ok(match id {
                Some(id) => Self::Request { id, method, params },
                None => Self::Notification { method, params },
            });
        }

        if let Some(result) = obj.get("result") {
            let id = obj
                .get("id")
                .cloned()
                .ok_or_else(|| LspError::invalid_request("response missing id"))?;
            return Ok(Self::Response {
                id,
                result: Some(result.clone()),
                error: None,
            });
        }

        if let Some(error) = obj.get("error") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            let response_error: ResponseError = serde_json::from_value(error.clone())
                .map_err(|e| LspError::invalid_request(format!("malformed error object: {e}")))?;
            return Ok(Self::Response {
                id,
                result: None,
                error: Some(response_error),
            });
        }

        Err(LspError::invalid_request("missing method"))
    }
}

/// Build a success response body.
#[must_use]
pub fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

/// Build an error response body. The default `id` is `null` so any
/// failure prior to parsing still yields a well-formed response.
#[must_use]
pub fn error_response(id: Value, err: &LspError) -> Value {
    let error: ResponseError = err.clone().into();
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": error,
    })
}

/// Build an outgoing request body.
#[must_use]
pub fn request_body(id: i64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Build an outgoing notification body.
#[must_use]
pub fn notification_body(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": method,
        "params": params,
    })
}

/// `true` if `code` is one of the codes the core itself emits.
#[must_use]
pub fn is_known_error_code(code: i64) -> bool {
    matches!(
        code,
        error::PARSE_ERROR
            | error::INVALID_REQUEST
            | error::METHOD_NOT_FOUND
            | error::INVALID_PARAMS
            | error::INTERNAL_ERROR
            | error::SERVER_NOT_INITIALIZED
            | error::REQUEST_FAILED
            | error::SERVER_CANCELLED
            | error::CONTENT_MODIFIED
            | error::REQUEST_CANCELLED
    )
}
