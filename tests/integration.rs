//! Black-box end-to-end tests: spawn the compiled `lsp-host` binary and
//! drive it over framed stdio, exercising lifecycle, document sync, and
//! error-taxonomy scenarios end to end.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

struct TestClient {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<std::process::ChildStdout>,
    buffered: Vec<Value>,
    next_id: u64,
}

impl TestClient {
    fn spawn() -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_lsp-host"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn lsp-host");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            buffered: Vec::new(),
            next_id: 1,
        }
    }

    fn send(&mut self, message: &Value) {
        let body = message.to_string();
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        self.stdin.write_all(header.as_bytes()).unwrap();
        self.stdin.write_all(body.as_bytes()).unwrap();
        self.stdin.flush().unwrap();
    }

    fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}));
        self.recv_until_id(id)
    }

    fn notify(&mut self, method: &str, params: Value) {
        self.send(&json!({"jsonrpc": "2.0", "method": method, "params": params}));
    }

    fn recv_one(&mut self, timeout: Duration) -> Value {
        let deadline = Instant::now() + timeout;
        let mut headers = HashMap::new();
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.reader.read_line(&mut line).expect("read header line");
            assert!(n > 0, "server closed stdout unexpectedly");
            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            if let Some((key, value)) = trimmed.split_once(':') {
                headers.insert(key.trim().to_lowercase(), value.trim().to_string());
            }
            assert!(Instant::now() < deadline, "timed out reading response headers");
        }
        let length: usize = headers
            .get("content-length")
            .and_then(|v| v.parse().ok())
            .expect("missing Content-Length");
        let mut body = vec![0u8; length];
        self.reader.read_exact(&mut body).expect("read response body");
        serde_json::from_slice(&body).expect("response body is valid JSON")
    }

    fn recv_until_id(&mut self, id: u64) -> Value {
        if let Some(pos) = self.buffered.iter().position(|m| m["id"] == json!(id)) {
            return self.buffered.remove(pos);
        }
        loop {
            let message = self.recv_one(Duration::from_secs(10));
            if message.get("id") == Some(&json!(id)) {
                return message;
            }
            self.buffered.push(message);
        }
    }

    fn recv_notification(&mut self, method: &str) -> Value {
        if let Some(pos) = self
            .buffered
            .iter()
            .position(|m| m.get("method") == Some(&json!(method)))
        {
            return self.buffered.remove(pos);
        }
        loop {
            let message = self.recv_one(Duration::from_secs(10));
            if message.get("method") == Some(&json!(method)) {
                return message;
            }
            self.buffered.push(message);
        }
    }

    fn initialize(&mut self) -> Value {
        let response = self.request("initialize", json!({"capabilities": {}}));
        self.notify("initialized", json!({}));
        response
    }
}

impl Drop for TestClient {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn initialize_advertises_incremental_text_document_sync() {
    let mut client = TestClient::spawn();
    let response = client.initialize();
    assert!(response.get("error").is_none(), "{response:?}");
    assert_eq!(
        response["result"]["capabilities"]["textDocumentSync"]["change"],
        json!(2)
    );
}

#[test]
fn open_then_incremental_change_is_accepted() {
    let mut client = TestClient::spawn();
    client.initialize();

    client.notify(
        "textDocument/didOpen",
        json!({
            "textDocument": {
                "uri": "file:///tmp/a.txt",
                "languageId": "plaintext",
                "version": 1,
                "text": "hello world"
            }
        }),
    );

    client.notify(
        "textDocument/didChange",
        json!({
            "textDocument": {"uri": "file:///tmp/a.txt", "version": 2},
            "contentChanges": [
                {"range": {"start": {"line":0,"character":0}, "end": {"line":0,"character":5}}, "text": "howdy"}
            ]
        }),
    );

    let diagnostics = client.recv_notification("textDocument/publishDiagnostics");
    assert_eq!(diagnostics["params"]["uri"], json!("file:///tmp/a.txt"));
}

#[test]
fn request_before_initialize_is_server_not_initialized() {
    let mut client = TestClient::spawn();
    let response = client.request("textDocument/hover", json!({}));
    assert_eq!(response["error"]["code"], json!(-32002));
}

#[test]
fn request_after_shutdown_is_request_failed() {
    let mut client = TestClient::spawn();
    client.initialize();
    let shutdown = client.request("shutdown", Value::Null);
    assert!(shutdown.get("error").is_none());

    let response = client.request("textDocument/completion", json!({}));
    assert_eq!(response["error"]["code"], json!(-32803));
}

#[test]
fn unknown_method_is_method_not_found() {
    let mut client = TestClient::spawn();
    client.initialize();
    let response = client.request("workspace/bogus", json!({}));
    assert_eq!(response["error"]["code"], json!(-32601));
}

#[test]
fn shutdown_then_exit_terminates_the_process() {
    let mut client = TestClient::spawn();
    client.initialize();
    client.request("shutdown", Value::Null);
    client.notify("exit", Value::Null);

    let status = client
        .child
        .wait_timeout_or_kill(Duration::from_secs(5))
        .expect("server did not exit after exit notification");
    assert!(status.success());
}

trait WaitTimeoutOrKill {
    fn wait_timeout_or_kill(&mut self, timeout: Duration) -> Option<std::process::ExitStatus>;
}

impl WaitTimeoutOrKill for Child {
    fn wait_timeout_or_kill(&mut self, timeout: Duration) -> Option<std::process::ExitStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(Some(status)) = self.try_wait() {
                return Some(status);
            }
            if Instant::now() >= deadline {
                let _ = self.kill();
                return None;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}
