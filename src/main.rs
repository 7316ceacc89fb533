//! lsp-host: a synchronous, thread-pool-based LSP server process.
//!
//! ```text
//! stdin -(framed JSON-RPC)-> reader thread -\
//!                                            >- main thread -> request ThreadPool -> LspLanguageServer
//!                              exit signal -/                                              |
//!                                                                                           v
//! stdout <-(framed JSON-RPC)- writer thread <-------------------- outgoing MessageQueue <--+
//! ```
//!
//! `textDocument/didOpen`/`didChange` additionally schedule validation tasks
//! on a second, independent worker pool (see [`lsp_host_core::demo_server`]).

use std::io;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use lsp_host_core::demo_server::ValidatingLanguageServer;
use lsp_host_core::logging;
use lsp_host_core::options::{Options, OptionsError};
use lsp_host_core::queue::MessageQueue;
use lsp_host_core::server::LspLanguageServer;
use lsp_host_core::thread_pool::ThreadPool;
use lsp_host_core::transport::{frame_message, MessageStream};
use lsp_host_core::validator::NullValidator;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match Options::parse_args(args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("lsp-host: {err}");
            std::process::exit(exit_code_for_options_error(&err));
        }
    };

    if let Err(err) = logging::init(&options) {
        eprintln!("lsp-host: failed to initialize logging: {err:?}");
    }

    match run(options) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            tracing::error!(error = ?err, "server exited with an error");
            std::process::exit(3);
        }
    }
}

fn exit_code_for_options_error(err: &OptionsError) -> i32 {
    match err {
        OptionsError::InvalidValue { .. } | OptionsError::MissingValue { .. } => 1,
        OptionsError::Unknown { .. } => 2,
    }
}

/// Startup/teardown sequence: build the queues and pools, spawn the stdout
/// writer and stdin reader, dispatch on the request pool until `exit`
/// fires, then stop and join everything in order.
fn run(options: Options) -> Result<()> {
    tracing::info!(
        request_threads = options.num_request_threads,
        worker_threads = options.num_worker_threads,
        "starting lsp-host"
    );

    let outgoing: Arc<MessageQueue<String>> = Arc::new(MessageQueue::new(options.queue_capacity));
    let (exit_tx, exit_rx) = mpsc::channel::<()>();

    let handlers = ValidatingLanguageServer::new(
        NullValidator,
        Arc::new(ThreadPool::new("worker", options.num_worker_threads)),
        Arc::clone(&outgoing),
    );
    let server = Arc::new(LspLanguageServer::new(handlers, Arc::clone(&outgoing), exit_tx));

    let mut request_pool = ThreadPool::new("request", options.num_request_threads);

    let writer_outgoing = Arc::clone(&outgoing);
    let writer = std::thread::Builder::new()
        .name("stdout-writer".into())
        .spawn(move || write_outgoing_loop(&writer_outgoing))
        .context("failed to spawn stdout writer thread")?;

    let (incoming_tx, incoming_rx) = mpsc::channel::<String>();
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || read_incoming_loop(incoming_tx))
        .context("failed to spawn stdin reader thread")?;

    let mut next_send_id = 0u64;
    loop {
        if exit_rx.try_recv().is_ok() {
            break;
        }
        match incoming_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(body) => {
                let server = Arc::clone(&server);
                let send_id = next_send_id;
                next_send_id += 1;
                if !request_pool.execute(move |_name, _id| server.handle_message(&body, send_id)) {
                    tracing::warn!("request pool stopped; dropping incoming message");
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::info!("stdin reader exited; stopping");
                break;
            }
        }
    }

    tracing::info!("tearing down");
    request_pool.stop();
    request_pool.join();
    outgoing.stop();
    let _ = writer.join();

    Ok(())
}

/// Read framed messages from stdin, forwarding each raw body to the main
/// thread. The same read-frame-forward loop shape as the stdout writer
/// below, just applied to a child's stdin side rather than its stdout.
fn read_incoming_loop(incoming: mpsc::Sender<String>) {
    let mut stream = MessageStream::new(io::stdin());
    loop {
        match stream.next() {
            Ok(Some(body)) => {
                if incoming.send(body).is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::info!("stdin closed; stopping reader");
                break;
            }
            Err(err) => {
                tracing::error!(error = ?err, "transport error; stopping reader");
                break;
            }
        }
    }
}

fn write_outgoing_loop(outgoing: &MessageQueue<String>) {
    use std::io::Write;
    let mut stdout = io::stdout().lock();
    loop {
        match outgoing.dequeue() {
            Ok(body) => {
                let framed = frame_message(&body);
                if stdout.write_all(&framed).is_err() || stdout.flush().is_err() {
                    tracing::error!("failed writing to stdout; stopping writer");
                    break;
                }
            }
            Err(_) => break,
        }
    }
}
