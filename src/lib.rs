//! Core dispatch engine, transport, and document model for an LSP host
//! process: a synchronous, thread-pool-based server skeleton that speaks
//! framed JSON-RPC over stdio and exposes the document-lifecycle and
//! lifecycle-state-machine plumbing every per-language server needs.

pub mod base_server;
pub mod cancellation;
pub mod config;
pub mod demo_server;
pub mod document;
pub mod documents;
pub mod error;
pub mod logging;
pub mod options;
pub mod position;
pub mod protocol;
pub mod queue;
pub mod server;
pub mod thread_pool;
pub mod transport;
pub mod uri;
pub mod validator;
