//! Subscriber bootstrap: writer forced to stderr since stdout is the
//! transport, level filtering via `RUST_LOG` with a `warn` default,
//! optional file layer for `--log-file`.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::options::Options;

/// Install the process-wide tracing subscriber from parsed [`Options`].
///
/// # Errors
///
/// Returns an error if `--log-file` names a path that cannot be opened for
/// appending.
pub fn init(options: &Options) -> Result<()> {
    let filter = build_filter(options.log_level.as_deref());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let subscriber = Registry::default().with(filter).with(stderr_layer);

    match &options.log_file {
        Some(path) => {
            let file = open_log_file(Path::new(path))
                .with_context(|| format!("failed to open log file {path}"))?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(move || file.try_clone().expect("failed to clone log file handle"));
            subscriber.with(file_layer).try_init()
        }
        None => subscriber.try_init(),
    }
    .context("a tracing subscriber is already installed")
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn build_filter(level: Option<&str>) -> EnvFilter {
    if let Ok(from_env) = std::env::var("RUST_LOG") {
        return EnvFilter::new(from_env);
    }
    EnvFilter::new(level.unwrap_or("warn"))
}
