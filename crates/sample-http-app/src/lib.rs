//! Sample HTTP App - hello world fixture server
//!
//! A tiny HTTP app used to check that a platform stops applications
//! gracefully. It answers every request with `"hello "`, a pause, then
//! `"world!\n"`, and on SIGTERM drains in-flight requests before exiting.
//!
//! # Example Usage
//!
//! ```bash
//! $ PORT=8080 WAIT_TIME=2s sample-http-app
//! Serving on port: 8080
//!
//! $ curl 'localhost:8080/?wait=100ms'
//! hello world!
//! ```

#![doc(html_root_url = "https://docs.rs/sample-http-app/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod error;

use std::io::Write;

use sample_http_server::{Server, ServerConfig, ServerError, ShutdownReport, ShutdownSignal};

pub use error::{AppError, AppResult};

/// App version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The line printed to stdout once the listener is bound.
#[must_use]
pub fn readiness_line(port: u16) -> String {
    format!("Serving on port: {port}")
}

/// Binds the server, announces readiness, and serves until SIGTERM or
/// SIGINT has been handled.
///
/// Signal handlers are installed before binding, so a signal sent as soon
/// as the readiness line appears starts a drain instead of killing the
/// process.
pub async fn run(config: ServerConfig) -> AppResult<ShutdownReport> {
    let shutdown = ShutdownSignal::with_os_signals().map_err(ServerError::Signal)?;
    run_with_shutdown(config, shutdown, &mut std::io::stdout()).await
}

/// Like [`run`], with a caller-supplied shutdown signal and readiness sink.
pub async fn run_with_shutdown<W: Write>(
    config: ServerConfig,
    shutdown: ShutdownSignal,
    out: &mut W,
) -> AppResult<ShutdownReport> {
    let bound = Server::new(config).bind().await?;
    announce(out, bound.local_addr().port());
    Ok(bound.serve(shutdown).await?)
}

fn announce<W: Write>(out: &mut W, port: u16) {
    let line = readiness_line(port);
    if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
        tracing::warn!(error = %e, "failed to write readiness line");
    }
}
