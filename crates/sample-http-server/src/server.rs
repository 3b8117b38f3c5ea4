//! HTTP server implementation.
//!
//! This module provides the hello-world server, built on Hyper and Tokio
//! for async I/O.
//!
//! # Architecture
//!
//! The server consists of:
//!
//! - TCP listener bound to the configured address
//! - One task per accepted connection, tracked in a [`ConnectionRegistry`]
//! - The [`HelloHandler`] answering every request
//! - A [`DrainController`] that runs once shutdown is requested
//!
//! # Example
//!
//! ```rust,ignore
//! use sample_http_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder()
//!         .http_addr("0.0.0.0:8080")
//!         .build();
//!
//!     let report = Server::new(config).run().await?;
//!     println!("{}", report.outcome);
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};

use crate::config::{ServerConfig, ServerConfigBuilder};
use crate::drain::{DrainController, ShutdownReport};
use crate::error::{ServerError, ServerResult};
use crate::handler::HelloHandler;
use crate::registry::{
    ActiveGuard, ConnState, ConnectionId, ConnectionRegistry, ForceClose, TrackedBody,
};
use crate::shutdown::ShutdownSignal;

/// First delay after a transient accept error.
const MIN_ACCEPT_BACKOFF: Duration = Duration::from_millis(5);

/// Longest delay between accept retries.
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// The hello-world HTTP server.
///
/// # Example
///
/// ```rust
/// use sample_http_server::Server;
/// use std::time::Duration;
///
/// let server = Server::builder()
///     .http_addr("127.0.0.1:0")
///     .shutdown_timeout(Duration::from_secs(5))
///     .build();
///
/// assert_eq!(server.config().shutdown_timeout(), Duration::from_secs(5));
/// ```
#[derive(Debug)]
pub struct Server {
    /// Server configuration
    config: ServerConfig,

    /// Live connections
    registry: Arc<ConnectionRegistry>,
}

impl Server {
    /// Creates a new server with the given configuration.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Creates a new server builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidAddress`] if the configured address
    /// does not parse, or [`ServerError::Bind`] if the socket cannot be
    /// bound.
    pub async fn bind(self) -> ServerResult<BoundServer> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|source| ServerError::InvalidAddress {
                addr: self.config.http_addr().to_string(),
                source,
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!(%local_addr, "server listening");

        Ok(BoundServer {
            listener,
            local_addr,
            handler: Arc::new(HelloHandler::new(self.config.default_wait())),
            config: self.config,
            registry: self.registry,
        })
    }

    /// Runs the server until SIGTERM or SIGINT, then drains.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind, signal handlers cannot
    /// be installed, or the accept loop fails.
    pub async fn run(self) -> ServerResult<ShutdownReport> {
        let shutdown = ShutdownSignal::with_os_signals().map_err(ServerError::Signal)?;
        self.run_with_shutdown(shutdown).await
    }

    /// Runs the server with a custom shutdown signal.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind or the accept loop fails.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> ServerResult<ShutdownReport> {
        self.bind().await?.serve(shutdown).await
    }
}

/// A server whose listener is bound and ready to accept.
#[derive(Debug)]
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    handler: Arc<HelloHandler>,
}

impl BoundServer {
    /// Returns the address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the connection registry.
    #[must_use]
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accepts connections until `shutdown` fires, then drains them.
    ///
    /// The listener is dropped as soon as shutdown is observed, so later
    /// connection attempts are refused while in-flight requests finish.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Accept`] if accepting fails with an error
    /// that is not worth retrying. Hitting the grace deadline is not an
    /// error; it is reported as [`DrainOutcome::Forced`](crate::DrainOutcome::Forced).
    pub async fn serve(self, shutdown: ShutdownSignal) -> ServerResult<ShutdownReport> {
        let Self {
            listener,
            local_addr,
            config,
            registry,
            handler,
        } = self;

        let ctx = ConnectionContext {
            registry: Arc::clone(&registry),
            handler,
            shutdown: shutdown.clone(),
            keep_alive: config.keep_alive(),
        };

        let stop = shutdown.recv();
        tokio::pin!(stop);
        let mut backoff = AcceptBackoff::default();

        loop {
            tokio::select! {
                biased;

                () = &mut stop => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        backoff.reset();
                        accept_connection(&ctx, stream, peer);
                    }
                    Err(e) if is_transient(&e) => {
                        let delay = backoff.next_delay();
                        tracing::warn!(error = %e, retry_ms = delay.as_millis() as u64, "accept failed, retrying");
                        tokio::select! {
                            biased;
                            () = &mut stop => break,
                            () = tokio::time::sleep(delay) => {}
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                        return Err(ServerError::Accept(e));
                    }
                },
            }
        }

        let started = Instant::now();
        drop(listener);
        tracing::info!(%local_addr, "shutdown requested, listener closed");

        let report = DrainController::new(
            registry,
            config.drain_poll_interval(),
            config.shutdown_timeout(),
        )
        .run(started)
        .await;

        tracing::info!(outcome = %report.outcome, "server stopped");
        Ok(report)
    }
}

/// Shared state handed to every connection task.
#[derive(Debug, Clone)]
struct ConnectionContext {
    registry: Arc<ConnectionRegistry>,
    handler: Arc<HelloHandler>,
    shutdown: ShutdownSignal,
    keep_alive: bool,
}

/// Registers an accepted connection and spawns the task that serves it.
///
/// The record exists before this returns, so a drain that starts right
/// after the accept already sees the connection as `New`.
fn accept_connection(
    ctx: &ConnectionContext,
    stream: TcpStream,
    peer: SocketAddr,
) -> ConnectionId {
    let (id, force_close) = ctx.registry.register(peer);
    tokio::spawn(serve_connection(stream, peer, id, force_close, ctx.clone()));
    id
}

/// Serves one connection and keeps its registry record in step.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
    force_close: ForceClose,
    ctx: ConnectionContext,
) {
    let service = {
        let registry = Arc::clone(&ctx.registry);
        let handler = Arc::clone(&ctx.handler);
        service_fn(move |req: Request<Incoming>| {
            let guard = ActiveGuard::enter(Arc::clone(&registry), id);
            let handler = Arc::clone(&handler);
            async move {
                let response = handler.handle(req).await;
                Ok::<_, Infallible>(response.map(|body| TrackedBody::new(body, guard)))
            }
        })
    };

    let mut builder = http1::Builder::new();
    builder.timer(TokioTimer::new()).keep_alive(ctx.keep_alive);
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let draining = ctx.shutdown.recv();
    tokio::pin!(draining);
    let mut drain_seen = false;

    loop {
        tokio::select! {
            biased;

            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(%id, %peer, error = %e, "connection error");
                }
                break;
            }

            () = force_close.requested() => {
                tracing::debug!(%id, %peer, "connection force-closed");
                break;
            }

            () = &mut draining, if !drain_seen => {
                drain_seen = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }

    ctx.registry.transition(id, ConnState::Closed);
}

/// Returns `true` for accept errors that go away on their own.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) || is_fd_exhaustion(e)
}

/// `ENFILE` or `EMFILE`.
#[cfg(unix)]
fn is_fd_exhaustion(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(23 | 24))
}

#[cfg(not(unix))]
fn is_fd_exhaustion(_e: &io::Error) -> bool {
    false
}

/// Exponential backoff between accept retries.
#[derive(Debug, Default)]
struct AcceptBackoff {
    current: Option<Duration>,
}

impl AcceptBackoff {
    fn next_delay(&mut self) -> Duration {
        let delay = self
            .current
            .map_or(MIN_ACCEPT_BACKOFF, |d| (d * 2).min(MAX_ACCEPT_BACKOFF));
        self.current = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

/// Builder for [`Server`].
///
/// # Example
///
/// ```rust
/// use sample_http_server::ServerBuilder;
/// use std::time::Duration;
///
/// let server = ServerBuilder::new()
///     .port(9090)
///     .default_wait(Duration::from_millis(250))
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config_builder: ServerConfigBuilder,
}

impl ServerBuilder {
    /// Creates a new server builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.http_addr(addr);
        self
    }

    /// Binds all interfaces on `port`.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config_builder = self.config_builder.port(port);
        self
    }

    /// Sets the pause used when a request has no valid `wait`.
    #[must_use]
    pub fn default_wait(mut self, wait: Duration) -> Self {
        self.config_builder = self.config_builder.default_wait(wait);
        self
    }

    /// Sets the graceful shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.shutdown_timeout(timeout);
        self
    }

    /// Sets how often draining checks for quiescence.
    #[must_use]
    pub fn drain_poll_interval(mut self, interval: Duration) -> Self {
        self.config_builder = self.config_builder.drain_poll_interval(interval);
        self
    }

    /// Enables or disables HTTP keep-alive.
    #[must_use]
    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.config_builder = self.config_builder.keep_alive(enabled);
        self
    }

    /// Builds the server with the configured settings.
    #[must_use]
    pub fn build(self) -> Server {
        Server::new(self.config_builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_passes_config_through() {
        let server = Server::builder()
            .http_addr("127.0.0.1:0")
            .default_wait(Duration::from_millis(7))
            .shutdown_timeout(Duration::from_secs(3))
            .drain_poll_interval(Duration::from_millis(20))
            .keep_alive(false)
            .build();

        let config = server.config();
        assert_eq!(config.http_addr(), "127.0.0.1:0");
        assert_eq!(config.default_wait(), Duration::from_millis(7));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(3));
        assert_eq!(config.drain_poll_interval(), Duration::from_millis(20));
        assert!(!config.keep_alive());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = AcceptBackoff::default();
        assert_eq!(backoff.next_delay(), Duration::from_millis(5));
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        for _ in 0..10 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), MAX_ACCEPT_BACKOFF);

        backoff.reset();
        assert_eq!(backoff.next_delay(), MIN_ACCEPT_BACKOFF);
    }

    #[test]
    fn test_transient_errors() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::InvalidInput)));
    }

    #[cfg(unix)]
    #[test]
    fn test_fd_exhaustion_is_transient() {
        assert!(is_transient(&io::Error::from_raw_os_error(24)));
        assert!(is_transient(&io::Error::from_raw_os_error(23)));
    }

    #[tokio::test]
    async fn test_bind_invalid_address() {
        let err = Server::builder()
            .http_addr("not an address")
            .build()
            .bind()
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::InvalidAddress { .. }));
        assert!(err.is_startup());
    }

    #[tokio::test]
    async fn test_bind_port_in_use() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = holder.local_addr().unwrap();

        let err = Server::builder()
            .http_addr(addr.to_string())
            .build()
            .bind()
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::Bind { .. }));
        assert!(err.to_string().contains("failed to bind"));
    }

    #[tokio::test]
    async fn test_serve_stops_on_trigger() {
        let bound = Server::builder()
            .http_addr("127.0.0.1:0")
            .build()
            .bind()
            .await
            .unwrap();
        assert_ne!(bound.local_addr().port(), 0);

        let shutdown = ShutdownSignal::new();
        let handle = tokio::spawn(bound.serve(shutdown.clone()));
        shutdown.trigger();

        let report = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("serve should return")
            .unwrap()
            .unwrap();
        assert!(!report.outcome.is_forced());
    }

    #[tokio::test]
    async fn test_accepted_connection_is_registered_before_its_task_runs() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();

        let registry = Arc::new(ConnectionRegistry::new());
        let ctx = ConnectionContext {
            registry: Arc::clone(&registry),
            handler: Arc::new(HelloHandler::new(Duration::ZERO)),
            shutdown: ShutdownSignal::new(),
            keep_alive: true,
        };

        // Current-thread runtime: the spawned task has not been polled yet.
        let id = accept_connection(&ctx, stream, peer);
        assert_eq!(registry.state(id), Some(ConnState::New));
        assert!(!registry.is_quiescent());
    }
}
