//! # Sample HTTP Server
//!
//! A hello-world HTTP server used as a fixture for testing how platforms
//! stop applications.
//!
//! Every request gets `"hello "`, a configurable pause, then `"world!\n"`.
//! On SIGTERM or SIGINT the server stops accepting, lets in-flight
//! requests finish within a grace period, and reports how draining went:
//!
//! - Connection tracking through a [`ConnectionRegistry`]
//! - Draining via [`DrainController`]
//! - Duration parsing (`1h30m`, `1.5s`, `10us`) for the `wait` parameter
//!
//! ## Example
//!
//! ```rust,ignore
//! use sample_http_server::{Server, ServerConfig, ShutdownSignal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bound = Server::new(ServerConfig::from_env()?).bind().await?;
//!     println!("Serving on port: {}", bound.local_addr().port());
//!
//!     let report = bound.serve(ShutdownSignal::with_os_signals()?).await?;
//!     eprintln!("{}", report.outcome);
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/sample-http-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod drain;
pub mod duration;
mod error;
pub mod handler;
pub mod registry;
mod server;
mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use drain::{DrainController, DrainOutcome, ShutdownReport};
pub use duration::{parse_duration, DurationError};
pub use error::{ConfigError, ServerError, ServerResult};
pub use handler::{HelloBody, HelloHandler};
pub use registry::{
    ActiveGuard, ConnState, ConnectionId, ConnectionRegistry, ForceClose, RegistrySnapshot,
    TrackedBody,
};
pub use server::{BoundServer, Server, ServerBuilder};
pub use shutdown::{ShutdownReceiver, ShutdownSignal};
