//! Logging setup for the sample HTTP server.
//!
//! Installs a `tracing` subscriber that writes JSON (or pretty) lines to
//! stderr, filtered by `RUST_LOG` or `LOG_LEVEL`.
//!
//! # Example
//!
//! ```rust,ignore
//! use sample_http_telemetry::{init_logging, LogConfig};
//!
//! fn main() {
//!     let config = LogConfig::from_env().expect("invalid logging config");
//!     init_logging(&config).expect("failed to init logging");
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
