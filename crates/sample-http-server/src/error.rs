//! Error types for the sample HTTP server.

use std::io;
use std::net::{AddrParseError, SocketAddr};

use thiserror::Error;

use crate::duration::DurationError;

/// Errors that end the server before or during the accept loop.
///
/// Each of these is fatal for the process; graceful shutdown, including
/// a forced one, is reported through [`ShutdownReport`](crate::ShutdownReport)
/// instead.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured address could not be parsed.
    #[error("invalid address '{addr}': {source}")]
    InvalidAddress {
        /// The address as configured.
        addr: String,
        /// Parse failure.
        #[source]
        source: AddrParseError,
    },

    /// The listening socket could not be bound.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// The address we tried to bind.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The accept loop hit a non-transient error after binding.
    #[error("accept loop failed: {0}")]
    Accept(#[source] io::Error),

    /// OS signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] io::Error),
}

impl ServerError {
    /// Returns `true` if the error happened before the listener was ready.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress { .. } | Self::Bind { .. } | Self::Signal(_)
        )
    }
}

/// Errors raised while loading [`ServerConfig`](crate::ServerConfig) from
/// the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `PORT` is not a valid TCP port.
    #[error("invalid port {value:?}: expected an integer between 0 and 65535")]
    InvalidPort {
        /// The raw value.
        value: String,
    },

    /// A duration variable could not be parsed.
    #[error("invalid duration in {var}: {source}")]
    InvalidDuration {
        /// The environment variable name.
        var: &'static str,
        /// Parse failure.
        #[source]
        source: DurationError,
    },
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:8080".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };
        assert!(err.to_string().contains("failed to bind to 127.0.0.1:8080"));
        assert!(err.is_startup());

        let err = ServerError::Accept(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(err.to_string().contains("accept loop failed"));
        assert!(!err.is_startup());
    }

    #[test]
    fn test_invalid_address_display() {
        let source = "nope".parse::<SocketAddr>().unwrap_err();
        let err = ServerError::InvalidAddress {
            addr: "nope".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("invalid address 'nope'"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidPort {
            value: "http".to_string(),
        };
        assert!(err.to_string().contains("\"http\""));

        let err = ConfigError::InvalidDuration {
            var: "SHUTDOWN_TIMEOUT",
            source: DurationError::Empty,
        };
        assert_eq!(
            err.to_string(),
            "invalid duration in SHUTDOWN_TIMEOUT: empty duration string"
        );
    }
}
