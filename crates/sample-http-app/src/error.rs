//! Error types for the sample HTTP app.

use thiserror::Error;

use sample_http_server::{ConfigError, ServerError};
use sample_http_telemetry::TelemetryError;

/// Errors that stop the app. Every one of them exits with status 1.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad command-line arguments.
    #[error("{0}")]
    Usage(String),

    /// Server configuration from the environment is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging could not be set up.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The server failed to start or to keep accepting.
    #[error(transparent)]
    Server(#[from] ServerError),
}

impl AppError {
    /// Process exit status for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::Config(_) | Self::Telemetry(_) | Self::Server(_) => 1,
        }
    }
}

/// Result type for app operations.
pub type AppResult<T> = Result<T, AppError>;
