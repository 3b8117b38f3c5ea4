//! Structured logging for the sample HTTP server.
//!
//! Logs always go to stderr; stdout is reserved for the readiness line.
//!
//! # Example
//!
//! ```rust,ignore
//! use sample_http_telemetry::logging::{LogConfig, init_logging};
//!
//! let config = LogConfig::from_env()?;
//! init_logging(&config)?;
//!
//! tracing::info!(port = 8080, "server listening");
//! ```

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Environment variable names read by [`LogConfig::from_env`].
pub mod env {
    /// Standard `tracing` filter directive; wins over `LOG_LEVEL`.
    pub const RUST_LOG: &str = "RUST_LOG";

    /// Filter directive, e.g. `info` or `sample_http_server=debug`.
    pub const LOG_LEVEL: &str = "LOG_LEVEL";

    /// Output format, `json` or `pretty`.
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,

    /// Multi-line human-readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(TelemetryError::InvalidConfig(format!(
                "unknown log format {other:?}, expected \"json\" or \"pretty\""
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Pretty => f.write_str("pretty"),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive (e.g., "info", "debug", "sample_http_server=trace").
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LogConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::InvalidConfig` if `LOG_FORMAT` is set to
    /// something other than `json` or `pretty`.
    pub fn from_env() -> TelemetryResult<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Loads the configuration from the given variables.
    ///
    /// Empty values count as unset.
    pub fn from_vars<I, K, V>(vars: I) -> TelemetryResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();
        let mut rust_log = None;
        let mut log_level = None;

        for (key, value) in vars {
            let value: String = value.into();
            if value.trim().is_empty() {
                continue;
            }
            match key.as_ref() {
                env::RUST_LOG => rust_log = Some(value),
                env::LOG_LEVEL => log_level = Some(value),
                env::LOG_FORMAT => config.format = value.parse()?,
                _ => {}
            }
        }

        if let Some(level) = rust_log.or(log_level) {
            config.level = level;
        }
        Ok(config)
    }
}

/// Initializes the logging subsystem.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the filter directive is invalid
/// or a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = create_env_filter(&config.level)?;

    match config.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(filter);

            tracing_subscriber::registry()
                .with(fmt_layer)
                .try_init()
                .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_filter(filter);

            tracing_subscriber::registry()
                .with(fmt_layer)
                .try_init()
                .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
        }
    }

    Ok(())
}

/// Creates an env filter from a directive string.
///
/// # Errors
///
/// Returns error if the filter string is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::LoggingInit(format!("Invalid log level: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!(matches!(
            "xml".parse::<LogFormat>(),
            Err(TelemetryError::InvalidConfig(_))
        ));
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
    }

    #[test]
    fn test_from_vars_empty() {
        let config = LogConfig::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_from_vars_level_and_format() {
        let config =
            LogConfig::from_vars(vars(&[("LOG_LEVEL", "debug"), ("LOG_FORMAT", "pretty")]))
                .unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_rust_log_wins_over_log_level() {
        let config = LogConfig::from_vars(vars(&[
            ("RUST_LOG", "sample_http_server=trace"),
            ("LOG_LEVEL", "warn"),
        ]))
        .unwrap();
        assert_eq!(config.level, "sample_http_server=trace");
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config =
            LogConfig::from_vars(vars(&[("LOG_LEVEL", ""), ("LOG_FORMAT", " ")])).unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_format_is_an_error() {
        let err = LogConfig::from_vars(vars(&[("LOG_FORMAT", "logfmt")])).unwrap_err();
        assert!(err.to_string().contains("logfmt"));
    }

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("info").is_ok());
        assert!(create_env_filter("sample_http_server=debug,hyper=warn").is_ok());
        assert!(create_env_filter("sample_http_server=loud").is_err());
    }

    #[test]
    fn test_from_vars_ignores_unrelated_keys() {
        let config = LogConfig::from_vars(vars(&[("PORT", "8080"), ("WAIT_TIME", "2s")])).unwrap();
        assert_eq!(config, LogConfig::default());
    }

    #[test]
    fn test_init_logging_rejects_bad_directive() {
        let config = LogConfig {
            level: "sample_http_server=loud".to_string(),
            ..Default::default()
        };

        let err = init_logging(&config).unwrap_err();
        assert!(matches!(err, TelemetryError::LoggingInit(_)));
    }
}
