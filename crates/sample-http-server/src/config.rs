//! Server configuration types.
//!
//! Configuration is immutable once the server starts. It is usually loaded
//! from the process environment with [`ServerConfig::from_env`], or built
//! directly with the builder in tests.
//!
//! # Example
//!
//! ```rust
//! use sample_http_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .http_addr("127.0.0.1:0")
//!     .default_wait(Duration::from_millis(5))
//!     .shutdown_timeout(Duration::from_secs(5))
//!     .build();
//!
//! assert_eq!(config.http_addr(), "127.0.0.1:0");
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::duration::parse_duration;
use crate::error::ConfigError;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default pause between `"hello "` and `"world!\n"`.
pub const DEFAULT_WAIT: Duration = Duration::from_micros(10);

/// Default shutdown grace deadline in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default interval between registry checks while draining.
pub const DEFAULT_DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Environment variable names read by [`ServerConfig::from_env`].
pub mod env {
    /// Listening port.
    pub const PORT: &str = "PORT";

    /// Server-wide default wait, overridden per request by `?wait=`.
    pub const WAIT_TIME: &str = "WAIT_TIME";

    /// Grace deadline for draining connections.
    pub const SHUTDOWN_TIMEOUT: &str = "SHUTDOWN_TIMEOUT";
}

/// Server configuration.
///
/// Use [`ServerConfig::builder()`] or [`ServerConfig::from_env()`] to
/// construct instances.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    http_addr: String,

    /// Pause used when a request carries no valid `wait`
    default_wait: Duration,

    /// How long draining may take before remaining connections are dropped
    shutdown_timeout: Duration,

    /// How often the drain loop re-checks the connection registry
    drain_poll_interval: Duration,

    /// Whether HTTP/1.1 keep-alive is enabled
    keep_alive: bool,
}

impl ServerConfig {
    /// Creates a new server configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Loads configuration from the process environment.
    ///
    /// See [`ServerConfig::from_vars`] for the rules.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Loads configuration from a set of key/value pairs.
    ///
    /// - `PORT`: listening port; empty or unset means [`DEFAULT_PORT`],
    ///   anything that is not a port is an error.
    /// - `WAIT_TIME`: default wait; unset or unparseable keeps
    ///   [`DEFAULT_WAIT`].
    /// - `SHUTDOWN_TIMEOUT`: drain grace deadline; unparseable is an error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sample_http_server::ServerConfig;
    /// use std::time::Duration;
    ///
    /// let config = ServerConfig::from_vars([("PORT", "9000"), ("WAIT_TIME", "2s")]).unwrap();
    /// assert_eq!(config.http_addr(), "0.0.0.0:9000");
    /// assert_eq!(config.default_wait(), Duration::from_secs(2));
    /// ```
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        let lookup = |key: &str| vars.get(key).map(String::as_str).filter(|v| !v.is_empty());

        let mut builder = Self::builder();

        if let Some(value) = lookup(env::PORT) {
            let port: u16 = value.trim().parse().map_err(|_| ConfigError::InvalidPort {
                value: value.to_string(),
            })?;
            builder = builder.port(port);
        }

        if let Some(value) = lookup(env::WAIT_TIME) {
            match parse_duration(value) {
                Ok(wait) => builder = builder.default_wait(wait),
                Err(e) => {
                    tracing::warn!(
                        value,
                        error = %e,
                        default = ?DEFAULT_WAIT,
                        "ignoring unparseable WAIT_TIME"
                    );
                }
            }
        }

        if let Some(value) = lookup(env::SHUTDOWN_TIMEOUT) {
            let timeout = parse_duration(value).map_err(|source| ConfigError::InvalidDuration {
                var: env::SHUTDOWN_TIMEOUT,
                source,
            })?;
            builder = builder.shutdown_timeout(timeout);
        }

        Ok(builder.build())
    }

    /// Returns the bind address.
    #[must_use]
    pub fn http_addr(&self) -> &str {
        &self.http_addr
    }

    /// Parses and returns the bind address as a `SocketAddr`.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.http_addr.parse()
    }

    /// Returns the server-wide default wait.
    #[must_use]
    pub fn default_wait(&self) -> Duration {
        self.default_wait
    }

    /// Returns the shutdown grace deadline.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Returns the drain poll interval.
    #[must_use]
    pub fn drain_poll_interval(&self) -> Duration {
        self.drain_poll_interval
    }

    /// Returns whether keep-alive is enabled.
    #[must_use]
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    http_addr: String,
    default_wait: Duration,
    shutdown_timeout: Duration,
    drain_poll_interval: Duration,
    keep_alive: bool,
}

impl ServerConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http_addr: format!("{DEFAULT_HOST}:{DEFAULT_PORT}"),
            default_wait: DEFAULT_WAIT,
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            drain_poll_interval: DEFAULT_DRAIN_POLL_INTERVAL,
            keep_alive: true,
        }
    }

    /// Sets the full bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addr = addr.into();
        self
    }

    /// Binds all interfaces on the given port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.http_addr = format!("{DEFAULT_HOST}:{port}");
        self
    }

    /// Sets the pause used when a request has no valid `wait` parameter.
    #[must_use]
    pub fn default_wait(mut self, wait: Duration) -> Self {
        self.default_wait = wait;
        self
    }

    /// Sets the shutdown grace deadline.
    ///
    /// Connections still open when it elapses are closed forcibly.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets how often the drain loop inspects the connection registry.
    #[must_use]
    pub fn drain_poll_interval(mut self, interval: Duration) -> Self {
        self.drain_poll_interval = interval;
        self
    }

    /// Enables or disables HTTP/1.1 keep-alive.
    #[must_use]
    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    /// Builds the [`ServerConfig`].
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            http_addr: self.http_addr,
            default_wait: self.default_wait,
            shutdown_timeout: self.shutdown_timeout,
            drain_poll_interval: self.drain_poll_interval,
            keep_alive: self.keep_alive,
        }
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
