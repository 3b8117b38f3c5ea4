//! Connection draining after shutdown is requested.
//!
//! Once the listener is closed, the [`DrainController`] polls the
//! [`ConnectionRegistry`] on a fixed interval. As soon as no connection is
//! `New` or `Active` it closes the idle ones and reports
//! [`DrainOutcome::Drained`]. If the grace deadline passes first it closes
//! everything still open and reports [`DrainOutcome::Forced`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;

use crate::registry::ConnectionRegistry;

/// How draining ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every request finished before the deadline.
    Drained {
        /// Idle keep-alive connections that were closed at the end.
        closed_idle: usize,
    },

    /// The deadline passed with requests still running.
    Forced {
        /// Connections that were force-closed.
        remaining: usize,
    },
}

impl DrainOutcome {
    /// Returns `true` if the deadline was hit.
    #[must_use]
    pub fn is_forced(&self) -> bool {
        matches!(self, Self::Forced { .. })
    }
}

impl fmt::Display for DrainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drained { closed_idle } => {
                write!(f, "drained ({closed_idle} idle connection(s) closed)")
            }
            Self::Forced { remaining } => {
                write!(f, "shutdown forced: {remaining} connection(s) still open")
            }
        }
    }
}

/// Result of a completed shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// How draining ended.
    pub outcome: DrainOutcome,

    /// Time from the shutdown signal to the end of draining.
    pub elapsed: Duration,
}

/// Waits for in-flight requests to finish, up to a deadline.
#[derive(Debug)]
pub struct DrainController {
    registry: Arc<ConnectionRegistry>,
    poll_interval: Duration,
    grace: Duration,
}

impl DrainController {
    /// Creates a controller over `registry`.
    ///
    /// A zero `poll_interval` is bumped to one millisecond.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, poll_interval: Duration, grace: Duration) -> Self {
        Self {
            registry,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            grace,
        }
    }

    /// Drains the registry and returns how it went.
    ///
    /// `started` is when shutdown was requested; the grace period and the
    /// reported elapsed time are both measured from it.
    pub async fn run(self, started: Instant) -> ShutdownReport {
        let deadline = tokio::time::Instant::from_std(started) + self.grace;
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            connections = self.registry.len(),
            grace_ms = self.grace.as_millis() as u64,
            "draining connections"
        );

        let outcome = loop {
            tokio::select! {
                biased;

                _ = ticker.tick() => {
                    if let Some(closed_idle) = self.registry.close_idle_if_quiescent() {
                        break DrainOutcome::Drained { closed_idle };
                    }
                }

                () = &mut sleep => {
                    // A request may have finished between the last tick and the deadline
                    if let Some(closed_idle) = self.registry.close_idle_if_quiescent() {
                        break DrainOutcome::Drained { closed_idle };
                    }
                    let remaining = self.registry.close_all();
                    break DrainOutcome::Forced { remaining };
                }
            }
        };

        let report = ShutdownReport {
            outcome,
            elapsed: started.elapsed(),
        };
        match outcome {
            DrainOutcome::Drained { closed_idle } => tracing::info!(
                closed_idle,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "all connections drained"
            ),
            DrainOutcome::Forced { remaining } => tracing::warn!(
                remaining,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "grace period expired, force-closed remaining connections"
            ),
        }
        report
    }
}
