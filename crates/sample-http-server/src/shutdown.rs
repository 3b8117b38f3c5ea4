//! Graceful shutdown signal handling.
//!
//! A [`ShutdownSignal`] flips once, on SIGTERM or SIGINT or a programmatic
//! [`trigger`](ShutdownSignal::trigger), and every clone observes it. The
//! accept loop uses it to close the listener, and each connection task uses
//! it to stop keep-alive.
//!
//! # Example
//!
//! ```rust,ignore
//! use sample_http_server::ShutdownSignal;
//!
//! let shutdown = ShutdownSignal::with_os_signals()?;
//! shutdown.recv().await;
//! ```

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::broadcast;

/// A signal that can be used to trigger and await graceful shutdown.
///
/// # Example
///
/// ```rust
/// use sample_http_server::ShutdownSignal;
///
/// let shutdown = ShutdownSignal::new();
/// let shutdown_clone = shutdown.clone();
///
/// shutdown.trigger();
/// assert!(shutdown_clone.is_shutdown());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    /// Whether shutdown has been triggered
    triggered: Arc<AtomicBool>,

    /// Broadcast sender for notifying waiters
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Creates a new, untriggered shutdown signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Triggers the shutdown signal.
    ///
    /// Only the first call has any effect. Returns `true` if this call was
    /// the one that triggered it.
    pub fn trigger(&self) -> bool {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine
            let _ = self.sender.send(());
            true
        } else {
            false
        }
    }

    /// Returns `true` if shutdown has been triggered.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Returns a future that completes when shutdown is triggered.
    ///
    /// Completes immediately if shutdown has already been triggered.
    pub fn recv(&self) -> ShutdownReceiver {
        // Subscribe before checking the flag so a trigger in between is
        // seen by one or the other.
        let mut receiver = self.sender.subscribe();
        let triggered = Arc::clone(&self.triggered);

        ShutdownReceiver {
            triggered: Arc::clone(&triggered),
            wait: Box::pin(async move {
                if triggered.load(Ordering::SeqCst) {
                    return;
                }
                // A closed channel means every signal handle is gone.
                let _ = receiver.recv().await;
            }),
        }
    }

    /// Creates a shutdown signal driven by SIGTERM and SIGINT.
    ///
    /// Handlers are installed before this returns, so a signal delivered
    /// right afterwards is not missed. Signals received after the first are
    /// logged and otherwise ignored. Must be called within a Tokio runtime.
    pub fn with_os_signals() -> io::Result<Self> {
        let signal = Self::new();
        let mut os_signals = OsSignals::install()?;
        let trigger = signal.clone();

        tokio::spawn(async move {
            loop {
                let Some(name) = os_signals.recv().await else {
                    tracing::warn!("signal stream ended");
                    return;
                };
                if trigger.trigger() {
                    tracing::info!(signal = name, "received signal, initiating graceful shutdown");
                } else {
                    tracing::info!(signal = name, "already draining, ignoring signal");
                }
            }
        });

        Ok(signal)
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// A future that completes when the shutdown signal is triggered.
///
/// Created by [`ShutdownSignal::recv()`].
pub struct ShutdownReceiver {
    triggered: Arc<AtomicBool>,
    wait: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl fmt::Debug for ShutdownReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownReceiver")
            .field("triggered", &self.triggered.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Future for ShutdownReceiver {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Fast path: already triggered
        if self.triggered.load(Ordering::SeqCst) {
            return Poll::Ready(());
        }

        self.wait.as_mut().poll(cx)
    }
}

/// The OS signals that start a graceful shutdown.
#[cfg(unix)]
struct OsSignals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    /// Waits for the next signal and returns its name.
    async fn recv(&mut self) -> Option<&'static str> {
        tokio::select! {
            received = self.sigterm.recv() => received.map(|()| "SIGTERM"),
            received = self.sigint.recv() => received.map(|()| "SIGINT"),
        }
    }
}

#[cfg(not(unix))]
struct OsSignals;

#[cfg(not(unix))]
impl OsSignals {
    fn install() -> io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Option<&'static str> {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some("Ctrl+C"),
            Err(e) => {
                tracing::error!(error = %e, "failed to wait for Ctrl+C");
                None
            }
        }
    }
}
