//! Per-connection lifecycle tracking.
//!
//! Every accepted connection is recorded in a [`ConnectionRegistry`] with
//! its current [`ConnState`]. The accept loop registers connections as
//! `New`, the request path moves them between `Active` and `Idle`, and the
//! connection task removes them when they close. The drain controller reads
//! the registry to decide when shutdown may proceed.
//!
//! ```text
//!            request            body done
//!   New ──────────────▶ Active ───────────▶ Idle
//!    │                   │  ▲                │
//!    │                   │  └── request ─────┘
//!    │                   ▼
//!    │                Hijacked
//!    └──────────┬────────┴──────────────────┘
//!               ▼
//!             Closed
//! ```
//!
//! # Example
//!
//! ```rust
//! use sample_http_server::{ConnState, ConnectionRegistry};
//!
//! let registry = ConnectionRegistry::new();
//! let (id, _close) = registry.register("127.0.0.1:50000".parse().unwrap());
//! assert_eq!(registry.state(id), Some(ConnState::New));
//! assert!(!registry.is_quiescent());
//!
//! registry.transition(id, ConnState::Active);
//! registry.transition(id, ConnState::Idle);
//! assert!(registry.is_quiescent());
//!
//! registry.transition(id, ConnState::Closed);
//! assert!(registry.is_empty());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use hyper::body::{Body, Frame, SizeHint};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Opaque identity of an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Returns the raw numeric id.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnState {
    /// Accepted, no request seen yet.
    New,
    /// A request is being served.
    Active,
    /// Between requests on a keep-alive connection.
    Idle,
    /// Closed. Terminal.
    Closed,
    /// Taken over by a protocol upgrade. Terminal, never drained.
    Hijacked,
}

impl ConnState {
    /// Returns `true` for states that end the record.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Hijacked)
    }

    /// Returns `true` for states that hold up draining.
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(self, Self::New | Self::Active)
    }

    /// Returns `true` if `self → next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Closed | Self::Hijacked, _) => false,
            (_, Self::Closed) | (Self::New | Self::Idle, Self::Active) => true,
            (Self::Active, Self::Idle | Self::Hijacked) => true,
            _ => false,
        }
    }

    /// Returns the lowercase name of the state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Closed => "closed",
            Self::Hijacked => "hijacked",
        }
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle a connection task waits on to learn it must close immediately.
///
/// A request made before anyone waits is remembered, so it cannot be lost.
#[derive(Debug, Clone, Default)]
pub struct ForceClose {
    notify: Arc<Notify>,
}

impl ForceClose {
    /// Completes once a force-close has been requested.
    pub async fn requested(&self) {
        self.notify.notified().await;
    }

    fn request(&self) {
        self.notify.notify_one();
    }
}

#[derive(Debug)]
struct Record {
    state: ConnState,
    peer: SocketAddr,
    accepted_at: Instant,
    force_close: ForceClose,
}

/// Counts of registered connections by state at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Connections in [`ConnState::New`].
    pub new: usize,
    /// Connections in [`ConnState::Active`].
    pub active: usize,
    /// Connections in [`ConnState::Idle`].
    pub idle: usize,
}

impl RegistrySnapshot {
    /// Total registered connections.
    #[must_use]
    pub fn total(&self) -> usize {
        self.new + self.active + self.idle
    }

    /// Returns `true` if no connection is `New` or `Active`.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.new == 0 && self.active == 0
    }
}

/// Registry of live connections and their states.
///
/// All reads and writes go through one mutex, so transitions delivered
/// from many connection tasks at once are serialised.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    records: Mutex<HashMap<ConnectionId, Record>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly accepted connection in state `New`.
    ///
    /// Returns its id and the handle the connection task should watch for
    /// force-close requests.
    pub fn register(&self, peer: SocketAddr) -> (ConnectionId, ForceClose) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let force_close = ForceClose::default();
        self.records.lock().insert(
            id,
            Record {
                state: ConnState::New,
                peer,
                accepted_at: Instant::now(),
                force_close: force_close.clone(),
            },
        );
        tracing::trace!(%id, %peer, "connection registered");
        (id, force_close)
    }

    /// Moves a connection to `next`.
    ///
    /// Terminal states remove the record. Returns `false` if the id is not
    /// registered or the transition is not legal from the current state;
    /// in both cases the registry is unchanged.
    pub fn transition(&self, id: ConnectionId, next: ConnState) -> bool {
        let mut records = self.records.lock();
        let Some(record) = records.get_mut(&id) else {
            tracing::trace!(%id, state = %next, "transition for unregistered connection ignored");
            return false;
        };

        let prev = record.state;
        if !prev.can_transition_to(next) {
            tracing::warn!(%id, from = %prev, to = %next, "rejected illegal connection state transition");
            return false;
        }

        if next.is_terminal() {
            let record = records.remove(&id);
            if let Some(record) = record {
                tracing::trace!(
                    %id,
                    peer = %record.peer,
                    state = %next,
                    lifetime_ms = record.accepted_at.elapsed().as_millis() as u64,
                    "connection removed"
                );
            }
        } else {
            record.state = next;
            tracing::trace!(%id, from = %prev, to = %next, "connection state changed");
        }
        true
    }

    /// Returns the current state of a connection, if registered.
    #[must_use]
    pub fn state(&self, id: ConnectionId) -> Option<ConnState> {
        self.records.lock().get(&id).map(|r| r.state)
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns `true` if no connection is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Counts connections by state.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        let records = self.records.lock();
        let mut snapshot = RegistrySnapshot::default();
        for record in records.values() {
            match record.state {
                ConnState::New => snapshot.new += 1,
                ConnState::Active => snapshot.active += 1,
                ConnState::Idle => snapshot.idle += 1,
                ConnState::Closed | ConnState::Hijacked => {}
            }
        }
        snapshot
    }

    /// Returns `true` if no connection is `New` or `Active`.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        !self.records.lock().values().any(|r| r.state.is_busy())
    }

    /// Force-closes every idle connection, but only if the registry is
    /// quiescent.
    ///
    /// The check and the close happen under one lock, so no connection can
    /// become active in between. Returns the number of connections asked to
    /// close, or `None` if some connection is still `New` or `Active`.
    pub fn close_idle_if_quiescent(&self) -> Option<usize> {
        let records = self.records.lock();
        if records.values().any(|r| r.state.is_busy()) {
            return None;
        }
        for (id, record) in records.iter() {
            tracing::debug!(%id, peer = %record.peer, "closing idle connection");
            record.force_close.request();
        }
        Some(records.len())
    }

    /// Force-closes every registered connection regardless of state.
    ///
    /// Returns the number of connections asked to close.
    pub fn close_all(&self) -> usize {
        let records = self.records.lock();
        for (id, record) in records.iter() {
            tracing::debug!(%id, peer = %record.peer, state = %record.state, "force-closing connection");
            record.force_close.request();
        }
        records.len()
    }
}

/// Marks a connection `Idle` when dropped.
///
/// Created when a request starts; the request is over once the guard is
/// gone, whether the body finished or was dropped by a disconnect.
#[derive(Debug)]
pub struct ActiveGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl ActiveGuard {
    /// Moves `id` to `Active` and returns a guard that moves it back to
    /// `Idle`.
    pub fn enter(registry: Arc<ConnectionRegistry>, id: ConnectionId) -> Self {
        registry.transition(id, ConnState::Active);
        Self { registry, id }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.registry.transition(self.id, ConnState::Idle);
    }
}

/// Response body that releases its [`ActiveGuard`] at end of stream.
#[derive(Debug)]
pub struct TrackedBody<B> {
    inner: B,
    guard: Option<ActiveGuard>,
}

impl<B> TrackedBody<B> {
    /// Wraps `inner`, holding `guard` until the body ends or is dropped.
    pub fn new(inner: B, guard: ActiveGuard) -> Self {
        Self {
            inner,
            guard: Some(guard),
        }
    }
}

impl<B> Body for TrackedBody<B>
where
    B: Body<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if matches!(polled, Poll::Ready(None | Some(Err(_)))) {
            this.guard.take();
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
