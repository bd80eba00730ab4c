//! The key-value store contract and shared connection state.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

/// Connection status of a store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Requests are served.
    Connected,
    /// Requests fail fast until the supervisor restores the connection.
    Disconnected,
    /// The store was shut down.
    Closed,
}

impl ConnectionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connected,
            1 => Self::Disconnected,
            _ => Self::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Connected => 0,
            Self::Disconnected => 1,
            Self::Closed => 2,
        }
    }

    /// Returns the status name used in health output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Closed => "closed",
        }
    }
}

/// Lock-free connection flag owned by a backend and driven by the supervisor.
///
/// Request-path operations consult it before touching the network so that a
/// dead store costs nothing more than an atomic load.
#[derive(Debug)]
pub struct ConnectionState {
    status: AtomicU8,
}

impl ConnectionState {
    /// Creates a state in the given status.
    #[must_use]
    pub fn new(status: ConnectionStatus) -> Self {
        Self {
            status: AtomicU8::new(status.as_u8()),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Marks the store reachable. Has no effect once closed.
    pub fn mark_connected(&self) {
        self.transition(ConnectionStatus::Connected);
    }

    /// Marks the store unreachable. Has no effect once closed.
    pub fn mark_disconnected(&self) {
        self.transition(ConnectionStatus::Disconnected);
    }

    /// Marks the store closed. Terminal.
    pub fn mark_closed(&self) {
        self.status
            .store(ConnectionStatus::Closed.as_u8(), Ordering::Release);
    }

    /// Fails fast unless the store is connected.
    pub fn ensure_available(&self) -> StoreResult<()> {
        match self.status() {
            ConnectionStatus::Connected => Ok(()),
            ConnectionStatus::Disconnected => {
                Err(StoreError::unavailable("store is disconnected"))
            }
            ConnectionStatus::Closed => Err(StoreError::Closed),
        }
    }

    /// Records the effect of a failed request-path operation.
    ///
    /// Transient failures flip the state to disconnected so later requests
    /// fail fast until the supervisor's next successful ping.
    pub fn observe(&self, err: StoreError) -> StoreError {
        if err.is_transient() {
            self.mark_disconnected();
        }
        err
    }

    fn transition(&self, to: ConnectionStatus) {
        let closed = ConnectionStatus::Closed.as_u8();
        let _ = self
            .status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != closed).then_some(to.as_u8())
            });
    }
}

/// An expiring key-value store with an atomic set-if-absent primitive.
///
/// All request-path operations fail with [`StoreError::Unavailable`] while
/// the backend is disconnected rather than waiting for a reconnect.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Writes `value` under `key` with a TTL only if `key` does not exist.
    ///
    /// Returns `true` if this call wrote the value. The check and the write
    /// happen in a single store-side operation.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Reads the value under `key`, if present and unexpired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Deletes `key`. Returns `true` if a live entry was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Remaining time to live of `key`, or `None` if it is missing or has no expiry.
    async fn time_to_live(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Round-trips to the store regardless of the recorded connection state.
    ///
    /// Used by the supervisor to detect recovery.
    async fn ping(&self) -> StoreResult<()>;

    /// Releases connections. Later operations fail with [`StoreError::Closed`].
    async fn close(&self);

    /// Connection flag driven by the supervisor.
    fn connection(&self) -> &ConnectionState;

    /// Backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}
