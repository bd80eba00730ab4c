//! Background supervision of the store connection.
//!
//! The supervisor pings the store on a fixed interval. A transient failure
//! marks the store disconnected (request-path operations then fail fast) and
//! switches to reconnect mode with exponential backoff:
//!
//! ```text
//! attempt:  1      2     3     4     ...   n
//! delay:    500ms  1s    2s    4s    ...   min(initial * 2^(n-1), max)
//! ```
//!
//! A successful ping marks the store connected and resets the backoff.
//! Fatal errors, or more than `max_attempts` consecutive transient failures,
//! end the supervisor with an error. The caller is expected to terminate the
//! process in that case.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::{ConnectionStatus, KvStore};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// Reconnection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorPolicy {
    /// Ping interval while healthy.
    pub health_interval: Duration,
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Delay cap.
    pub max_backoff: Duration,
    /// Consecutive failures tolerated before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl SupervisorPolicy {
    /// Delay before reconnect attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    fn gave_up(&self, failures: u32) -> bool {
        self.max_attempts != 0 && failures > self.max_attempts
    }
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for SupervisorPolicy {
    fn from(config: &StoreConfig) -> Self {
        Self {
            health_interval: config.health_interval(),
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

/// Watches a store and keeps its [`ConnectionState`](crate::ConnectionState) current.
pub struct StoreSupervisor {
    store: Arc<dyn KvStore>,
    policy: SupervisorPolicy,
    shutdown: CancellationToken,
}

impl StoreSupervisor {
    /// Creates a supervisor for `store`. Cancel `shutdown` to stop it.
    #[must_use]
    pub fn new(
        store: Arc<dyn KvStore>,
        policy: SupervisorPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            policy,
            shutdown,
        }
    }

    /// Runs the supervision loop on the current runtime.
    pub fn spawn(self) -> JoinHandle<StoreResult<()>> {
        tokio::spawn(self.run())
    }

    /// Supervision loop.
    ///
    /// Returns `Ok(())` on shutdown and `Err` when the store cannot be
    /// recovered.
    pub async fn run(self) -> StoreResult<()> {
        let backend = self.store.backend_name();
        let state = self.store.connection();
        let mut failures: u32 = 0;

        tracing::info!(
            backend,
            health_interval_ms = self.policy.health_interval.as_millis() as u64,
            "store supervisor started"
        );

        loop {
            let delay = match self.store.ping().await {
                Ok(()) => {
                    if state.status() != ConnectionStatus::Connected {
                        tracing::info!(backend, after_failures = failures, "store connection restored");
                    }
                    state.mark_connected();
                    failures = 0;
                    self.policy.health_interval
                }
                Err(StoreError::Closed) => {
                    tracing::debug!(backend, "store closed, supervisor exiting");
                    return Ok(());
                }
                Err(err) if err.is_transient() => {
                    state.mark_disconnected();
                    failures += 1;

                    if self.policy.gave_up(failures) {
                        let attempts = failures - 1;
                        tracing::error!(backend, attempts, error = %err, "store reconnection gave up");
                        return Err(StoreError::RetriesExhausted { attempts });
                    }

                    let backoff = self.policy.backoff_for(failures);
                    tracing::warn!(
                        backend,
                        attempt = failures,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "store unreachable, reconnecting"
                    );
                    backoff
                }
                Err(err) => {
                    state.mark_disconnected();
                    tracing::error!(backend, error = %err, "fatal store error");
                    return Err(err);
                }
            };

            tokio::select! {
                () = self.shutdown.cancelled() => {
                    tracing::info!(backend, "store supervisor stopped");
                    return Ok(());
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
