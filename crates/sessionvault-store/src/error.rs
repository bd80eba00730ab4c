//! Store error types and transient/fatal classification.
//!
//! Every backend failure is mapped onto [`StoreError`]. The split that matters
//! to callers is [`StoreError::is_transient`]: transient failures are retried
//! by the supervisor in the background, everything else ends the process.

use deadpool::managed::TimeoutType;
use deadpool_redis::{CreatePoolError, PoolError};
use redis::{ErrorKind, RedisError};

/// Errors raised by the cache store adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached right now (network, timeout, reconnecting).
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// Misconfiguration, authentication failure, or protocol error.
    #[error("Fatal store error: {message}")]
    Fatal {
        /// Description of the failure.
        message: String,
    },

    /// The supervisor gave up reconnecting.
    #[error("Store reconnection gave up after {attempts} attempts")]
    RetriesExhausted {
        /// Number of consecutive failed reconnection attempts.
        attempts: u32,
    },

    /// The store was closed during shutdown.
    #[error("Store closed")]
    Closed,
}

impl StoreError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Fatal` error.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns `true` if the process should stop instead of retrying.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. } | Self::RetriesExhausted { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error codes Redis returns for credential problems.
const AUTH_ERROR_CODES: &[&str] = &["NOAUTH", "WRONGPASS", "NOPERM"];

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        classify_redis_error(&err)
    }
}

/// Maps a Redis client error onto the transient/fatal split.
///
/// Authentication, client configuration, and protocol parsing errors are
/// fatal. Network-level failures and server states that resolve on their own
/// (loading, failover) are transient. Anything unrecognised is treated as
/// transient so the supervisor keeps trying.
pub fn classify_redis_error(err: &RedisError) -> StoreError {
    if err.code().is_some_and(|code| AUTH_ERROR_CODES.contains(&code)) {
        return StoreError::fatal(format!("authentication rejected: {err}"));
    }

    match err.kind() {
        ErrorKind::AuthenticationFailed => {
            StoreError::fatal(format!("authentication failed: {err}"))
        }
        ErrorKind::InvalidClientConfig => {
            StoreError::fatal(format!("invalid client configuration: {err}"))
        }
        ErrorKind::ParseError | ErrorKind::TypeError => {
            StoreError::fatal(format!("protocol error: {err}"))
        }
        _ => StoreError::unavailable(err.to_string()),
    }
}

impl From<PoolError> for StoreError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Backend(inner) => classify_redis_error(&inner),
            PoolError::Timeout(kind) => {
                StoreError::unavailable(format!("connection pool timeout ({kind:?})"))
            }
            PoolError::Closed => StoreError::Closed,
            PoolError::NoRuntimeSpecified => {
                StoreError::fatal("connection pool has no runtime configured")
            }
            PoolError::PostCreateHook(hook) => {
                StoreError::fatal(format!("connection setup hook failed: {hook}"))
            }
        }
    }
}

/// Returns `true` if the pool timed out waiting for a free connection.
///
/// The backend may be perfectly healthy in that case; only create and
/// recycle timeouts or backend errors say anything about reachability.
pub fn is_pool_saturation(err: &PoolError) -> bool {
    matches!(err, PoolError::Timeout(TimeoutType::Wait))
}

impl From<CreatePoolError> for StoreError {
    fn from(err: CreatePoolError) -> Self {
        StoreError::fatal(format!("failed to create connection pool: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_error(kind: std::io::ErrorKind) -> RedisError {
        RedisError::from(std::io::Error::new(kind, "socket trouble"))
    }

    #[test]
    fn test_network_errors_are_transient() {
        for kind in [
            std::io::ErrorKind::ConnectionRefused,
            std::io::ErrorKind::ConnectionReset,
            std::io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::TimedOut,
        ] {
            let err = StoreError::from(io_error(kind));
            assert!(err.is_transient(), "{kind:?} should be transient");
            assert!(!err.is_fatal());
        }
    }

    #[test]
    fn test_authentication_failure_is_fatal() {
        let err = StoreError::from(RedisError::from((
            ErrorKind::AuthenticationFailed,
            "Password authentication failed",
        )));
        assert!(err.is_fatal());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let err = StoreError::from(RedisError::from((
            ErrorKind::InvalidClientConfig,
            "Redis URL did not parse",
        )));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_protocol_errors_are_fatal() {
        let err = StoreError::from(RedisError::from((ErrorKind::ParseError, "bad frame")));
        assert!(err.is_fatal());

        let err = StoreError::from(RedisError::from((
            ErrorKind::TypeError,
            "Response was of incompatible type",
        )));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_busy_loading_is_transient() {
        let err = StoreError::from(RedisError::from((
            ErrorKind::BusyLoadingError,
            "Redis is loading the dataset in memory",
        )));
        assert!(err.is_transient());
    }

    #[test]
    fn test_exhausted_and_closed() {
        let err = StoreError::RetriesExhausted { attempts: 5 };
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Store reconnection gave up after 5 attempts"
        );

        assert!(!StoreError::Closed.is_transient());
        assert!(!StoreError::Closed.is_fatal());
    }

    #[test]
    fn test_pool_timeouts_are_transient() {
        for kind in [TimeoutType::Wait, TimeoutType::Create, TimeoutType::Recycle] {
            assert!(StoreError::from(PoolError::Timeout(kind)).is_transient());
        }
        assert!(is_pool_saturation(&PoolError::Timeout(TimeoutType::Wait)));
        assert!(!is_pool_saturation(&PoolError::Timeout(TimeoutType::Create)));
        assert!(!is_pool_saturation(&PoolError::Timeout(TimeoutType::Recycle)));
    }
}
