//! Expiring key-value storage for SessionVault.
//!
//! Two backends implement [`KvStore`]:
//!
//! - **Redis** ([`RedisStore`]): shared across instances, atomic `SET NX EX`
//! - **Memory** ([`MemoryStore`]): DashMap with clock-driven expiry
//!
//! A [`StoreSupervisor`] keeps the backend's [`ConnectionState`] current and
//! reconnects with exponential backoff after transient failures.

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod memory;
pub mod redis_store;
pub mod supervisor;

use std::sync::Arc;

pub use backend::{ConnectionState, ConnectionStatus, KvStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{StoreBackend, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use supervisor::{StoreSupervisor, SupervisorPolicy};

/// Creates the store selected by `config.backend`.
///
/// The in-memory backend evaluates TTLs against `clock`; Redis keeps its own
/// time. A Redis server that is down at startup yields a disconnected store
/// rather than an error.
///
/// # Errors
///
/// Returns [`StoreError::Fatal`] for an invalid configuration or a Redis
/// server that rejects the connection outright.
pub async fn connect_store(
    config: &StoreConfig,
    clock: Arc<dyn Clock>,
) -> StoreResult<Arc<dyn KvStore>> {
    config.validate().map_err(StoreError::fatal)?;

    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory store");
            Ok(Arc::new(MemoryStore::with_clock(clock)))
        }
        StoreBackend::Redis => {
            tracing::info!(url = %config.url, "connecting to Redis");
            Ok(Arc::new(RedisStore::connect(config).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..Default::default()
        };

        let store = connect_store(&config, Arc::new(SystemClock)).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
        assert_eq!(store.connection().status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            pool_size: 0,
            ..Default::default()
        };

        let err = connect_store(&config, Arc::new(SystemClock))
            .await
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }
}
