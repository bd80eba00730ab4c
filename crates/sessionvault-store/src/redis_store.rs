//! Redis store backend.
//!
//! ## Commands
//!
//! | Operation       | Command                      |
//! |-----------------|------------------------------|
//! | `set_if_absent` | `SET key value EX ttl NX`    |
//! | `get`           | `GET key`                    |
//! | `delete`        | `DEL key`                    |
//! | `time_to_live`  | `TTL key`                    |
//! | `ping`          | `PING`                       |
//!
//! Connections come from a deadpool pool whose wait and create timeouts are
//! bounded, so a request never blocks longer than `timeout_ms` even when the
//! pool is exhausted.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, PoolConfig, PoolError, Runtime};
use redis::AsyncCommands;

use crate::backend::{ConnectionState, ConnectionStatus, KvStore};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult, is_pool_saturation};

/// Redis-backed store.
pub struct RedisStore {
    pool: Pool,
    state: ConnectionState,
}

impl RedisStore {
    /// Builds the connection pool and performs an initial `PING`.
    ///
    /// A transient failure on the first ping does not fail startup: the store
    /// comes up disconnected and the supervisor brings it back. Fatal
    /// failures (bad URL, rejected credentials) are returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Fatal`] if the pool cannot be built or the
    /// server rejects the connection for a non-transient reason.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);

        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        redis_config.pool = Some(pool_config);

        let pool = redis_config.create_pool(Some(Runtime::Tokio1))?;
        let store = Self {
            pool,
            state: ConnectionState::new(ConnectionStatus::Disconnected),
        };

        match store.ping().await {
            Ok(()) => {
                store.state.mark_connected();
                tracing::info!(pool_size = config.pool_size, "connected to Redis");
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(
                    error = %err,
                    "Redis not reachable at startup, continuing disconnected"
                );
            }
            Err(err) => return Err(err),
        }

        Ok(store)
    }

    async fn checkout(&self) -> StoreResult<Connection> {
        self.state.ensure_available()?;
        self.pool
            .get()
            .await
            .map_err(|e| observe_pool_error(&self.state, e))
    }
}

/// Converts a checkout failure, flipping `state` to disconnected unless the
/// pool was merely saturated.
fn observe_pool_error(state: &ConnectionState, err: PoolError) -> StoreError {
    if is_pool_saturation(&err) {
        tracing::warn!(error = %err, "Redis connection pool saturated");
        return StoreError::from(err);
    }
    state.observe(StoreError::from(err))
}

#[async_trait]
impl KvStore for RedisStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.checkout().await?;

        // Redis rejects EX 0; sub-second TTLs round up to one second.
        let ttl_secs = ttl.as_secs().max(1);
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| self.state.observe(StoreError::from(e)))?;

        let written = reply.as_deref() == Some("OK");
        tracing::debug!(key = %key, ttl_secs, written, "Redis SET NX");
        Ok(written)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.checkout().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| self.state.observe(StoreError::from(e)))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.checkout().await?;
        let removed: i64 = conn
            .del(key)
            .await
            .map_err(|e| self.state.observe(StoreError::from(e)))?;
        tracing::debug!(key = %key, removed, "Redis DEL");
        Ok(removed > 0)
    }

    async fn time_to_live(&self, key: &str) -> StoreResult<Option<Duration>> {
        let mut conn = self.checkout().await?;
        let secs: i64 = conn
            .ttl(key)
            .await
            .map_err(|e| self.state.observe(StoreError::from(e)))?;

        // -2: key missing, -1: no expiry.
        Ok(u64::try_from(secs).ok().map(Duration::from_secs))
    }

    async fn ping(&self) -> StoreResult<()> {
        if self.state.status() == ConnectionStatus::Closed {
            return Err(StoreError::Closed);
        }

        let mut conn = self.pool.get().await.map_err(StoreError::from)?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn close(&self) {
        self.state.mark_closed();
        self.pool.close();
        tracing::info!("Redis connection pool closed");
    }

    fn connection(&self) -> &ConnectionState {
        &self.state
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
