use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which backend holds tokens and secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Shared Redis instance (multi-instance deployments).
    #[default]
    Redis,
    /// Process-local map (single instance, development).
    Memory,
}

/// Store connection and supervision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Pool wait/create timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Prefix prepended to every key (e.g., "sv:")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Interval between health pings while connected
    #[serde(default = "default_health_interval_ms")]
    pub health_interval_ms: u64,

    /// First reconnect delay; doubles on each consecutive failure
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for the reconnect delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Consecutive failed reconnects before giving up (0 = never give up)
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

fn default_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_pool_size() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_key_prefix() -> String {
    "sv:".to_string()
}

fn default_health_interval_ms() -> u64 {
    5000
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> u32 {
    20
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_url(),
            pool_size: default_pool_size(),
            timeout_ms: default_timeout_ms(),
            key_prefix: default_key_prefix(),
            health_interval_ms: default_health_interval_ms(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

impl StoreConfig {
    /// Checks invariants the supervisor and pool rely on.
    pub fn validate(&self) -> Result<(), String> {
        if self.backend == StoreBackend::Redis && self.url.trim().is_empty() {
            return Err("store.url must be set for the redis backend".into());
        }
        if self.pool_size == 0 {
            return Err("store.pool_size must be > 0".into());
        }
        if self.timeout_ms == 0 {
            return Err("store.timeout_ms must be > 0".into());
        }
        if self.health_interval_ms == 0 {
            return Err("store.health_interval_ms must be > 0".into());
        }
        if self.initial_backoff_ms == 0 || self.max_backoff_ms < self.initial_backoff_ms {
            return Err("store backoff must satisfy 0 < initial_backoff_ms <= max_backoff_ms".into());
        }
        Ok(())
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend, StoreBackend::Redis);
    }

    #[test]
    fn test_backoff_bounds_checked() {
        let config = StoreConfig {
            initial_backoff_ms: 1000,
            max_backoff_ms: 10,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("backoff"));
    }

    #[test]
    fn test_memory_backend_ignores_url() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            url: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
