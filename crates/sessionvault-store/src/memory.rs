//! In-memory store backend for single-instance deployments and tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use crate::backend::{ConnectionState, ConnectionStatus, KvStore};
use crate::clock::{Clock, SystemClock};
use crate::error::StoreResult;

/// A stored value with its absolute expiry.
#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: OffsetDateTime,
}

impl MemoryEntry {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

/// DashMap-backed store with clock-driven expiry.
///
/// `set_if_absent` runs inside a single shard-locked entry operation, which
/// gives the same at-most-one-writer guarantee as Redis `SET NX`.
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<String, MemoryEntry>,
    clock: Arc<dyn Clock>,
    state: ConnectionState,
}

impl MemoryStore {
    /// Creates an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store that evaluates TTLs against `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            state: ConnectionState::new(ConnectionStatus::Connected),
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Returns `true` if no live entries remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        self.state.ensure_available()?;

        let now = self.clock.now();
        let fresh = MemoryEntry {
            value: value.to_string(),
            expires_at: now + ttl,
        };

        let written = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(fresh);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                true
            }
        };

        tracing::trace!(key = %key, written, "memory set_if_absent");
        Ok(written)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.state.ensure_available()?;

        let now = self.clock.now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
            drop(entry);
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.state.ensure_available()?;

        let now = self.clock.now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now)))
    }

    async fn time_to_live(&self, key: &str) -> StoreResult<Option<Duration>> {
        self.state.ensure_available()?;

        let now = self.clock.now();
        Ok(self.entries.get(key).and_then(|entry| {
            let remaining = entry.expires_at - now;
            remaining
                .is_positive()
                .then(|| Duration::try_from(remaining).ok())
                .flatten()
        }))
    }

    /// Also sweeps expired entries, so the supervisor's health interval
    /// bounds how long they linger.
    async fn ping(&self) -> StoreResult<()> {
        if self.state.status() == ConnectionStatus::Closed {
            return Err(crate::StoreError::Closed);
        }
        let purged = self.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "purged expired memory entries");
        }
        Ok(())
    }

    async fn close(&self) {
        self.state.mark_closed();
        self.entries.clear();
        tracing::debug!("memory store closed");
    }

    fn connection(&self) -> &ConnectionState {
        &self.state
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::StoreError;
    use crate::clock::ManualClock;
    use crate::supervisor::{StoreSupervisor, SupervisorPolicy};

    fn store_with_clock() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (MemoryStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_if_absent_keeps_first_value() {
        let (store, _) = store_with_clock();
        let ttl = Duration::from_secs(60);

        assert!(store.set_if_absent("k", "first", ttl).await.unwrap());
        assert!(!store.set_if_absent("k", "second", ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("first"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_replaceable() {
        let (store, clock) = store_with_clock();

        store
            .set_if_absent("k", "old", Duration::from_secs(10))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(10));

        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(
            store
                .set_if_absent("k", "new", Duration::from_secs(10))
                .await
                .unwrap()
        );
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_delete_reports_live_entries_only() {
        let (store, clock) = store_with_clock();

        store
            .set_if_absent("live", "v", Duration::from_secs(30))
            .await
            .unwrap();
        store
            .set_if_absent("stale", "v", Duration::from_secs(5))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(6));

        assert!(store.delete("live").await.unwrap());
        assert!(!store.delete("live").await.unwrap());
        assert!(!store.delete("stale").await.unwrap());
    }

    #[tokio::test]
    async fn test_time_to_live_counts_down() {
        let (store, clock) = store_with_clock();

        store
            .set_if_absent("k", "v", Duration::from_secs(600))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(100));

        let ttl = store.time_to_live("k").await.unwrap().unwrap();
        assert_eq!(ttl, Duration::from_secs(500));
        assert_eq!(store.time_to_live("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = store_with_clock();

        store
            .set_if_absent("a", "1", Duration::from_secs(1))
            .await
            .unwrap();
        store
            .set_if_absent("b", "2", Duration::from_secs(100))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(2));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_ping_sweeps_expired_entries() {
        let (store, clock) = store_with_clock();
        store
            .set_if_absent("a", "1", Duration::from_secs(1))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(2));
        assert_eq!(store.entries.len(), 1);

        store.ping().await.unwrap();
        assert_eq!(store.entries.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervised_store_does_not_accumulate_expired_entries() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        for i in 0..1000 {
            store
                .set_if_absent(&format!("refresh:{i}"), "v", Duration::from_secs(600))
                .await
                .unwrap();
        }
        clock.advance(Duration::from_secs(3600));
        assert_eq!(store.len(), 0);
        assert_eq!(store.entries.len(), 1000);

        let shutdown = CancellationToken::new();
        let supervisor =
            StoreSupervisor::new(store.clone(), SupervisorPolicy::default(), shutdown.clone())
                .spawn();
        tokio::time::sleep(Duration::from_secs(60)).await;
        shutdown.cancel();
        supervisor.await.unwrap().unwrap();

        assert_eq!(store.entries.len(), 0);
    }

    #[tokio::test]
    async fn test_disconnected_store_fails_fast() {
        let (store, _) = store_with_clock();
        store.connection().mark_disconnected();

        let err = store.get("k").await.unwrap_err();
        assert!(err.is_transient());

        // The supervisor's ping still reaches the backend.
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_store_rejects_everything() {
        let (store, _) = store_with_clock();
        store
            .set_if_absent("k", "v", Duration::from_secs(5))
            .await
            .unwrap();
        store.close().await;

        assert_eq!(store.get("k").await, Err(StoreError::Closed));
        assert_eq!(store.ping().await, Err(StoreError::Closed));
    }
}
