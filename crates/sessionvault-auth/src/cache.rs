//! Domain vocabulary over the key-value store.
//!
//! Refresh tokens and confirmation secrets live under separate namespaces so
//! that a subject that is also an email address cannot collide:
//!
//! | Entry                | Key                              |
//! |----------------------|----------------------------------|
//! | Refresh token        | `{prefix}refresh:{subject}`      |
//! | Confirmation secret  | `{prefix}confirm:{email}`        |

use std::sync::Arc;
use std::time::Duration;

use sessionvault_store::KvStore;

use crate::error::{AuthError, AuthResult};

/// Caches refresh tokens and confirmation secrets.
#[derive(Clone)]
pub struct TokenCache {
    store: Arc<dyn KvStore>,
    prefix: String,
}

impl TokenCache {
    /// Creates a cache over `store`, prefixing every key with `prefix`.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Stores `token` for `subject` unless one is already cached.
    ///
    /// Returns `true` if this call wrote the entry.
    pub async fn cache_refresh_token(
        &self,
        subject: &str,
        token: &str,
        ttl: Duration,
    ) -> AuthResult<bool> {
        self.set_if_absent(&self.refresh_key(subject), subject, token, ttl)
            .await
    }

    /// The refresh token cached for `subject`, if any.
    pub async fn lookup_refresh_token(&self, subject: &str) -> AuthResult<Option<String>> {
        require("subject", subject)?;
        Ok(self.store.get(&self.refresh_key(subject)).await?)
    }

    /// Removes the refresh token cached for `subject`.
    ///
    /// Returns `true` if an entry was removed.
    pub async fn invalidate_refresh_token(&self, subject: &str) -> AuthResult<bool> {
        require("subject", subject)?;
        Ok(self.store.delete(&self.refresh_key(subject)).await?)
    }

    /// Stores `secret` for `email` unless one is already cached.
    ///
    /// Returns `true` if this call wrote the entry.
    pub async fn cache_confirmation_secret(
        &self,
        email: &str,
        secret: &str,
        ttl: Duration,
    ) -> AuthResult<bool> {
        self.set_if_absent(&self.confirm_key(email), email, secret, ttl)
            .await
    }

    /// The confirmation secret cached for `email`, if any.
    pub async fn lookup_confirmation_secret(&self, email: &str) -> AuthResult<Option<String>> {
        require("email", email)?;
        Ok(self.store.get(&self.confirm_key(email)).await?)
    }

    /// Removes the confirmation secret cached for `email`.
    ///
    /// Returns `true` only for the caller that actually removed the entry.
    pub async fn invalidate_confirmation_secret(&self, email: &str) -> AuthResult<bool> {
        require("email", email)?;
        Ok(self.store.delete(&self.confirm_key(email)).await?)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        owner: &str,
        value: &str,
        ttl: Duration,
    ) -> AuthResult<bool> {
        require("key", owner)?;
        require("value", value)?;
        if ttl.is_zero() {
            return Err(AuthError::invalid_request("ttl must be greater than zero"));
        }
        Ok(self.store.set_if_absent(key, value, ttl).await?)
    }

    fn refresh_key(&self, subject: &str) -> String {
        format!("{}refresh:{subject}", self.prefix)
    }

    fn confirm_key(&self, email: &str) -> String {
        format!("{}confirm:{email}", self.prefix)
    }
}

fn require(what: &str, value: &str) -> AuthResult<()> {
    if value.is_empty() {
        return Err(AuthError::invalid_request(format!("{what} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use sessionvault_store::MemoryStore;

    use super::*;

    const TTL: Duration = Duration::from_secs(600);

    fn cache() -> (TokenCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (TokenCache::new(store.clone(), "sv:"), store)
    }

    #[tokio::test]
    async fn test_refresh_token_is_set_once() {
        let (cache, _) = cache();

        assert!(cache.cache_refresh_token("u1", "first", TTL).await.unwrap());
        assert!(!cache.cache_refresh_token("u1", "second", TTL).await.unwrap());
        assert_eq!(
            cache.lookup_refresh_token("u1").await.unwrap().as_deref(),
            Some("first")
        );
    }

    #[tokio::test]
    async fn test_namespaces_do_not_collide() {
        let (cache, store) = cache();
        let email = "a@b.com";

        cache.cache_refresh_token(email, "token", TTL).await.unwrap();
        cache
            .cache_confirmation_secret(email, "secret", TTL)
            .await
            .unwrap();

        assert_eq!(store.get("sv:refresh:a@b.com").await.unwrap().as_deref(), Some("token"));
        assert_eq!(store.get("sv:confirm:a@b.com").await.unwrap().as_deref(), Some("secret"));

        assert!(cache.invalidate_refresh_token(email).await.unwrap());
        assert!(cache.lookup_confirmation_secret(email).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_incomplete_parameters_rejected() {
        let (cache, store) = cache();

        for result in [
            cache.cache_refresh_token("", "token", TTL).await,
            cache.cache_refresh_token("u1", "", TTL).await,
            cache.cache_refresh_token("u1", "token", Duration::ZERO).await,
        ] {
            assert!(matches!(result, Err(AuthError::InvalidRequest { .. })));
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_surfaces_as_unavailable() {
        let (cache, store) = cache();
        store.connection().mark_disconnected();

        let err = cache.lookup_refresh_token("u1").await.unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_confirmation_invalidate_reports_single_winner() {
        let (cache, _) = cache();
        cache
            .cache_confirmation_secret("a@b.com", "secret", TTL)
            .await
            .unwrap();

        assert!(cache.invalidate_confirmation_secret("a@b.com").await.unwrap());
        assert!(!cache.invalidate_confirmation_secret("a@b.com").await.unwrap());
    }
}
