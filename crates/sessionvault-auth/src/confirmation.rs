//! One-time email confirmation secrets.
//!
//! A secret is issued at signup, embedded in a confirmation link by the mail
//! collaborator, and consumed by the confirmation callback. The caller marks
//! the account as confirmed when [`ConfirmationSecretManager::verify`]
//! returns `true`; nothing here touches user records.

use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use url::Url;

use crate::cache::TokenCache;
use crate::config::{ConfigError, ConfirmationConfig};
use crate::digest::constant_time_eq;
use crate::error::{AuthError, AuthResult};

/// Length of a confirmation secret.
pub const SECRET_LENGTH: usize = 30;

const MAX_ISSUE_ATTEMPTS: usize = 3;

/// Generates a secret of [`SECRET_LENGTH`] characters from `[A-Za-z0-9]`
/// using the operating system's CSPRNG.
#[must_use]
pub fn generate_secret() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect()
}

/// Issues and checks confirmation secrets.
#[derive(Clone)]
pub struct ConfirmationSecretManager {
    cache: TokenCache,
    ttl: Duration,
    link_base: Url,
}

impl ConfirmationSecretManager {
    #[must_use]
    pub fn new(cache: TokenCache, ttl: Duration, link_base: Url) -> Self {
        Self {
            cache,
            ttl,
            link_base,
        }
    }

    /// Creates a manager from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn from_config(cache: TokenCache, config: &ConfirmationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let link_base = Url::parse(&config.link_base)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        Ok(Self::new(cache, config.secret_ttl, link_base))
    }

    /// Returns the secret outstanding for `email`, issuing one if none is.
    ///
    /// An existing secret is reused rather than replaced, so at most one
    /// confirmation link is valid at a time.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidRequest`] for an empty email and
    /// [`AuthError::StoreUnavailable`] if the store cannot be reached.
    pub async fn issue_and_cache(&self, email: &str) -> AuthResult<String> {
        if email.is_empty() {
            return Err(AuthError::invalid_request("email must not be empty"));
        }

        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let secret = generate_secret();
            if self
                .cache
                .cache_confirmation_secret(email, &secret, self.ttl)
                .await?
            {
                tracing::info!(email, ttl_secs = self.ttl.as_secs(), "issued confirmation secret");
                return Ok(secret);
            }

            if let Some(existing) = self.cache.lookup_confirmation_secret(email).await? {
                tracing::debug!(email, "reusing outstanding confirmation secret");
                return Ok(existing);
            }
        }

        Err(AuthError::cache_write_failure(
            "confirmation secret could not be stored",
        ))
    }

    /// Checks `supplied` against the secret outstanding for `email`.
    ///
    /// On a match the secret is deleted and `true` is returned, but only to
    /// the caller whose delete removed it; a concurrent second match gets
    /// `false`. A mismatch leaves the secret in place. A missing secret and a
    /// wrong secret are indistinguishable.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] if the store cannot be reached.
    pub async fn verify(&self, email: &str, supplied: &str) -> AuthResult<bool> {
        if email.is_empty() || supplied.is_empty() {
            return Ok(false);
        }

        let Some(cached) = self.cache.lookup_confirmation_secret(email).await? else {
            tracing::debug!(email, "no confirmation secret outstanding");
            return Ok(false);
        };

        if !constant_time_eq(&cached, supplied) {
            tracing::debug!(email, "confirmation secret mismatch");
            return Ok(false);
        }

        let consumed = self.cache.invalidate_confirmation_secret(email).await?;
        if consumed {
            tracing::info!(email, "confirmation secret consumed");
        } else {
            tracing::debug!(email, "confirmation secret already consumed concurrently");
        }
        Ok(consumed)
    }

    /// Like [`Self::verify`], but reports failure as an error.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SecretMismatch`] if verification fails and
    /// [`AuthError::StoreUnavailable`] if the store cannot be reached.
    pub async fn consume(&self, email: &str, supplied: &str) -> AuthResult<()> {
        if self.verify(email, supplied).await? {
            Ok(())
        } else {
            Err(AuthError::SecretMismatch)
        }
    }

    /// Builds `{link_base}/{email}/{secret}` with both appended as encoded
    /// path segments.
    #[must_use]
    pub fn confirmation_link(&self, email: &str, secret: &str) -> Url {
        let mut link = self.link_base.clone();
        if let Ok(mut segments) = link.path_segments_mut() {
            segments.pop_if_empty().push(email).push(secret);
        }
        link
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sessionvault_store::{KvStore, MemoryStore};

    use super::*;

    fn manager() -> (ConfirmationSecretManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = TokenCache::new(store.clone(), "sv:");
        let manager =
            ConfirmationSecretManager::from_config(cache, &ConfirmationConfig::default()).unwrap();
        (manager, store)
    }

    #[test]
    fn test_generated_secret_shape() {
        for _ in 0..100 {
            let secret = generate_secret();
            assert_eq!(secret.len(), SECRET_LENGTH);
            assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
        }
        assert_ne!(generate_secret(), generate_secret());
    }

    #[tokio::test]
    async fn test_issue_reuses_outstanding_secret() {
        let (manager, store) = manager();

        let first = manager.issue_and_cache("a@b.com").await.unwrap();
        let second = manager.issue_and_cache("a@b.com").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        let ttl = store.time_to_live("sv:confirm:a@b.com").await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(600) && ttl > Duration::from_secs(590));
    }

    #[tokio::test]
    async fn test_wrong_guess_keeps_secret() {
        let (manager, _) = manager();
        let secret = manager.issue_and_cache("a@b.com").await.unwrap();

        assert!(!manager.verify("a@b.com", "wrong").await.unwrap());
        assert!(manager.verify("a@b.com", &secret).await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_maps_failure_to_secret_mismatch() {
        let (manager, _) = manager();

        assert_eq!(
            manager.consume("nobody@b.com", "anything").await,
            Err(AuthError::SecretMismatch)
        );
    }

    #[tokio::test]
    async fn test_confirmation_link_encodes_segments() {
        let (manager, _) = manager();

        let link = manager.confirmation_link("a b@c.com", "Secret123");
        assert_eq!(
            link.as_str(),
            "http://localhost:8080/auth/confirm/a%20b@c.com/Secret123"
        );
    }

    #[tokio::test]
    async fn test_link_base_trailing_slash() {
        let store = Arc::new(MemoryStore::new());
        let manager = ConfirmationSecretManager::new(
            TokenCache::new(store, "sv:"),
            Duration::from_secs(600),
            Url::parse("https://app.example.com/verify/").unwrap(),
        );

        assert_eq!(
            manager.confirmation_link("a@b.com", "xyz").as_str(),
            "https://app.example.com/verify/a@b.com/xyz"
        );
    }
}
