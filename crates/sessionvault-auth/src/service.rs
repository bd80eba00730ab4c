//! Wiring of the token and confirmation services over one store.

use std::sync::Arc;

use sessionvault_store::{Clock, KvStore};

use crate::cache::TokenCache;
use crate::config::{ConfigError, ConfirmationConfig, TokenConfig};
use crate::confirmation::ConfirmationSecretManager;
use crate::token::{JwtService, TokenIssuer, TokenVerifier};

/// The token issuer, verifier, and confirmation manager sharing one store
/// and one clock.
#[derive(Clone)]
pub struct AuthServices {
    pub issuer: TokenIssuer,
    pub verifier: TokenVerifier,
    pub confirmation: ConfirmationSecretManager,
}

impl AuthServices {
    /// Builds the services.
    ///
    /// # Errors
    ///
    /// Returns an error if the token or confirmation configuration is
    /// invalid.
    pub fn new(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        key_prefix: &str,
        tokens: &TokenConfig,
        confirmation: &ConfirmationConfig,
    ) -> Result<Self, ConfigError> {
        tokens.validate()?;

        let jwt = Arc::new(
            JwtService::new(tokens).map_err(|e| ConfigError::InvalidValue(e.to_string()))?,
        );
        let cache = TokenCache::new(store, key_prefix);
        let issuer = TokenIssuer::new(jwt.clone(), cache.clone(), clock.clone(), tokens);
        let verifier = TokenVerifier::new(jwt, cache.clone(), issuer.clone(), clock);
        let confirmation = ConfirmationSecretManager::from_config(cache, confirmation)?;

        Ok(Self {
            issuer,
            verifier,
            confirmation,
        })
    }
}
