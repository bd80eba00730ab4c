//! Access and refresh token minting.
//!
//! Refresh tokens follow a conditional-cache protocol so that a subject has
//! at most one active refresh token:
//!
//! ```text
//! lookup ──hit──────────────────────────────► return cached
//!   │ miss
//!   ▼
//! sign ──► SET NX ──won──────────────────────► return signed
//!   ▲        │ lost
//!   │        ▼
//!   │      lookup ──hit──────────────────────► return winner
//!   │        │ miss (winner expired or logged out)
//!   └────────┘  (bounded)
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sessionvault_store::Clock;

use crate::cache::TokenCache;
use crate::config::TokenConfig;
use crate::digest::fingerprint;
use crate::error::{AuthError, AuthResult};
use crate::token::jwt::{AccessTokenClaims, JwtService, RefreshTokenClaims};

/// Sign-and-store attempts before giving up when the winning entry keeps
/// disappearing between `SET NX` and the re-read.
const MAX_MINT_ATTEMPTS: usize = 3;

/// Access and refresh token pair handed out at login, signup, and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Mints access and refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    jwt: Arc<JwtService>,
    cache: TokenCache,
    clock: Arc<dyn Clock>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(
        jwt: Arc<JwtService>,
        cache: TokenCache,
        clock: Arc<dyn Clock>,
        config: &TokenConfig,
    ) -> Self {
        Self {
            jwt,
            cache,
            clock,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    /// Refresh token lifetime, also used as the refresh cookie `Max-Age`.
    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Signs a new access token for `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidRequest`] for an empty subject and
    /// [`AuthError::Signing`] if the token cannot be signed.
    pub fn mint_access_token(&self, subject: &str) -> AuthResult<String> {
        require_subject(subject)?;
        let claims = AccessTokenClaims::new(subject, self.clock.unix_timestamp(), self.access_ttl);
        let token = self.jwt.encode_access(&claims)?;
        tracing::debug!(subject, jti = %claims.jti, exp = claims.exp, "minted access token");
        Ok(token)
    }

    /// Returns the refresh token cached for `subject`, minting one if none is.
    ///
    /// Concurrent callers for the same subject all receive the token that
    /// ends up stored.
    ///
    /// # Errors
    ///
    /// - [`AuthError::StoreUnavailable`] if the initial lookup fails
    /// - [`AuthError::CacheWriteFailure`] if the token can be neither stored
    ///   nor read back
    /// - [`AuthError::Signing`] if the token cannot be signed
    pub async fn mint_refresh_token(&self, subject: &str) -> AuthResult<String> {
        require_subject(subject)?;

        if let Some(existing) = self.cache.lookup_refresh_token(subject).await? {
            tracing::debug!(subject, token = %fingerprint(&existing), "reusing cached refresh token");
            return Ok(existing);
        }

        for attempt in 1..=MAX_MINT_ATTEMPTS {
            let claims = RefreshTokenClaims::new(
                self.jwt.issuer(),
                subject,
                self.clock.unix_timestamp(),
                self.refresh_ttl,
            );
            let token = self.jwt.encode_refresh(&claims)?;

            match self
                .cache
                .cache_refresh_token(subject, &token, self.refresh_ttl)
                .await
            {
                Ok(true) => {
                    tracing::info!(subject, token = %fingerprint(&token), "issued refresh token");
                    return Ok(token);
                }
                Ok(false) => match self.cache.lookup_refresh_token(subject).await? {
                    Some(winner) => {
                        tracing::debug!(
                            subject,
                            token = %fingerprint(&winner),
                            "concurrent mint won, returning its refresh token"
                        );
                        return Ok(winner);
                    }
                    None => {
                        tracing::debug!(subject, attempt, "winning refresh token vanished, retrying");
                    }
                },
                Err(AuthError::StoreUnavailable { message }) => {
                    return match self.cache.lookup_refresh_token(subject).await {
                        Ok(Some(stored)) => Ok(stored),
                        Ok(None) | Err(_) => {
                            tracing::warn!(subject, error = %message, "refresh token could not be cached");
                            Err(AuthError::cache_write_failure(message))
                        }
                    };
                }
                Err(err) => return Err(err),
            }
        }

        Err(AuthError::cache_write_failure(format!(
            "refresh token for subject kept disappearing after {MAX_MINT_ATTEMPTS} attempts"
        )))
    }

    /// Mints an access token and the subject's refresh token.
    ///
    /// # Errors
    ///
    /// See [`Self::mint_access_token`] and [`Self::mint_refresh_token`].
    pub async fn issue_session(&self, subject: &str) -> AuthResult<SessionTokens> {
        let refresh_token = self.mint_refresh_token(subject).await?;
        let access_token = self.mint_access_token(subject)?;
        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }
}

fn require_subject(subject: &str) -> AuthResult<()> {
    if subject.is_empty() {
        return Err(AuthError::invalid_request("subject must not be empty"));
    }
    Ok(())
}
