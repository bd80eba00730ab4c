//! Access and refresh token verification.
//!
//! ## Access check
//!
//! ```text
//!                ┌──► Valid                 (signature ok, not expired)
//! Presented ─────┼──► ExpiredRecoverable    (expired, refresh token cached → renewed)
//!                ├──► ExpiredUnrecoverable  (expired, nothing cached)
//!                └──► Invalid               (bad signature, malformed, wrong subject)
//! ```
//!
//! Only expiry has a recovery path. Signature and format failures are never
//! retried.

use std::sync::Arc;

use sessionvault_store::Clock;

use crate::cache::TokenCache;
use crate::digest::{constant_time_eq, fingerprint};
use crate::error::{AuthError, AuthResult};
use crate::token::issuer::TokenIssuer;
use crate::token::jwt::JwtService;

/// Outcome classes of an access token check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessState {
    Valid,
    ExpiredRecoverable,
    ExpiredUnrecoverable,
    Invalid,
}

impl AccessState {
    /// Classifies the result of [`TokenVerifier::verify_access_token`].
    ///
    /// Returns `None` for failures unrelated to the token itself, such as an
    /// unreachable store.
    #[must_use]
    pub fn of(result: &AuthResult<AccessOutcome>) -> Option<Self> {
        match result {
            Ok(AccessOutcome::Valid { .. }) => Some(Self::Valid),
            Ok(AccessOutcome::Renewed { .. }) => Some(Self::ExpiredRecoverable),
            Err(AuthError::ExpiredUnrecoverable) => Some(Self::ExpiredUnrecoverable),
            Err(AuthError::MalformedToken { .. }) => Some(Self::Invalid),
            Err(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::ExpiredRecoverable => "expired_recoverable",
            Self::ExpiredUnrecoverable => "expired_unrecoverable",
            Self::Invalid => "invalid",
        }
    }
}

/// A successful access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    /// The presented token is valid.
    Valid { subject: String },

    /// The presented token expired but the subject still has a refresh
    /// token. The request proceeds and `access_token` must be sent back to
    /// the client.
    Renewed {
        subject: String,
        access_token: String,
    },
}

impl AccessOutcome {
    /// The authenticated subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::Valid { subject } | Self::Renewed { subject, .. } => subject,
        }
    }

    /// The replacement access token, if one was minted.
    #[must_use]
    pub fn renewed_token(&self) -> Option<&str> {
        match self {
            Self::Valid { .. } => None,
            Self::Renewed { access_token, .. } => Some(access_token),
        }
    }
}

/// Verifies presented tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    jwt: Arc<JwtService>,
    cache: TokenCache,
    issuer: TokenIssuer,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(
        jwt: Arc<JwtService>,
        cache: TokenCache,
        issuer: TokenIssuer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            jwt,
            cache,
            issuer,
            clock,
        }
    }

    /// Checks an access token presented on behalf of `subject`.
    ///
    /// An expired token is silently renewed when a refresh token is cached
    /// for the subject.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedToken`] for a bad signature, unparseable
    ///   token, or a token issued to a different subject
    /// - [`AuthError::ExpiredUnrecoverable`] if the token expired and no
    ///   refresh token is cached
    /// - [`AuthError::StoreUnavailable`] if renewal needs the store and it
    ///   cannot be reached
    pub async fn verify_access_token(
        &self,
        token: &str,
        subject: &str,
    ) -> AuthResult<AccessOutcome> {
        let claims = self.jwt.decode_access(token).map_err(|e| {
            tracing::debug!(subject, error = %e, "rejected access token");
            AuthError::malformed_token(e.to_string())
        })?;

        if claims.aud != subject || claims.sub != subject {
            tracing::debug!(subject, "access token issued to another subject");
            return Err(AuthError::malformed_token(
                "token audience does not match subject",
            ));
        }

        if !claims.is_expired_at(self.clock.unix_timestamp()) {
            return Ok(AccessOutcome::Valid {
                subject: subject.to_string(),
            });
        }

        if self.cache.lookup_refresh_token(subject).await?.is_none() {
            tracing::debug!(subject, "access token expired without an active session");
            return Err(AuthError::ExpiredUnrecoverable);
        }

        let access_token = self.issuer.mint_access_token(subject)?;
        tracing::info!(subject, expired_jti = %claims.jti, "renewed expired access token");
        Ok(AccessOutcome::Renewed {
            subject: subject.to_string(),
            access_token,
        })
    }

    /// Checks a refresh token and returns the subject it belongs to.
    ///
    /// The presented token must equal the value cached for its subject.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedToken`] for a bad signature or claims
    /// - [`AuthError::ExpiredUnrecoverable`] if the token expired
    /// - [`AuthError::TokenMismatch`] if nothing, or something else, is
    ///   cached for the subject
    /// - [`AuthError::StoreUnavailable`] if the store cannot be reached
    pub async fn verify_refresh_token(&self, token: &str) -> AuthResult<String> {
        let claims = self.jwt.decode_refresh(token).map_err(|e| {
            tracing::debug!(error = %e, "rejected refresh token");
            AuthError::malformed_token(e.to_string())
        })?;

        if claims.is_expired_at(self.clock.unix_timestamp()) {
            return Err(AuthError::ExpiredUnrecoverable);
        }

        let subject = claims.aud;
        match self.cache.lookup_refresh_token(&subject).await? {
            Some(cached) if constant_time_eq(&cached, token) => Ok(subject),
            _ => {
                tracing::debug!(
                    subject = %subject,
                    token = %fingerprint(token),
                    "refresh token is not the cached one"
                );
                Err(AuthError::TokenMismatch)
            }
        }
    }

    /// Ends the subject's session by dropping its cached refresh token.
    ///
    /// Returns `true` if a session was active.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] if the store cannot be reached.
    pub async fn invalidate_refresh_token(&self, subject: &str) -> AuthResult<bool> {
        let removed = self.cache.invalidate_refresh_token(subject).await?;
        tracing::info!(subject, removed, "refresh token invalidated");
        Ok(removed)
    }
}
