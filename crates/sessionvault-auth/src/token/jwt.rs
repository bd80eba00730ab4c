//! JWT encoding and decoding for access and refresh tokens.
//!
//! Both token kinds are HS256 JWTs signed with independent secrets, so a
//! refresh token presented as an access token (or the reverse) fails
//! signature verification.
//!
//! Expiry is not checked here. Callers compare `exp` against
//! their injected [`Clock`](sessionvault_store::Clock) so that expiry can be
//! simulated.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TokenConfig;

/// Errors that can occur during JWT operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// Invalid key material.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            ErrorKind::InvalidKeyFormat => Self::invalid_key(err.to_string()),
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

/// Which secret a token is signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Key ID written to the JWT header.
    #[must_use]
    pub fn kid(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Claims of a short-lived access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject the token was issued to.
    pub sub: String,
    /// Audience. Always equal to `sub`.
    pub aud: String,
    /// Expiration time (Unix seconds).
    pub exp: i64,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Unique token ID.
    pub jti: String,
}

impl AccessTokenClaims {
    /// Builds claims for `subject` issued at `now` (Unix seconds).
    #[must_use]
    pub fn new(subject: &str, now: i64, ttl: Duration) -> Self {
        Self {
            sub: subject.to_string(),
            aud: subject.to_string(),
            exp: now.saturating_add(ttl_secs(ttl)),
            iat: now,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Returns `true` if the token is expired at `now` (Unix seconds).
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}

/// Claims of a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// Issuer tag.
    pub iss: String,
    /// Subject the token was issued to.
    pub sub: String,
    /// Audience. Always equal to `sub`; verification reads the subject from here.
    pub aud: String,
    /// Expiration time (Unix seconds).
    pub exp: i64,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Unique token ID.
    pub jti: String,
}

impl RefreshTokenClaims {
    /// Builds claims for `subject` issued at `now` (Unix seconds).
    #[must_use]
    pub fn new(issuer: &str, subject: &str, now: i64, ttl: Duration) -> Self {
        Self {
            iss: issuer.to_string(),
            sub: subject.to_string(),
            aud: subject.to_string(),
            exp: now.saturating_add(ttl_secs(ttl)),
            iat: now,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Returns `true` if the token is expired at `now` (Unix seconds).
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}

fn ttl_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
}

struct HmacKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl HmacKey {
    fn from_secret(kind: TokenKind, secret: &str) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::invalid_key(format!(
                "{} token secret is empty",
                kind.kid()
            )));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }
}

/// Signs and verifies access and refresh tokens.
pub struct JwtService {
    access: HmacKey,
    refresh: HmacKey,
    issuer: String,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    /// Creates a service from the token configuration.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::InvalidKey`] if either secret is empty or both are
    /// the same.
    pub fn new(config: &TokenConfig) -> Result<Self, JwtError> {
        if config.access_secret == config.refresh_secret {
            return Err(JwtError::invalid_key(
                "access and refresh tokens must use different secrets",
            ));
        }
        Ok(Self {
            access: HmacKey::from_secret(TokenKind::Access, &config.access_secret)?,
            refresh: HmacKey::from_secret(TokenKind::Refresh, &config.refresh_secret)?,
            issuer: config.issuer.clone(),
        })
    }

    /// Refresh token issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Signs access token claims.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn encode_access(&self, claims: &AccessTokenClaims) -> Result<String, JwtError> {
        self.encode(TokenKind::Access, claims)
    }

    /// Signs refresh token claims.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn encode_refresh(&self, claims: &RefreshTokenClaims) -> Result<String, JwtError> {
        self.encode(TokenKind::Refresh, claims)
    }

    /// Verifies an access token's signature and decodes its claims.
    ///
    /// # Errors
    /// Returns an error if the token is malformed, signed with another key,
    /// or lacks `sub`, `aud`, or `exp`.
    pub fn decode_access(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let validation = validation(&["exp", "sub", "aud"]);
        self.decode(TokenKind::Access, token, &validation)
    }

    /// Verifies a refresh token's signature and issuer and decodes its claims.
    ///
    /// # Errors
    /// Returns an error if the token is malformed, signed with another key,
    /// issued by someone else, or lacks a required claim.
    pub fn decode_refresh(&self, token: &str) -> Result<RefreshTokenClaims, JwtError> {
        let mut validation = validation(&["exp", "sub", "aud", "iss"]);
        validation.set_issuer(&[&self.issuer]);
        self.decode(TokenKind::Refresh, token, &validation)
    }

    fn key(&self, kind: TokenKind) -> &HmacKey {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn encode<T: Serialize>(&self, kind: TokenKind, claims: &T) -> Result<String, JwtError> {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kind.kid().to_string());

        encode(&header, claims, &self.key(kind).encoding)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    fn decode<T: DeserializeOwned + Clone>(
        &self,
        kind: TokenKind,
        token: &str,
        validation: &Validation,
    ) -> Result<T, JwtError> {
        decode::<T>(token, &self.key(kind).decoding, validation)
            .map(|data| data.claims)
            .map_err(JwtError::from)
    }
}

fn validation(required: &[&str]) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(required);
    validation.validate_exp = false; // Checked against the injected clock
    validation.validate_aud = false; // Compared with the presented subject
    validation
}
