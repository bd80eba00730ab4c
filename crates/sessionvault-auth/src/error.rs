//! Authentication error types.
//!
//! Every failure surfaced by the token lifecycle and the confirmation flow is
//! an [`AuthError`]. Expired access tokens that can still be renewed are not
//! errors; see [`AccessOutcome::Renewed`](crate::AccessOutcome::Renewed).

use std::fmt;

use sessionvault_store::StoreError;

use crate::token::jwt::JwtError;

/// Errors that can occur while issuing or verifying credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Bad signature, unparseable token, or claims that do not match the
    /// presented subject. Never retried.
    #[error("Malformed token: {message}")]
    MalformedToken {
        /// Description of why the token was rejected.
        message: String,
    },

    /// The access token expired and no refresh token is cached for the
    /// subject, or the presented refresh token itself expired.
    #[error("Token expired")]
    ExpiredUnrecoverable,

    /// The presented refresh token is not the one cached for its subject.
    ///
    /// Also returned when nothing is cached, so callers cannot tell whether
    /// a subject has an active session.
    #[error("Refresh token does not match the active session")]
    TokenMismatch,

    /// The cache store cannot be reached.
    #[error("Store unavailable: {message}")]
    StoreUnavailable {
        /// Description of the store failure.
        message: String,
    },

    /// The confirmation secret is wrong, expired, or was already used.
    #[error("Invalid confirmation secret")]
    SecretMismatch,

    /// A refresh token could be neither stored nor read back.
    #[error("Cache write failure: {message}")]
    CacheWriteFailure {
        /// Description of the failed write.
        message: String,
    },

    /// Signing key problem. A configuration error, not a client one.
    #[error("Signing error: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },

    /// Missing or malformed request input.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of the invalid input.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `MalformedToken` error.
    #[must_use]
    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken {
            message: message.into(),
        }
    }

    /// Creates a new `StoreUnavailable` error.
    #[must_use]
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `CacheWriteFailure` error.
    #[must_use]
    pub fn cache_write_failure(message: impl Into<String>) -> Self {
        Self::CacheWriteFailure {
            message: message.into(),
        }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken { .. }
                | Self::ExpiredUnrecoverable
                | Self::TokenMismatch
                | Self::SecretMismatch
                | Self::InvalidRequest { .. }
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns `true` if the client should authenticate again.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken { .. } | Self::ExpiredUnrecoverable | Self::TokenMismatch
        )
    }

    /// Returns the error category for logging and metrics.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedToken { .. } => ErrorCategory::Token,
            Self::ExpiredUnrecoverable => ErrorCategory::Token,
            Self::TokenMismatch => ErrorCategory::Token,
            Self::StoreUnavailable { .. } => ErrorCategory::Infrastructure,
            Self::SecretMismatch => ErrorCategory::Confirmation,
            Self::CacheWriteFailure { .. } => ErrorCategory::Infrastructure,
            Self::Signing { .. } => ErrorCategory::Configuration,
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
        }
    }

    /// Machine-readable error code used in response bodies.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedToken { .. } => "malformed_token",
            Self::ExpiredUnrecoverable => "token_expired",
            Self::TokenMismatch => "token_mismatch",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::SecretMismatch => "invalid_secret",
            Self::CacheWriteFailure { .. } => "cache_write_failure",
            Self::Signing { .. } => "server_error",
            Self::InvalidRequest { .. } => "invalid_request",
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::store_unavailable(err.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => Self::ExpiredUnrecoverable,
            JwtError::EncodingError { message } => Self::Signing { message },
            other => Self::malformed_token(other.to_string()),
        }
    }
}

/// Categories of authentication errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Token validation and expiry.
    Token,
    /// Confirmation secret checks.
    Confirmation,
    /// Request validation errors.
    Validation,
    /// Cache store failures.
    Infrastructure,
    /// Signing key and other configuration errors.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => write!(f, "token"),
            Self::Confirmation => write!(f, "confirmation"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Result alias for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::malformed_token("bad signature");
        assert_eq!(err.to_string(), "Malformed token: bad signature");

        assert_eq!(AuthError::SecretMismatch.to_string(), "Invalid confirmation secret");
    }

    #[test]
    fn test_client_vs_server() {
        assert!(AuthError::TokenMismatch.is_client_error());
        assert!(AuthError::ExpiredUnrecoverable.is_client_error());
        assert!(AuthError::SecretMismatch.is_client_error());

        assert!(AuthError::store_unavailable("down").is_server_error());
        assert!(AuthError::cache_write_failure("lost").is_server_error());
        assert!(AuthError::signing("no key").is_server_error());
    }

    #[test]
    fn test_store_errors_map_to_unavailable() {
        let err = AuthError::from(StoreError::unavailable("connection refused"));
        assert!(matches!(err, AuthError::StoreUnavailable { .. }));
        assert_eq!(err.category(), ErrorCategory::Infrastructure);
        assert!(!err.is_unauthenticated());

        let err = AuthError::from(StoreError::Closed);
        assert!(matches!(err, AuthError::StoreUnavailable { .. }));
    }

    #[test]
    fn test_jwt_errors_map() {
        assert_eq!(
            AuthError::from(JwtError::Expired),
            AuthError::ExpiredUnrecoverable
        );
        assert!(matches!(
            AuthError::from(JwtError::InvalidSignature),
            AuthError::MalformedToken { .. }
        ));
        assert!(matches!(
            AuthError::from(JwtError::encoding_error("key")),
            AuthError::Signing { .. }
        ));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Token.to_string(), "token");
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
