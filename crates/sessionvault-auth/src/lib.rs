//! Session token lifecycle for SessionVault.
//!
//! - [`TokenIssuer`] mints access tokens and at most one refresh token per
//!   subject
//! - [`TokenVerifier`] checks access tokens (renewing expired ones while a
//!   refresh token is cached) and refresh tokens (exact match with the cache)
//! - [`ConfirmationSecretManager`] issues and consumes one-time email
//!   confirmation secrets
//!
//! All state lives in a [`KvStore`](sessionvault_store::KvStore) reached
//! through [`TokenCache`].

pub mod cache;
pub mod config;
pub mod confirmation;
pub mod digest;
pub mod error;
pub mod http;
pub mod service;
pub mod token;

pub use cache::TokenCache;
pub use config::{ConfigError, ConfirmationConfig, CookieConfig, SameSitePolicy, TokenConfig};
pub use confirmation::{ConfirmationSecretManager, SECRET_LENGTH, generate_secret};
pub use error::{AuthError, AuthResult, ErrorCategory};
pub use service::AuthServices;
pub use token::{
    AccessOutcome, AccessState, AccessTokenClaims, JwtError, JwtService, RefreshTokenClaims,
    SessionTokens, TokenIssuer, TokenKind, TokenVerifier,
};
