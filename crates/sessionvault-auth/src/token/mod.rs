//! Token minting and verification.

pub mod issuer;
pub mod jwt;
pub mod verifier;

pub use issuer::{SessionTokens, TokenIssuer};
pub use jwt::{AccessTokenClaims, JwtError, JwtService, RefreshTokenClaims, TokenKind};
pub use verifier::{AccessOutcome, AccessState, TokenVerifier};
