//! Token, confirmation, and cookie configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [tokens]
//! access_secret = "..."
//! refresh_secret = "..."
//! issuer = "sessionvault"
//! access_ttl = "60s"
//! refresh_ttl = "10m"
//!
//! [confirmation]
//! secret_ttl = "10m"
//! link_base = "https://app.example.com/verify"
//!
//! [cookie]
//! name = "jwt"
//! secure = true
//! same_site = "strict"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shortest accepted lifetime. JWT `exp` and Redis `EX` both count whole
/// seconds, so anything shorter is born expired.
pub const MIN_TTL: Duration = Duration::from_secs(1);

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

/// Signing secrets and lifetimes for access and refresh tokens.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC secret for access tokens.
    pub access_secret: String,

    /// HMAC secret for refresh tokens. Must differ from `access_secret`.
    pub refresh_secret: String,

    /// `iss` claim of refresh tokens.
    pub issuer: String,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_ttl: Duration,

    /// Refresh token lifetime, also the TTL of its cache entry.
    #[serde(with = "humantime_serde")]
    pub refresh_ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            issuer: "sessionvault".to_string(),
            access_ttl: Duration::from_secs(60),
            refresh_ttl: Duration::from_secs(600),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl TokenConfig {
    /// Creates a configuration with the given secrets and default lifetimes.
    #[must_use]
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            ..Default::default()
        }
    }

    /// Sets the refresh token issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the access token lifetime.
    #[must_use]
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Sets the refresh token lifetime.
    #[must_use]
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a secret is missing, both secrets are equal, a
    /// lifetime is under one second, or access tokens outlive refresh tokens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_secret.is_empty() {
            return Err(ConfigError::Missing("tokens.access_secret".into()));
        }
        if self.refresh_secret.is_empty() {
            return Err(ConfigError::Missing("tokens.refresh_secret".into()));
        }
        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::InvalidValue(
                "tokens.access_secret and tokens.refresh_secret must differ".into(),
            ));
        }
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Missing("tokens.issuer".into()));
        }
        if self.access_ttl < MIN_TTL || self.refresh_ttl < MIN_TTL {
            return Err(ConfigError::InvalidValue(
                "token lifetimes must be at least one second".into(),
            ));
        }
        if self.access_ttl >= self.refresh_ttl {
            return Err(ConfigError::InvalidValue(
                "tokens.access_ttl must be shorter than tokens.refresh_ttl".into(),
            ));
        }
        Ok(())
    }
}

/// Email confirmation secret settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// How long an issued secret stays valid.
    #[serde(with = "humantime_serde")]
    pub secret_ttl: Duration,

    /// Base URL of the confirmation link. Email and secret are appended as
    /// path segments.
    pub link_base: String,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            secret_ttl: Duration::from_secs(600),
            link_base: "http://localhost:8080/auth/confirm".to_string(),
        }
    }
}

impl ConfirmationConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TTL is under one second or the link base is
    /// not an absolute URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_ttl < MIN_TTL {
            return Err(ConfigError::InvalidValue(
                "confirmation.secret_ttl must be at least one second".into(),
            ));
        }
        let base = url::Url::parse(&self.link_base).map_err(|e| {
            ConfigError::InvalidValue(format!("confirmation.link_base is not a URL: {e}"))
        })?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue(
                "confirmation.link_base cannot carry path segments".into(),
            ));
        }
        Ok(())
    }
}

/// `SameSite` attribute of the refresh token cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    #[default]
    Strict,
    Lax,
    None,
}

/// Refresh token cookie settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie name.
    pub name: String,

    /// Set the `Secure` attribute. Disable only for plain-HTTP development.
    pub secure: bool,

    /// `SameSite` attribute.
    pub same_site: SameSitePolicy,

    /// Cookie path.
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "jwt".to_string(),
            secure: true,
            same_site: SameSitePolicy::Strict,
            path: "/".to_string(),
        }
    }
}

impl CookieConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or `SameSite=None` is used
    /// without `Secure`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Missing("cookie.name".into()));
        }
        if self.same_site == SameSitePolicy::None && !self.secure {
            return Err(ConfigError::InvalidValue(
                "cookie.same_site = \"none\" requires cookie.secure = true".into(),
            ));
        }
        Ok(())
    }
}
