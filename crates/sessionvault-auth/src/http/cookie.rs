//! Refresh token cookie.
//!
//! The refresh token travels only in an `HttpOnly` cookie; it is never placed
//! in a response body.

use std::time::Duration;

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::config::{CookieConfig, SameSitePolicy};

impl From<SameSitePolicy> for SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::None => SameSite::None,
        }
    }
}

/// Builds the cookie carrying `token`, expiring after `max_age`.
#[must_use]
pub fn refresh_cookie(config: &CookieConfig, token: &str, max_age: Duration) -> Cookie<'static> {
    let max_age = time::Duration::seconds(i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX));

    Cookie::build((config.name.clone(), token.to_string()))
        .http_only(true)
        .secure(config.secure)
        .same_site(config.same_site.into())
        .path(config.path.clone())
        .max_age(max_age)
        .build()
}

/// Builds a cookie that makes the browser drop the refresh token.
#[must_use]
pub fn clear_refresh_cookie(config: &CookieConfig) -> Cookie<'static> {
    Cookie::build((config.name.clone(), String::new()))
        .http_only(true)
        .secure(config.secure)
        .same_site(config.same_site.into())
        .path(config.path.clone())
        .max_age(time::Duration::ZERO)
        .build()
}

/// Reads the refresh token from the request cookies.
#[must_use]
pub fn read_refresh_cookie(jar: &CookieJar, config: &CookieConfig) -> Option<String> {
    jar.get(&config.name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, header};

    use super::*;

    #[test]
    fn test_refresh_cookie_attributes() {
        let cookie = refresh_cookie(&CookieConfig::default(), "tok", Duration::from_secs(600));
        let rendered = cookie.to_string();

        assert!(rendered.starts_with("jwt=tok"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("SameSite=Strict"));
        assert!(rendered.contains("Max-Age=600"));
        assert!(rendered.contains("Path=/"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let rendered = clear_refresh_cookie(&CookieConfig::default()).to_string();
        assert!(rendered.starts_with("jwt=;"));
        assert!(rendered.contains("Max-Age=0"));
    }

    #[test]
    fn test_read_refresh_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; jwt=abc.def.ghi"),
        );
        let jar = CookieJar::from_headers(&headers);

        assert_eq!(
            read_refresh_cookie(&jar, &CookieConfig::default()).as_deref(),
            Some("abc.def.ghi")
        );

        let config = CookieConfig {
            name: "other".into(),
            ..Default::default()
        };
        assert_eq!(read_refresh_cookie(&jar, &config), None);
    }
}
