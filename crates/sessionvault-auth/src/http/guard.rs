//! Access token guard for protected routes.
//!
//! Clients send the access token as `Authorization: Bearer <token>` and the
//! subject it was issued to in `X-Auth-Subject`. When an expired token is
//! silently renewed, the replacement is returned in the `X-Access-Token`
//! response header and the client must use it from then on.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware, routing::get};
//! use sessionvault_auth::http::{Authenticated, access_guard};
//!
//! async fn me(Authenticated { subject, .. }: Authenticated) -> String {
//!     subject
//! }
//!
//! let app = Router::new()
//!     .route("/me", get(me))
//!     .layer(middleware::from_fn_with_state(verifier, access_guard));
//! ```

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AuthError;
use crate::token::verifier::{AccessState, TokenVerifier};

/// Request header naming the subject the access token was issued to.
pub const SUBJECT_HEADER: HeaderName = HeaderName::from_static("x-auth-subject");

/// Response header carrying a renewed access token.
pub const RENEWED_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-access-token");

/// The authenticated caller, available to handlers behind [`access_guard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub subject: String,
    /// `true` if the presented token had expired and was replaced.
    pub renewed: bool,
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .cloned()
            .ok_or_else(|| AuthError::malformed_token("request was not authenticated"))
    }
}

/// Middleware that verifies the access token and renews it when expired.
pub async fn access_guard(
    State(verifier): State<TokenVerifier>,
    mut req: Request,
    next: Next,
) -> Response {
    let (token, subject) = match credentials(req.headers()) {
        Ok(credentials) => credentials,
        Err(err) => return err.into_response(),
    };

    let result = verifier.verify_access_token(&token, &subject).await;
    if let Some(state) = AccessState::of(&result) {
        tracing::debug!(subject = %subject, state = state.as_str(), path = %req.uri().path(), "access check");
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => return err.into_response(),
    };

    req.extensions_mut().insert(Authenticated {
        subject: outcome.subject().to_string(),
        renewed: outcome.renewed_token().is_some(),
    });

    let mut response = next.run(req).await;

    if let Some(renewed) = outcome.renewed_token() {
        match HeaderValue::from_str(renewed) {
            Ok(value) => {
                response.headers_mut().insert(RENEWED_TOKEN_HEADER, value);
            }
            Err(e) => {
                tracing::error!(error = %e, "renewed access token is not a valid header value");
            }
        }
    }

    response
}

/// Extracts the bearer token and subject from request headers.
fn credentials(headers: &HeaderMap) -> Result<(String, String), AuthError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::malformed_token("missing bearer token"))?;

    let subject = headers
        .get(&SUBJECT_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AuthError::invalid_request("missing X-Auth-Subject header"))?;

    Ok((token.to_string(), subject.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            credentials(&headers),
            Err(AuthError::MalformedToken { .. })
        ));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(
            credentials(&headers),
            Err(AuthError::MalformedToken { .. })
        ));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert!(matches!(
            credentials(&headers),
            Err(AuthError::InvalidRequest { .. })
        ));

        headers.insert(SUBJECT_HEADER, HeaderValue::from_static("u1"));
        assert_eq!(
            credentials(&headers).unwrap(),
            ("abc.def.ghi".to_string(), "u1".to_string())
        );
    }
}
