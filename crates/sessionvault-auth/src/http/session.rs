//! Session endpoint handlers.
//!
//! - `POST /auth/refresh`: exchange the refresh cookie for a new access token
//! - `POST /auth/logout`: end the session and clear the refresh cookie
//! - `GET /auth/confirm/{email}/{secret}`: consume a confirmation secret
//!
//! # Usage
//!
//! ```ignore
//! use axum::{Router, routing::{get, post}};
//! use sessionvault_auth::http::{confirm_handler, logout_handler, refresh_handler};
//!
//! let app = Router::new()
//!     .route("/auth/refresh", post(refresh_handler))
//!     .route("/auth/logout", post(logout_handler))
//!     .route("/auth/confirm/{email}/{secret}", get(confirm_handler))
//!     .with_state(session_state);
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::config::CookieConfig;
use crate::error::{AuthError, AuthResult};
use crate::http::cookie::{clear_refresh_cookie, read_refresh_cookie, refresh_cookie};
use crate::service::AuthServices;

/// State for the session handlers.
#[derive(Clone)]
pub struct SessionState {
    pub services: AuthServices,
    pub cookie: CookieConfig,
}

impl SessionState {
    #[must_use]
    pub fn new(services: AuthServices, cookie: CookieConfig) -> Self {
        Self { services, cookie }
    }
}

/// Response body of a successful refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub subject: String,
}

/// Response body of a successful confirmation.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmResponse {
    pub email: String,
    pub confirmed: bool,
}

/// Issues a new access token for the session identified by the refresh
/// cookie. The cookie is re-set with the current refresh token.
pub async fn refresh_handler(
    State(state): State<SessionState>,
    jar: CookieJar,
) -> AuthResult<(CookieJar, Json<RefreshResponse>)> {
    let token = read_refresh_cookie(&jar, &state.cookie)
        .ok_or_else(|| AuthError::malformed_token("missing refresh token cookie"))?;

    let subject = state.services.verifier.verify_refresh_token(&token).await?;
    let session = state.services.issuer.issue_session(&subject).await?;

    tracing::info!(subject = %subject, "session refreshed");

    let cookie = refresh_cookie(
        &state.cookie,
        &session.refresh_token,
        state.services.issuer.refresh_ttl(),
    );
    Ok((
        jar.add(cookie),
        Json(RefreshResponse {
            access_token: session.access_token,
            subject,
        }),
    ))
}

/// Ends the session identified by the refresh cookie.
///
/// Always clears the cookie. A missing or unrecognised refresh token is not
/// an error; only an unreachable store is.
pub async fn logout_handler(State(state): State<SessionState>, jar: CookieJar) -> Response {
    let cleared = jar.clone().add(clear_refresh_cookie(&state.cookie));

    let Some(token) = read_refresh_cookie(&jar, &state.cookie) else {
        return (cleared, StatusCode::NO_CONTENT).into_response();
    };

    let verifier = &state.services.verifier;
    let result = match verifier.verify_refresh_token(&token).await {
        Ok(subject) => verifier.invalidate_refresh_token(&subject).await.map(|_| ()),
        Err(err) if err.is_unauthenticated() => Ok(()),
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => (cleared, StatusCode::NO_CONTENT).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Consumes the confirmation secret from a confirmation link.
///
/// The caller marks the account confirmed on success.
pub async fn confirm_handler(
    State(state): State<SessionState>,
    Path((email, secret)): Path<(String, String)>,
) -> AuthResult<Json<ConfirmResponse>> {
    state.services.confirmation.consume(&email, &secret).await?;
    Ok(Json(ConfirmResponse {
        email,
        confirmed: true,
    }))
}
