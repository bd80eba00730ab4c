//! `IntoResponse` for [`AuthError`].
//!
//! | Error                                               | Status |
//! |-----------------------------------------------------|--------|
//! | `MalformedToken`, `ExpiredUnrecoverable`, `TokenMismatch` | 401 |
//! | `SecretMismatch`, `InvalidRequest`                  | 400    |
//! | `StoreUnavailable`, `CacheWriteFailure`             | 503    |
//! | `Signing`                                           | 500    |

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        let code = self.error_code();
        let message = public_message(&self);

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                category = %self.category(),
                status = status.as_u16(),
                "request failed"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(code, &message);
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        let body = json!({
            "error": code,
            "message": message,
        });

        (status, headers, Json(body)).into_response()
    }
}

/// HTTP status for an error.
#[must_use]
pub fn status_code(error: &AuthError) -> StatusCode {
    match error {
        AuthError::MalformedToken { .. }
        | AuthError::ExpiredUnrecoverable
        | AuthError::TokenMismatch => StatusCode::UNAUTHORIZED,
        AuthError::SecretMismatch | AuthError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
        AuthError::StoreUnavailable { .. } | AuthError::CacheWriteFailure { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AuthError::Signing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Client-facing message. Internal details stay in the logs.
fn public_message(error: &AuthError) -> String {
    match error {
        AuthError::MalformedToken { .. } => "Invalid token".to_string(),
        AuthError::ExpiredUnrecoverable => "Session expired, please log in again".to_string(),
        AuthError::TokenMismatch => "Invalid session".to_string(),
        AuthError::SecretMismatch => "Invalid or expired confirmation link".to_string(),
        AuthError::InvalidRequest { message } => message.clone(),
        AuthError::StoreUnavailable { .. } | AuthError::CacheWriteFailure { .. } => {
            "Service temporarily unavailable".to_string()
        }
        AuthError::Signing { .. } => "Internal server error".to_string(),
    }
}

fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped_desc = description.replace('"', "\\\"");
    format!("Bearer realm=\"sessionvault\", error=\"{error}\", error_description=\"{escaped_desc}\"")
}
