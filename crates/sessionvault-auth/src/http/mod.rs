//! HTTP hooks for axum applications.

pub mod cookie;
pub mod error;
pub mod guard;
pub mod session;

pub use cookie::{clear_refresh_cookie, read_refresh_cookie, refresh_cookie};
pub use error::status_code;
pub use guard::{Authenticated, RENEWED_TOKEN_HEADER, SUBJECT_HEADER, access_guard};
pub use session::{
    ConfirmResponse, RefreshResponse, SessionState, confirm_handler, logout_handler,
    refresh_handler,
};
