//! SessionVault server: configuration, tracing, store bootstrap, and the
//! HTTP surface over `sessionvault-auth`.

pub mod config;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use server::{AppContext, HealthResponse, SessionInfo, SessionVaultServer, build_app};
