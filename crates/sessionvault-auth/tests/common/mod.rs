//! Shared fixture: services over an in-memory store driven by a manual clock.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sessionvault_auth::{AuthServices, ConfirmationConfig, TokenConfig};
use sessionvault_store::{ManualClock, MemoryStore};

pub const ACCESS_TTL: Duration = Duration::from_secs(60);
pub const REFRESH_TTL: Duration = Duration::from_secs(600);

pub struct Fixture {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub services: AuthServices,
}

pub fn token_config() -> TokenConfig {
    TokenConfig::new("test-access-secret", "test-refresh-secret")
        .with_access_ttl(ACCESS_TTL)
        .with_refresh_ttl(REFRESH_TTL)
}

pub fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::starting_now());
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let services = AuthServices::new(
        store.clone(),
        clock.clone(),
        "sv:",
        &token_config(),
        &ConfirmationConfig::default(),
    )
    .expect("valid configuration");

    Fixture {
        clock,
        store,
        services,
    }
}
