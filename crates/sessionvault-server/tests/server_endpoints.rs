use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use sessionvault_auth::TokenConfig;
use sessionvault_server::{AppConfig, AppContext, build_app};
use sessionvault_store::{KvStore, ManualClock, MemoryStore, StoreBackend};
use tokio::task::JoinHandle;

struct TestServer {
    base: String,
    ctx: AppContext,
    clock: Arc<ManualClock>,
    store: Arc<MemoryStore>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

fn test_config() -> AppConfig {
    let mut cfg = AppConfig {
        tokens: TokenConfig::new("server-access-secret", "server-refresh-secret"),
        ..Default::default()
    };
    cfg.store.backend = StoreBackend::Memory;
    cfg.cookie.secure = false;
    cfg
}

async fn start_server() -> TestServer {
    let cfg = test_config();
    let clock = Arc::new(ManualClock::starting_now());
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let ctx = AppContext::new(&cfg, store.clone(), clock.clone()).expect("valid config");
    let app = build_app(&cfg, &ctx);

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    TestServer {
        base: format!("http://{addr}"),
        ctx,
        clock,
        store,
        shutdown: Some(tx),
        handle: Some(handle),
    }
}

#[tokio::test]
async fn healthz_reports_store_status() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/healthz", server.base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "memory");
    assert_eq!(body["store"], "connected");

    server.store.connection().mark_disconnected();
    let resp = client.get(format!("{}/healthz", server.base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["store"], "disconnected");

    server.stop().await;
}

#[tokio::test]
async fn protected_route_renews_expired_access_token() {
    let server = start_server().await;
    let client = reqwest::Client::new();
    let url = format!("{}/auth/session", server.base);

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key("www-authenticate"));

    let session = server.ctx.services.issuer.issue_session("u1").await.unwrap();

    let resp = client
        .get(&url)
        .bearer_auth(&session.access_token)
        .header("x-auth-subject", "u1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!resp.headers().contains_key("x-access-token"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["subject"], "u1");
    assert_eq!(body["renewed"], false);

    server.clock.advance(Duration::from_secs(61));
    let resp = client
        .get(&url)
        .bearer_auth(&session.access_token)
        .header("x-auth-subject", "u1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let renewed = resp
        .headers()
        .get("x-access-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("renewed token header");
    assert_ne!(renewed, session.access_token);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["renewed"], true);

    // Once the refresh token is gone as well, expiry is final.
    server.clock.advance(Duration::from_secs(540));
    let resp = client
        .get(&url)
        .bearer_auth(&session.access_token)
        .header("x-auth-subject", "u1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "token_expired");

    server.stop().await;
}

#[tokio::test]
async fn refresh_and_logout_use_the_cookie() {
    let server = start_server().await;
    let client = reqwest::Client::new();
    let session = server.ctx.services.issuer.issue_session("u1").await.unwrap();
    let cookie = format!("jwt={}", session.refresh_token);

    let resp = client
        .post(format!("{}/auth/refresh", server.base))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(set_cookie.starts_with(&format!("jwt={}", session.refresh_token)));
    assert!(set_cookie.contains("HttpOnly"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["subject"], "u1");
    assert!(body.get("refresh_token").is_none());

    let resp = client
        .post(format!("{}/auth/logout", server.base))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(server.store.is_empty());

    let resp = client
        .post(format!("{}/auth/refresh", server.base))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    server.stop().await;
}

#[tokio::test]
async fn confirmation_link_works_once() {
    let server = start_server().await;
    let client = reqwest::Client::new();
    let confirmation = &server.ctx.services.confirmation;

    let secret = confirmation.issue_and_cache("a@b.com").await.unwrap();
    let link = confirmation.confirmation_link("a@b.com", &secret);
    let url = format!("{}{}", server.base, link.path());

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["email"], "a@b.com");
    assert_eq!(body["confirmed"], true);

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    server.stop().await;
}
