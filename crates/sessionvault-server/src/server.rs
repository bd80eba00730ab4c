use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use sessionvault_auth::http::{
    Authenticated, SessionState, access_guard, confirm_handler, logout_handler, refresh_handler,
};
use sessionvault_auth::{AuthServices, ConfigError};
use sessionvault_store::{Clock, ConnectionStatus, KvStore};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;

/// Store and services shared by every request.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn KvStore>,
    pub services: AuthServices,
}

impl AppContext {
    pub fn new(
        cfg: &AppConfig,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let services = AuthServices::new(
            store.clone(),
            clock,
            &cfg.store.key_prefix,
            &cfg.tokens,
            &cfg.confirmation,
        )?;
        Ok(Self { store, services })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub store: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionInfo {
    pub subject: String,
    pub renewed: bool,
}

pub fn build_app(cfg: &AppConfig, ctx: &AppContext) -> Router {
    let session_state = SessionState::new(ctx.services.clone(), cfg.cookie.clone());

    let session_routes = Router::new()
        .route("/auth/refresh", post(refresh_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/confirm/{email}/{secret}", get(confirm_handler))
        .with_state(session_state);

    let protected = Router::new()
        .route("/auth/session", get(session_info))
        .route_layer(middleware::from_fn_with_state(
            ctx.services.verifier.clone(),
            access_guard,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .with_state(ctx.store.clone())
        .merge(session_routes)
        .merge(protected)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = tracing::field::Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
}

async fn healthz(State(store): State<Arc<dyn KvStore>>) -> (StatusCode, Json<HealthResponse>) {
    let status = store.connection().status();
    let (code, overall) = match status {
        ConnectionStatus::Connected => (StatusCode::OK, "ok"),
        ConnectionStatus::Disconnected | ConnectionStatus::Closed => {
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };
    (
        code,
        Json(HealthResponse {
            status: overall.to_string(),
            backend: store.backend_name().to_string(),
            store: status.as_str().to_string(),
        }),
    )
}

async fn session_info(auth: Authenticated) -> Json<SessionInfo> {
    Json(SessionInfo {
        subject: auth.subject,
        renewed: auth.renewed,
    })
}

pub struct SessionVaultServer {
    addr: String,
    app: Router,
}

impl SessionVaultServer {
    pub fn new(cfg: &AppConfig, ctx: &AppContext) -> Self {
        Self {
            addr: cfg.bind_address(),
            app: build_app(cfg, ctx),
        }
    }

    /// Serves until Ctrl+C or until `shutdown` is cancelled. Either way
    /// `shutdown` ends up cancelled so that background tasks stop too.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        tracing::info!("listening on {}", listener.local_addr()?);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;
        Ok(())
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown signal received"),
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
