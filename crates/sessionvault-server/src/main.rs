use std::{env, sync::Arc};

use anyhow::Context;
use sessionvault_server::config::loader::{DEFAULT_CONFIG_FILE, load_config};
use sessionvault_server::{AppConfig, AppContext, SessionVaultServer};
use sessionvault_store::{Clock, StoreSupervisor, SupervisorPolicy, SystemClock, connect_store};
use tokio_util::sync::CancellationToken;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From SESSIONVAULT_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (sessionvault.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (SESSIONVAULT_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // A missing .env is fine; anything else is worth a warning.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    sessionvault_server::observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(path = %config_path, source = %source, "Configuration loaded");
    sessionvault_server::observability::apply_logging_level(&cfg.logging.level);

    if let Err(err) = run(cfg).await {
        tracing::error!(error = %format!("{err:#}"), "SessionVault stopped");
        eprintln!("Fatal: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = connect_store(&cfg.store, clock.clone())
        .await
        .context("store initialization failed")?;
    let ctx = AppContext::new(&cfg, store.clone(), clock).context("invalid auth configuration")?;

    let shutdown = CancellationToken::new();
    let supervisor = StoreSupervisor::new(
        store.clone(),
        SupervisorPolicy::from(&cfg.store),
        shutdown.clone(),
    )
    .spawn();

    let server = SessionVaultServer::new(&cfg, &ctx);
    let result = tokio::select! {
        served = server.run(shutdown.clone()) => served,
        supervised = supervisor => match supervised {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(anyhow::Error::new(err).context("store supervisor stopped")),
            Err(join) => Err(anyhow::Error::new(join).context("store supervisor panicked")),
        },
    };

    shutdown.cancel();
    store.close().await;
    tracing::info!("store closed");
    result
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: SESSIONVAULT_CONFIG
/// 3. Default: sessionvault.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    if let Ok(path) = env::var("SESSIONVAULT_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    (DEFAULT_CONFIG_FILE.to_string(), ConfigSource::Default)
}
