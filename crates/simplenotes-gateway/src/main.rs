use anyhow::Context;
use clap::Parser;
use simplenotes_core::config::{PushMode, SimplenotesConfig};
use simplenotes_core::IdGenerator;
use simplenotes_notify::{NotificationService, Reaper};
use simplenotes_push::{ApiGatewayClient, LocalGateway, PushGateway};
use simplenotes_registry::SqliteConnectionRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod app;
mod auth;
mod http;
mod ws;

#[derive(Parser)]
#[command(name = "simplenotes-gateway", version, about = "Realtime push gateway for SimpleNotes")]
struct Cli {
    /// Path to the TOML config. Defaults to $SIMPLENOTES_CONFIG, then
    /// ~/.simplenotes/simplenotes.toml.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "simplenotes_gateway=info,simplenotes_notify=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > SIMPLENOTES_CONFIG env > ~/.simplenotes/simplenotes.toml
    let config_path = cli
        .config
        .or_else(|| std::env::var("SIMPLENOTES_CONFIG").ok());
    let config = SimplenotesConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        SimplenotesConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    let registry = Arc::new(SqliteConnectionRegistry::new(db)?);

    let ids = Arc::new(IdGenerator::new(config.node.machine_id)?);
    let (gateway, local) = build_gateway(&config, ids)?;

    let service = NotificationService::new(registry, gateway, config.realtime.clone());

    // reaper runs for the life of the process
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let reaper = Reaper::new(service.clone());
    let reaper_task = tokio::spawn(async move { reaper.run(shutdown_rx).await });

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(service, local));
    let router = app::build_router(state);

    info!("SimpleNotes gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // signal reaper to stop
    let _ = shutdown_tx.send(true);
    let _ = reaper_task.await;
    Ok(())
}

/// Pick the push transport from `push.mode`.
fn build_gateway(
    config: &SimplenotesConfig,
    ids: Arc<IdGenerator>,
) -> anyhow::Result<(Arc<dyn PushGateway>, Option<Arc<LocalGateway>>)> {
    match config.push.mode {
        PushMode::Local => {
            info!("push mode: local sockets at /ws");
            let local = Arc::new(LocalGateway::new(ids));
            let gateway: Arc<dyn PushGateway> = local.clone();
            Ok((gateway, Some(local)))
        }
        PushMode::ApiGateway => {
            let cfg = config
                .push
                .api_gateway
                .as_ref()
                .context("push.mode = \"api-gateway\" requires a [push.api_gateway] section")?;
            info!(endpoint = %cfg.endpoint, region = %cfg.region, "push mode: API Gateway");
            let gateway: Arc<dyn PushGateway> = Arc::new(ApiGatewayClient::from_config(cfg)?);
            Ok((gateway, None))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
