#![allow(clippy::doc_markdown)]
//! `RankLookup` Server - rank queries for beatmap leaderboards.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ranklookup_core::{MySqlScoreStore, RankCaches, RankLookupConfig, ScoreStore};
use ranklookup_server::{router, AppState};

/// RankLookup Server - cached global rank lookups
#[derive(Parser, Debug)]
#[command(name = "ranklookup-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to ./ranklookup.toml)
    #[arg(short, long, env = "RANKLOOKUP_CONFIG")]
    config: Option<PathBuf>,

    /// Host address to bind to
    #[arg(long, env = "RANKLOOKUP_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "RANKLOOKUP_PORT")]
    port: Option<u16>,

    /// MySQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RankLookupConfig::load_from_path(path)?,
        None => RankLookupConfig::load()?,
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(url) = args.database_url {
        config.store.url = url;
    }
    config.validate()?;

    tracing::info!("Starting RankLookup server...");
    tracing::info!(
        max_connections = config.store.max_connections,
        "Connecting to score store"
    );

    let store: Arc<dyn ScoreStore> = Arc::new(MySqlScoreStore::connect(&config.store).await?);
    let caches = RankCaches::new(&config, store)?;
    let state = Arc::new(AppState { caches });

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("RankLookup server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
