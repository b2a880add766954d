//! lexicon-svc - Terminology resolution service
//!
//! Serves resolved terminology over HTTP from the SQLite-backed engine.
//! Root folder, bind address and cache lifetime come from the command line,
//! the environment or `config.toml`, in that order.

use anyhow::{Context, Result};
use clap::Parser;
use lexicon_common::config::{resolve_root_folder, EngineConfig, ROOT_FOLDER_ENV};
use lexicon_common::db::SqliteRepository;
use lexicon_common::TerminologyEngine;
use lexicon_svc::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lexicon-svc", version, about = "Terminology resolution service")]
struct Args {
    /// Root folder holding lexicon.db
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5740
    #[arg(long, env = "LEXICON_BIND")]
    bind: Option<String>,

    /// Explicit config file
    #[arg(long, env = "LEXICON_CONFIG")]
    config: Option<PathBuf>,

    /// Lifetime of cached resolutions in seconds
    #[arg(long)]
    cache_ttl_secs: Option<u64>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LEXICON_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    info!("Starting Lexicon terminology service (lexicon-svc) v{}", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    let db_path = config.database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let repo = match SqliteRepository::open(&db_path).await {
        Ok(repo) => {
            info!("✓ Connected to database");
            repo
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let ttl = match args.cache_ttl_secs {
        Some(0) => anyhow::bail!("--cache-ttl-secs must be greater than zero"),
        Some(secs) => Duration::from_secs(secs),
        None => config.cache_ttl(),
    };
    info!("Resolution cache TTL: {}s", ttl.as_secs());

    let engine = TerminologyEngine::with_ttl(Arc::new(repo), ttl);
    let app = build_router(AppState::new(engine));

    let bind = args.bind.unwrap_or(config.bind_address);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("lexicon-svc listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
