//! press-shift server binary.
//!
//! Opens (or creates) the SQLite database, seeds the norm registry, and
//! serves the JSON API until interrupted.

use anyhow::Result;
use clap::Parser;
use press_shift::api::server::start_server;
use press_shift::config::AppConfig;
use press_shift::db::Database;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "press-shift", version, about)]
struct Cli {
    /// Path to the config file (default: $PRESS_SHIFT_CONFIG or
    /// ~/.press-shift/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Port for the HTTP API (overrides config)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db_path) = cli.db {
        config.database_path = db_path;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    info!(db = %config.database_path.display(), "opening database");
    let db = Database::open(&config.database_path)?;

    let (shutdown_tx, addr) = start_server(db, config.port).await?;
    info!("serving on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    let _ = shutdown_tx.send(());

    Ok(())
}
