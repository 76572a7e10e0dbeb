use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use distribution_records::config::Config;
use distribution_records::ingest::Ingestor;
use distribution_records::server;
use distribution_records::store::DuckDbStore;

/// Serve the record ingestion endpoint over HTTP.
#[derive(Debug, Parser)]
#[command(name = "ingest-server", version)]
struct Args {
    /// TOML config file. Defaults to the per-user config file if present.
    #[arg(long, env = "DISTRIBUTION_RECORDS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:8080.
    #[arg(long)]
    bind: Option<String>,

    /// DuckDB file holding the sheets.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Acknowledge resent submissions without appending them again.
    #[arg(long)]
    idempotent: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut config =
        Config::load_or_default(args.config.as_deref()).context("failed to load config")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(store) = args.store {
        config.server.store_path = Some(store);
    }
    if args.idempotent {
        config.server.idempotent_retries = true;
    }

    let store_path = config.server.store_path();
    let store = DuckDbStore::open(&store_path)
        .with_context(|| format!("failed to open store {}", store_path.display()))?;
    tracing::info!(store = %store_path.display(), "store opened");

    let ingestor = Ingestor::builder(store).config(&config.server).build();
    server::serve(&config.server.bind, ingestor)
        .await
        .context("server error")
}
