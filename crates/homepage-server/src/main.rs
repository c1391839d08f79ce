//! Homepage and catalog HTTP server.

mod server;

use anyhow::{Context, Result};
use catalog_core::{CatalogCache, KodikClient, Revalidator, SectionAggregator};
use clap::Parser;
use shared::{CatalogStore, Config, Database, LogConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Override the configured listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    config.apply_env();

    let mut log_config = LogConfig::from_settings(&config, "homepage-server");
    if args.verbose {
        log_config.default_level = tracing::Level::DEBUG;
    }
    shared::logging::init(log_config)?;

    info!("Homepage server starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    if config.catalog_token().is_none() {
        warn!("Catalog API token is not set; catalog reads will fail until it is configured");
    }
    if config.revalidate_token().is_none() {
        warn!("Revalidation secret is not set; every revalidation request will be rejected");
    }

    let db_path = config.database_path();
    info!(db_path = %db_path.display(), "Opening database");
    let database = Database::open(&db_path).context("Failed to open database")?;
    let store = Arc::new(CatalogStore::new(database));

    let client = KodikClient::new(&config.catalog_api).context("Failed to create catalog client")?;
    let aggregator = SectionAggregator::new(client);

    let cache = Arc::new(CatalogCache::new(&config.cache));
    let revalidator = Revalidator::new(config.revalidation.token.clone(), cache.clone());

    let state = Arc::new(server::AppState {
        aggregator,
        cache,
        revalidator,
        store,
    });

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    server::serve(state, &host, port).await?;

    info!("Homepage server stopped");
    Ok(())
}
