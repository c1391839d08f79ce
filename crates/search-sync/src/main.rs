//! Search-index sync job: exports the catalog table as search documents.

use anyhow::{Context, Result};
use catalog_core::SearchExport;
use clap::Parser;
use shared::{CatalogStore, Config, Database, LogConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output file; overrides the configured path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the export to stdout instead of a file
    #[arg(long, conflicts_with = "output")]
    stdout: bool,

    /// Compact JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let mut log_config = LogConfig::from_settings(&config, "search-sync");
    if args.verbose {
        log_config.default_level = tracing::Level::DEBUG;
    }
    // stdout carries the export itself
    if args.stdout {
        log_config.console = false;
    }
    shared::logging::init(log_config)?;

    info!("Search sync starting");

    let db_path = config.database_path();
    info!(db_path = %db_path.display(), "Opening database");
    let database = Database::open(&db_path).context("Failed to open database")?;
    let store = CatalogStore::new(database);

    let export = SearchExport::from_store(&store, &config.search_export.index_name)
        .context("Failed to build search export")?;
    let json = export
        .to_json(!args.compact)
        .context("Failed to serialize search export")?;

    if args.stdout {
        let mut out = std::io::stdout().lock();
        out.write_all(json.as_bytes())
            .and_then(|_| out.write_all(b"\n"))
            .context("Failed to write export to stdout")?;
    } else {
        let path = args.output.unwrap_or_else(|| config.search_export_path());
        write_export(&path, &json)?;
        info!(
            path = %path.display(),
            documents = export.documents.len(),
            "Search export written"
        );
    }

    info!("Search sync finished successfully");
    Ok(())
}

/// Write through a temporary sibling so readers never see a partial file
fn write_export(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move export into place: {}", path.display()))?;
    Ok(())
}
