//! Tracing setup shared by the service binaries.
//!
//! Each binary logs to stdout and to a daily rotated file named after its
//! component. Levels come from `[logging]` unless `RUST_LOG` is set.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Workspace crates that get the configured level
const WORKSPACE_TARGETS: &[&str] = &["shared", "catalog_core", "homepage_server", "search_sync"];

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log directory path
    pub log_dir: String,
    /// Component name (used for log file naming)
    pub component: String,
    /// Default log level
    pub default_level: Level,
    /// Enable console output
    pub console: bool,
    /// Enable file output
    pub file: bool,
    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "data/logs".to_string(),
            component: "catalog".to_string(),
            default_level: Level::INFO,
            console: true,
            file: true,
            json_format: false,
        }
    }
}

impl LogConfig {
    /// Build a log configuration for `component` from the loaded settings
    pub fn from_settings(config: &crate::Config, component: &str) -> Self {
        Self {
            log_dir: config.log_dir().to_string_lossy().to_string(),
            component: component.to_string(),
            default_level: parse_level(&config.logging.default_level),
            console: config.logging.console,
            file: config.logging.file,
            json_format: config.logging.json_format,
        }
    }
}

/// Parse a level name, falling back to INFO for anything unrecognized
pub fn parse_level(level: &str) -> Level {
    level.trim().parse().unwrap_or(Level::INFO)
}

fn default_directives(config: &LogConfig) -> String {
    let mut directives: Vec<String> = WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, config.default_level))
        .collect();
    directives.push(format!(
        "{}={}",
        config.component.replace('-', "_"),
        config.default_level
    ));
    directives.extend(
        ["hyper=warn", "reqwest=warn", "h2=warn", "tower_http=info"]
            .iter()
            .map(|d| d.to_string()),
    );
    directives.join(",")
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Human-readable stdout output
fn console_layer() -> BoxedLayer {
    fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stdout)
        .boxed()
}

/// Daily rotated `<log_dir>/<component>.<date>` output, plain or JSON lines
fn file_layer(config: &LogConfig) -> BoxedLayer {
    let appender = tracing_appender::rolling::daily(&config.log_dir, &config.component);
    let base = fmt::layer().with_target(true).with_ansi(false);

    if config.json_format {
        base.json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(appender)
            .boxed()
    } else {
        base.with_span_events(FmtSpan::CLOSE)
            .with_writer(appender)
            .boxed()
    }
}

/// Install the global subscriber for one service.
///
/// `RUST_LOG` wins over the configured directives when it is set. Fails if a
/// subscriber was already installed or the log directory cannot be created.
pub fn init(config: LogConfig) -> Result<()> {
    if config.file {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("Failed to create log directory: {}", config.log_dir))?;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config)));

    let layers: Vec<BoxedLayer> = [
        config.console.then(console_layer),
        config.file.then(|| file_layer(&config)),
    ]
    .into_iter()
    .flatten()
    .collect();

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::info!(
        component = %config.component,
        log_dir = %config.log_dir,
        console = config.console,
        file = config.file,
        "Logging initialized"
    );

    Ok(())
}
