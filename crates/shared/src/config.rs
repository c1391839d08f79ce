//! TOML settings for the catalog services.
//!
//! Every table has defaults. The two secrets (catalog token, revalidation
//! secret) may be left out of the file and supplied through the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the catalog API token
pub const CATALOG_TOKEN_ENV: &str = "KODIK_API_TOKEN";

/// Environment variable holding the revalidation secret
pub const REVALIDATE_TOKEN_ENV: &str = "REVALIDATE_TOKEN";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    pub data: DataConfig,

    /// Database settings
    pub database: DatabaseConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Third-party catalog API settings
    pub catalog_api: CatalogApiConfig,

    /// Cache TTL settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Revalidation settings
    #[serde(default)]
    pub revalidation: RevalidationConfig,

    /// Search export settings
    #[serde(default)]
    pub search_export: SearchExportConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path (relative to data directory or absolute)
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// Third-party catalog API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogApiConfig {
    /// API base URL
    pub base_url: String,

    /// Access token; requests fail before any network call when absent
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// Maximum retries for transport failures, 429 and 5xx responses
    pub max_retries: u32,

    /// Retry delay in milliseconds (doubled on every attempt)
    pub retry_delay_ms: u64,
}

/// Cache TTL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Homepage composite and per-section TTL
    pub homepage_ttl_seconds: u64,

    /// Per-item SEO metadata TTL
    pub seo_ttl_seconds: u64,

    /// Sitemap id list TTL
    pub sitemap_ttl_seconds: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Revalidation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevalidationConfig {
    /// Shared secret expected in the `x-revalidate-token` header
    #[serde(default)]
    pub token: Option<String>,
}

/// Search export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchExportConfig {
    /// Index name written into the export document
    pub index_name: String,

    /// Output file (relative to data directory or absolute)
    pub output_path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            homepage_ttl_seconds: 300,
            seo_ttl_seconds: 3600,
            sitemap_ttl_seconds: 21600,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for SearchExportConfig {
    fn default() -> Self {
        Self {
            index_name: "animes".to_string(),
            output_path: "search/animes.json".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                root_dir: "data".to_string(),
            },
            database: DatabaseConfig {
                path: "catalog.db".to_string(),
            },
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
            },
            catalog_api: CatalogApiConfig {
                base_url: "https://kodikapi.com".to_string(),
                token: None,
                timeout_seconds: 30,
                max_retries: 2,
                retry_delay_ms: 500,
            },
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
            revalidation: RevalidationConfig::default(),
            search_export: SearchExportConfig::default(),
        }
    }
}

impl Config {
    /// Read `path` as TOML. A missing file yields the defaults so a fresh
    /// checkout runs without any config.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))
            }
        };

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Write the settings as pretty TOML, creating the parent directory.
    ///
    /// Secrets are written as they are held; callers that loaded them from the
    /// environment should not save afterwards.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Fill secrets left empty in the file from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if non_empty(&self.catalog_api.token).is_none() {
            self.catalog_api.token = lookup(CATALOG_TOKEN_ENV).filter(|t| !t.is_empty());
        }
        if non_empty(&self.revalidation.token).is_none() {
            self.revalidation.token = lookup(REVALIDATE_TOKEN_ENV).filter(|t| !t.is_empty());
        }
    }

    /// Catalog API token, treating an empty string as absent
    pub fn catalog_token(&self) -> Option<&str> {
        non_empty(&self.catalog_api.token)
    }

    /// Revalidation secret, treating an empty string as absent
    pub fn revalidate_token(&self) -> Option<&str> {
        non_empty(&self.revalidation.token)
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database.path)
    }

    /// Log directory, under the data root unless absolute
    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.log_dir)
    }

    pub fn search_export_path(&self) -> PathBuf {
        self.resolve(&self.search_export.output_path)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.data.root_dir).join(path)
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.root_dir, "data");
        assert_eq!(config.database.path, "catalog.db");
        assert_eq!(config.cache.homepage_ttl_seconds, 300);
        assert_eq!(config.cache.seo_ttl_seconds, 3600);
        assert_eq!(config.cache.sitemap_ttl_seconds, 21600);
        assert!(config.catalog_token().is_none());
    }

    #[test]
    fn test_save_and_load_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("etc").join("config.toml");

        let mut written = Config::default();
        written.catalog_api.token = Some("abc".to_string());
        written.server.port = 9090;
        written.cache.seo_ttl_seconds = 60;
        written.save(&config_path)?;

        let text = std::fs::read_to_string(&config_path)?;
        assert!(text.contains("[cache]"));

        let loaded = Config::from_file(&config_path)?;
        assert_eq!(loaded.catalog_token(), Some("abc"));
        assert_eq!(loaded.server.port, 9090);
        assert_eq!(loaded.catalog_api.base_url, written.catalog_api.base_url);
        assert_eq!(loaded.cache.seo_ttl_seconds, 60);
        assert!(loaded.revalidate_token().is_none());
        Ok(())
    }

    #[test]
    fn test_malformed_config_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[data\nroot_dir = 1")?;
        assert!(Config::from_file(&config_path).is_err());
        Ok(())
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.data.root_dir, "data");
    }

    #[test]
    fn test_optional_sections_default() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[data]
root_dir = "/srv/catalog"

[database]
path = "catalog.db"

[logging]
log_dir = "logs"
default_level = "debug"
console = true
file = false
json_format = false

[catalog_api]
base_url = "https://kodikapi.com"
timeout_seconds = 10
max_retries = 0
retry_delay_ms = 100
"#,
        )?;

        let config = Config::from_file(&config_path)?;
        assert_eq!(config.cache.seo_ttl_seconds, 3600);
        assert_eq!(config.server.port, 8080);
        assert!(config.revalidate_token().is_none());
        assert_eq!(config.database_path(), PathBuf::from("/srv/catalog/catalog.db"));
        Ok(())
    }

    #[test]
    fn test_env_fills_missing_secrets() {
        let mut config = Config::default();
        config.revalidation.token = Some(String::new());
        config.apply_env_with(|key| match key {
            CATALOG_TOKEN_ENV => Some("api-token".to_string()),
            REVALIDATE_TOKEN_ENV => Some("secret".to_string()),
            _ => None,
        });
        assert_eq!(config.catalog_token(), Some("api-token"));
        assert_eq!(config.revalidate_token(), Some("secret"));
    }

    #[test]
    fn test_env_does_not_override_file_secrets() {
        let mut config = Config::default();
        config.catalog_api.token = Some("from-file".to_string());
        config.apply_env_with(|_| Some("from-env".to_string()));
        assert_eq!(config.catalog_token(), Some("from-file"));
    }

    #[test]
    fn test_path_resolution() {
        let config = Config::default();

        let db_path = config.database_path();
        assert!(db_path.ends_with("data/catalog.db"));

        let log_dir = config.log_dir();
        assert!(log_dir.ends_with("data/logs"));

        let export = config.search_export_path();
        assert!(export.ends_with("data/search/animes.json"));
    }
}
