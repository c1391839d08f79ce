//! Pieces every catalog service links against: settings, tracing setup, the
//! SQLite read model and the wire models.

pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod store;

pub use config::Config;
pub use db::Database;
pub use logging::LogConfig;
pub use models::*;
pub use store::CatalogStore;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
