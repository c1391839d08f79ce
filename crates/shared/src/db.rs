//! SQLite access for the catalog read model.
//!
//! Rows are written by the ingestion jobs. The services open the same file,
//! add any tables an older file lacks, and only read afterwards.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = include_str!("../schema.sql");

/// Tables the catalog services read from
const REQUIRED_TABLES: &[&str] = &["animes", "homepage_sections"];

/// Owned SQLite connection with the catalog schema in place
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the catalog file, creating it and its parent directory if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening database");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::prepare(conn)
    }

    /// Private in-memory database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::prepare(conn)
    }

    fn prepare(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("Failed to enable foreign keys")?;

        let db = Self { conn };
        db.ensure_schema()?;
        Ok(db)
    }

    /// Apply the schema when any required table is absent.
    ///
    /// The schema only uses `IF NOT EXISTS`, so tables written by the
    /// ingestion jobs are left untouched.
    fn ensure_schema(&self) -> Result<()> {
        let missing = self.missing_tables()?;
        if missing.is_empty() {
            debug!("Catalog schema present");
            return Ok(());
        }

        info!(tables = ?missing, "Creating missing catalog tables");
        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to create database schema")?;
        Ok(())
    }

    fn missing_tables(&self) -> Result<Vec<&'static str>> {
        let mut missing = Vec::new();
        for table in REQUIRED_TABLES {
            if !self.table_exists(table)? {
                missing.push(*table);
            }
        }
        Ok(missing)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Whether `table_name` exists in the main schema
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let found: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(found != 0)
    }
}
