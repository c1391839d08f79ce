//! Read model over the catalog tables.
//!
//! The catalog services treat the relational store as an external collaborator:
//! everything here is a read except the upserts used by seeding and tests.

use crate::models::*;
use crate::Database;
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const ANIME_COLUMNS: &str = "id, shikimori_id, title, title_orig, description, poster_url, year, \
     kind, status, episodes_count, shikimori_rating, shikimori_votes, updated_at";

/// Thread-safe handle to the catalog tables
pub struct CatalogStore {
    db: Mutex<Database>,
}

impl CatalogStore {
    /// Create a new store over the given database
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("Catalog store lock poisoned"))
    }

    /// Insert or replace a catalog row
    pub fn upsert_anime(&self, anime: &StoredAnime) -> Result<()> {
        let db = self.lock()?;
        db.conn()
            .execute(
                "INSERT OR REPLACE INTO animes (
                    id, shikimori_id, title, title_orig, description, poster_url, year,
                    kind, status, episodes_count, shikimori_rating, shikimori_votes, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    anime.id,
                    anime.shikimori_id,
                    anime.title,
                    anime.title_orig,
                    anime.description,
                    anime.poster_url,
                    anime.year,
                    anime.kind,
                    anime.status,
                    anime.episodes_count,
                    anime.shikimori_rating,
                    anime.shikimori_votes,
                    anime.updated_at,
                ],
            )
            .with_context(|| format!("Failed to upsert anime {}", anime.id))?;

        debug!(id = anime.id, title = %anime.title, "Upserted anime");
        Ok(())
    }

    /// Insert or replace a homepage section definition
    pub fn save_section(&self, section: &SectionDefinition) -> Result<()> {
        let db = self.lock()?;
        db.conn()
            .execute(
                "INSERT OR REPLACE INTO homepage_sections (position, section_key, title, kind, anime_ids)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    section.position,
                    section.section_key,
                    section.title,
                    section.kind.to_string(),
                    serde_json::to_string(&section.anime_ids)?,
                ],
            )
            .with_context(|| format!("Failed to save section {}", section.section_key))?;

        info!(section = %section.section_key, items = section.anime_ids.len(), "Saved homepage section");
        Ok(())
    }

    /// Fetch catalog rows for the given ids, in the order the ids were given
    ///
    /// Ids without a row are skipped.
    pub fn fetch_by_ids(&self, ids: &[i64]) -> Result<Vec<StoredAnime>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let db = self.lock()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT {ANIME_COLUMNS} FROM animes WHERE id IN ({placeholders})");

        let mut stmt = db.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), row_to_anime)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to fetch anime by ids")?;

        let mut by_id: HashMap<i64, StoredAnime> = rows.into_iter().map(|a| (a.id, a)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Homepage section definitions ordered by position
    pub fn list_sections(&self) -> Result<Vec<SectionDefinition>> {
        let db = self.lock()?;
        let mut stmt = db.conn().prepare(
            "SELECT position, section_key, title, kind, anime_ids
             FROM homepage_sections ORDER BY position ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut sections = Vec::new();
        for row in rows {
            let (position, section_key, title, kind, anime_ids) = row?;
            sections.push(SectionDefinition {
                position,
                kind: kind.parse()?,
                anime_ids: serde_json::from_str(&anime_ids).with_context(|| {
                    format!("Invalid anime id list for section {}", section_key)
                })?,
                section_key,
                title,
            });
        }

        Ok(sections)
    }

    /// SEO metadata for a single item, `None` when unknown or id is empty
    pub fn seo_record(&self, shikimori_id: &str) -> Result<Option<SeoRecord>> {
        if shikimori_id.is_empty() {
            return Ok(None);
        }

        let db = self.lock()?;
        db.conn()
            .query_row(
                "SELECT shikimori_id, title, description, poster_url
                 FROM animes WHERE shikimori_id = ?1",
                params![shikimori_id],
                |row| {
                    Ok(SeoRecord {
                        shikimori_id: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                        poster_url: row.get(3)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("Failed to load SEO record for {}", shikimori_id))
    }

    /// All non-empty shikimori ids, newest catalog rows first
    pub fn sitemap_ids(&self) -> Result<Vec<String>> {
        let db = self.lock()?;
        let mut stmt = db.conn().prepare(
            "SELECT shikimori_id FROM animes
             WHERE shikimori_id IS NOT NULL AND shikimori_id != ''
             ORDER BY id DESC",
        )?;

        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load sitemap ids")?;

        debug!(count = ids.len(), "Loaded sitemap ids");
        Ok(ids)
    }

    /// Flat records for the search index, unique by id
    pub fn search_documents(&self) -> Result<Vec<SearchDocument>> {
        let db = self.lock()?;
        let mut stmt = db.conn().prepare(
            "SELECT id, title, poster_url, year, shikimori_id, kind, status, description
             FROM animes ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(SearchDocument {
                id: row.get(0)?,
                title: row.get(1)?,
                poster_url: row.get(2)?,
                year: row.get(3)?,
                shikimori_id: row.get(4)?,
                kind: row.get(5)?,
                status: row.get(6)?,
                description: row.get(7)?,
            })
        })?;

        let mut seen = HashSet::new();
        let mut documents = Vec::new();
        for row in rows {
            let document = row.context("Failed to read search document")?;
            if seen.insert(document.id) {
                documents.push(document);
            }
        }

        Ok(documents)
    }

    /// Number of catalog rows
    pub fn count(&self) -> Result<u64> {
        let db = self.lock()?;
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM animes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Helper: Convert a database row to a StoredAnime
fn row_to_anime(row: &rusqlite::Row) -> rusqlite::Result<StoredAnime> {
    Ok(StoredAnime {
        id: row.get(0)?,
        shikimori_id: row.get(1)?,
        title: row.get(2)?,
        title_orig: row.get(3)?,
        description: row.get(4)?,
        poster_url: row.get(5)?,
        year: row.get(6)?,
        kind: row.get(7)?,
        status: row.get(8)?,
        episodes_count: row.get::<_, Option<i64>>(9)?.and_then(|x| u32::try_from(x).ok()),
        shikimori_rating: row.get(10)?,
        shikimori_votes: row.get::<_, Option<i64>>(11)?.and_then(|x| u32::try_from(x).ok()),
        updated_at: row.get(12)?,
    })
}
