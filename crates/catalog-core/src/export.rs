//! Search-index export of the relational catalog.

use crate::error::{CatalogError, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::models::SearchDocument;
use shared::CatalogStore;
use tracing::info;

/// Attribute lists the search engine is configured with
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    pub primary_key: &'static str,
    pub searchable_attributes: Vec<&'static str>,
    pub filterable_attributes: Vec<&'static str>,
    pub sortable_attributes: Vec<&'static str>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            primary_key: "id",
            searchable_attributes: vec!["title", "description"],
            filterable_attributes: vec!["year", "kind", "status", "shikimoriId"],
            sortable_attributes: vec!["year", "id"],
        }
    }
}

/// Wrapper document written by the sync job
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchExport {
    pub index: String,
    pub exported_at: DateTime<Utc>,
    pub settings: IndexSettings,
    pub documents: Vec<SearchDocument>,
}

impl SearchExport {
    /// Snapshot every catalog row as a search document
    pub fn from_store(store: &CatalogStore, index: &str) -> Result<Self> {
        let documents = store.search_documents().map_err(CatalogError::store)?;
        info!(index = index, documents = documents.len(), "Built search export");

        Ok(Self {
            index: index.to_string(),
            exported_at: Utc::now(),
            settings: IndexSettings::default(),
            documents,
        })
    }

    /// Serialized wrapper document; failures carry the index name as context
    pub fn to_json(&self, pretty: bool) -> anyhow::Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        json.with_context(|| format!("Failed to serialize search export for index {}", self.index))
    }
}
