//! Catalog core: the third-party catalog client and everything built on it.
//!
//! - `api`: typed client for the streaming-catalog API
//! - `normalize`: mapping of raw records onto the canonical entity
//! - `aggregator`: homepage sections, catalog pages, details and search
//! - `cache`, `catalog_cache`: single-flight TTL caching of those reads
//! - `revalidate`: authenticated purge of the homepage caches
//! - `export`: search-index export of the relational catalog

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod catalog_cache;
pub mod error;
pub mod export;
pub mod normalize;
pub mod revalidate;

#[cfg(test)]
mod testing;

pub use aggregator::{build_curated_sections, SectionAggregator, SectionSpec, HOMEPAGE_SECTIONS};
pub use api::{HttpTransport, KodikClient, Transport, TransportResponse};
pub use cache::{CacheStats, Clock, SystemClock, TtlCache};
pub use catalog_cache::{read_store, CatalogCache, CatalogCacheStats};
pub use error::{CatalogError, Result};
pub use export::{IndexSettings, SearchExport};
pub use revalidate::{Revalidator, HOMEPAGE_CACHE_KEYS};
