//! Process-wide cache over homepage sections, SEO records and sitemap ids.

use crate::aggregator::{section_spec, SectionAggregator};
use crate::cache::{CacheStats, Clock, SystemClock, TtlCache};
use crate::error::{CatalogError, Result};
use serde::Serialize;
use shared::config::CacheConfig;
use shared::models::{HomepagePayload, SectionPayload, SeoRecord};
use shared::CatalogStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Cache key of the composite homepage payload
pub const HOMEPAGE_KEY: &str = "homepage";

/// Cache key of the sitemap id list
pub const SITEMAP_KEY: &str = "sitemap-ids";

/// Statistics for every cache held by `CatalogCache`
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogCacheStats {
    pub homepage: CacheStats,
    pub sections: CacheStats,
    pub seo: CacheStats,
    pub sitemap: CacheStats,
}

/// Typed caches for the catalog reads, constructed once and shared
pub struct CatalogCache {
    homepage: TtlCache<Arc<HomepagePayload>>,
    sections: TtlCache<SectionPayload>,
    seo: TtlCache<Option<SeoRecord>>,
    sitemap: TtlCache<Arc<Vec<String>>>,
}

impl CatalogCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let homepage_ttl = Duration::from_secs(config.homepage_ttl_seconds);
        Self {
            homepage: TtlCache::with_clock("homepage", homepage_ttl, clock.clone()),
            sections: TtlCache::with_clock("sections", homepage_ttl, clock.clone()),
            seo: TtlCache::with_clock("seo", Duration::from_secs(config.seo_ttl_seconds), clock.clone()),
            sitemap: TtlCache::with_clock(
                "sitemap",
                Duration::from_secs(config.sitemap_ttl_seconds),
                clock,
            ),
        }
    }

    /// Composite homepage, built by the aggregator on a miss
    pub async fn homepage(&self, aggregator: &SectionAggregator) -> Result<Arc<HomepagePayload>> {
        let aggregator = aggregator.clone();
        self.homepage
            .get_or_compute(HOMEPAGE_KEY, move || async move {
                Ok(Arc::new(aggregator.build_homepage().await))
            })
            .await
    }

    /// One homepage section by key (`hero`, `trending`, `popular`, `latest`)
    pub async fn section(&self, aggregator: &SectionAggregator, key: &str) -> Result<SectionPayload> {
        let spec = section_spec(key)
            .ok_or_else(|| CatalogError::NotFound(format!("unknown homepage section {}", key)))?;
        let aggregator = aggregator.clone();
        self.sections
            .get_or_compute(spec.key, move || async move { Ok(aggregator.build_section(spec).await) })
            .await
    }

    /// SEO metadata for one item; unknown ids are cached as `None` too
    pub async fn seo(&self, store: &Arc<CatalogStore>, shikimori_id: &str) -> Result<Option<SeoRecord>> {
        let store = store.clone();
        let id = shikimori_id.to_string();
        self.seo
            .get_or_compute(&format!("seo:{}", shikimori_id), move || {
                read_store(move || store.seo_record(&id))
            })
            .await
    }

    /// Every non-empty shikimori id, newest first
    pub async fn sitemap_ids(&self, store: &Arc<CatalogStore>) -> Result<Arc<Vec<String>>> {
        let store = store.clone();
        self.sitemap
            .get_or_compute(SITEMAP_KEY, move || async move {
                read_store(move || store.sitemap_ids()).await.map(Arc::new)
            })
            .await
    }

    /// Drop `keys` from every cache; returns the keys that were present or in flight
    pub fn invalidate<I, S>(&self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed = Vec::new();
        for key in keys {
            let key = key.as_ref();
            let hit = !self.homepage.invalidate([key]).is_empty()
                | !self.sections.invalidate([key]).is_empty()
                | !self.seo.invalidate([key]).is_empty()
                | !self.sitemap.invalidate([key]).is_empty();
            if hit {
                removed.push(key.to_string());
            }
        }

        info!(removed = ?removed, "Cache invalidated");
        removed
    }

    pub fn stats(&self) -> CatalogCacheStats {
        CatalogCacheStats {
            homepage: self.homepage.stats(),
            sections: self.sections.stats(),
            seo: self.seo.stats(),
            sitemap: self.sitemap.stats(),
        }
    }
}

/// Run a synchronous store read on the blocking pool
///
/// `CatalogStore` serializes access behind a mutex and rusqlite blocks, so no
/// store call may run on an executor thread.
pub async fn read_store<T, E, F>(read: F) -> Result<T>
where
    T: Send + 'static,
    E: Into<CatalogError> + Send + 'static,
    F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
{
    tokio::task::spawn_blocking(read)
        .await
        .map_err(|e| CatalogError::Store(format!("store task failed: {}", e)))?
        .map_err(Into::into)
}
