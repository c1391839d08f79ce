//! Homepage section aggregation and catalog views over the client.
//!
//! The homepage fans out four independent section fetches. A failing section
//! is logged and rendered empty so the other three still reach the page.

use crate::api::{Filters, KodikClient};
use crate::error::{CatalogError, Result};
use crate::normalize::{from_stored, normalize, normalize_details};
use shared::models::*;
use shared::CatalogStore;
use tracing::{debug, error, info, warn};

/// Static definition of one homepage section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpec {
    /// Cache key and payload key
    pub key: &'static str,
    pub title: &'static str,
    pub kind: SectionKind,
    pub limit: u32,
    /// Shikimori rating range such as `7-10`
    pub rating_range: Option<&'static str>,
    pub anime_status: Option<&'static str>,
    /// Upstream sort field and direction
    pub sort: Option<(&'static str, &'static str)>,
}

impl SectionSpec {
    /// Query filters for the `/list` request of this section
    pub fn filters(&self) -> Filters {
        let mut filters = Filters::new()
            .with("limit", self.limit)
            .with("with_material_data", true);

        if let Some(range) = self.rating_range {
            filters.set("shikimori_rating", range);
        }
        if let Some(status) = self.anime_status {
            filters.set("anime_status", status);
        }
        if let Some((field, order)) = self.sort {
            filters.set("sort", field);
            filters.set("order", order);
        }

        filters
    }
}

pub const HERO: SectionSpec = SectionSpec {
    key: "hero",
    title: "Hero",
    kind: SectionKind::Hero,
    limit: 5,
    rating_range: Some("7-10"),
    anime_status: Some("ongoing"),
    sort: None,
};

pub const TRENDING: SectionSpec = SectionSpec {
    key: "trending",
    title: "Trending now",
    kind: SectionKind::Carousel,
    limit: 10,
    rating_range: Some("7-10"),
    anime_status: None,
    sort: Some(("shikimori_rating", "desc")),
};

pub const POPULAR: SectionSpec = SectionSpec {
    key: "popular",
    title: "Popular",
    kind: SectionKind::Carousel,
    limit: 10,
    rating_range: None,
    anime_status: None,
    sort: Some(("views", "desc")),
};

pub const LATEST: SectionSpec = SectionSpec {
    key: "latest",
    title: "Latest updates",
    kind: SectionKind::Grid,
    limit: 10,
    rating_range: None,
    anime_status: None,
    sort: Some(("updated_at", "desc")),
};

/// Homepage sections in display order
pub const HOMEPAGE_SECTIONS: [SectionSpec; 4] = [HERO, TRENDING, POPULAR, LATEST];

/// Look up a homepage section by its key
pub fn section_spec(key: &str) -> Option<&'static SectionSpec> {
    HOMEPAGE_SECTIONS.iter().find(|spec| spec.key == key)
}

/// Split a `field.direction` sort key into upstream sort and order values
///
/// Known fields are mapped to their upstream names; anything else passes
/// through. A missing or blank direction means `desc`.
pub fn parse_sort_key(sort_key: &str) -> (String, String) {
    let (field, direction) = match sort_key.split_once('.') {
        Some((field, direction)) => (field.trim(), direction.trim()),
        None => (sort_key.trim(), ""),
    };

    let field = match field {
        "rating" => "shikimori_rating",
        "views" => "views",
        "updated" => "updated_at",
        "year" => "year",
        "" => "shikimori_rating",
        other => other,
    };
    let direction = if direction.is_empty() { "desc" } else { direction };

    (field.to_string(), direction.to_string())
}

/// Builds homepage sections, catalog pages and detail views
#[derive(Clone)]
pub struct SectionAggregator {
    client: KodikClient,
}

impl SectionAggregator {
    pub fn new(client: KodikClient) -> Self {
        Self { client }
    }

    /// The underlying client, for dictionary passthroughs
    pub fn client(&self) -> &KodikClient {
        &self.client
    }

    /// Fetch all four homepage sections concurrently
    ///
    /// Never fails: each section falls back to empty on its own.
    pub async fn build_homepage(&self) -> HomepagePayload {
        let (hero, trending, popular, latest_updates) = tokio::join!(
            self.build_section(&HERO),
            self.build_section(&TRENDING),
            self.build_section(&POPULAR),
            self.build_section(&LATEST),
        );

        let payload = HomepagePayload {
            hero,
            trending,
            popular,
            latest_updates,
        };

        info!(
            hero = payload.hero.items.len(),
            trending = payload.trending.items.len(),
            popular = payload.popular.items.len(),
            latest = payload.latest_updates.items.len(),
            "Built homepage"
        );
        payload
    }

    /// Fetch one section, downgrading any failure to an empty section
    pub async fn build_section(&self, spec: &SectionSpec) -> SectionPayload {
        match self.fetch_section(spec).await {
            Ok(section) => section,
            Err(e @ CatalogError::Configuration(_)) => {
                error!(section = spec.key, error = %e, "Section fetch misconfigured");
                SectionPayload::empty(spec.key, spec.title, spec.kind)
            }
            Err(e) => {
                warn!(section = spec.key, error = %e, "Section fetch failed, rendering empty");
                SectionPayload::empty(spec.key, spec.title, spec.kind)
            }
        }
    }

    async fn fetch_section(&self, spec: &SectionSpec) -> Result<SectionPayload> {
        let response = self.client.list(&spec.filters()).await?;
        let items: Vec<CanonicalAnime> = response.results.iter().map(normalize).collect();
        debug!(section = spec.key, items = items.len(), "Fetched section");

        Ok(SectionPayload {
            key: spec.key.to_string(),
            title: spec.title.to_string(),
            kind: spec.kind,
            items,
        })
    }

    /// One page of the sorted catalog listing
    ///
    /// `page` is 1-based; 0 is read as 1. A zero `limit` yields an empty page
    /// without touching the network.
    pub async fn build_catalog_page(&self, page: u64, limit: u32, sort_key: &str) -> Result<CatalogPage> {
        if limit == 0 {
            return Ok(CatalogPage {
                items: Vec::new(),
                total: 0,
                total_pages: 0,
            });
        }

        let page = page.max(1);
        let (sort, order) = parse_sort_key(sort_key);
        let offset = (page - 1).saturating_mul(u64::from(limit));

        let filters = Filters::new()
            .with("limit", limit)
            .with("offset", offset)
            .with("sort", sort)
            .with("order", order)
            .with("with_material_data", true);

        let response = self.client.list(&filters).await?;
        let items: Vec<CanonicalAnime> = response.results.iter().map(normalize).collect();
        let total_pages = response.total.div_ceil(u64::from(limit));

        debug!(
            page = page,
            limit = limit,
            total = response.total,
            total_pages = total_pages,
            "Built catalog page"
        );

        Ok(CatalogPage {
            items,
            total: response.total,
            total_pages,
        })
    }

    /// Detail view for one catalog id, `None` when the catalog has no such item
    ///
    /// Upstream failures read as "not found"; a missing credential does not.
    pub async fn anime_details(&self, id: &str) -> Result<Option<CanonicalAnimeDetails>> {
        let filters = Filters::new()
            .with("id", id)
            .with("with_material_data", true)
            .with("with_seasons", true)
            .with("with_episodes", true);

        match self.client.list(&filters).await {
            Ok(response) => Ok(response.results.first().map(normalize_details)),
            Err(e) if e.is_upstream() => {
                warn!(id = id, error = %e, "Detail fetch failed, treating as not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Title search; blank queries return nothing without a request
    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<CanonicalAnime>> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        match self.client.search(query, limit).await {
            Ok(response) => Ok(response.results.iter().map(normalize).collect()),
            Err(e) if e.is_upstream() => {
                warn!(query = query, error = %e, "Search failed, returning no results");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// Curated homepage sections from the section configuration table
///
/// Items keep their configured order; ids missing from the catalog are skipped.
pub fn build_curated_sections(store: &CatalogStore) -> Result<Vec<SectionPayload>> {
    let definitions = store.list_sections().map_err(CatalogError::store)?;
    let mut sections = Vec::with_capacity(definitions.len());

    for definition in definitions {
        let rows = store
            .fetch_by_ids(&definition.anime_ids)
            .map_err(CatalogError::store)?;

        if rows.len() < definition.anime_ids.len() {
            debug!(
                section = %definition.section_key,
                configured = definition.anime_ids.len(),
                found = rows.len(),
                "Skipping curated ids missing from the catalog"
            );
        }

        sections.push(SectionPayload {
            key: definition.section_key,
            title: definition.title,
            kind: definition.kind,
            items: rows.iter().map(from_stored).collect(),
        });
    }

    Ok(sections)
}
