//! Data models for the catalog.
//!
//! This module defines the canonical anime entity every downstream consumer
//! works with, the composite homepage payloads built from it, and the flat
//! records read from the relational store (SEO metadata, sitemap ids, search
//! index documents).

use serde::{Deserialize, Serialize};

/// Poster used when neither the material data nor the screenshots carry an image
pub const PLACEHOLDER_POSTER: &str = "/placeholder.jpg";

/// Description used when the upstream record has none
pub const PLACEHOLDER_DESCRIPTION: &str = "Описание отсутствует.";

/// Title used when the upstream record has no usable title at all
pub const UNTITLED: &str = "Untitled";

/// Title in the two languages the catalog displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimeTitle {
    /// Primary (Russian) title
    pub ru: String,
    /// Secondary (English) title, equal to the primary one when unknown
    pub en: String,
}

/// Normalized, source-agnostic catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalAnime {
    pub id: String,
    pub title: AnimeTitle,
    pub poster_url: String,
    pub description: String,
    pub genres: Vec<String>,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    pub episode_count: Option<u32>,
    pub status: Option<String>,  // ongoing, released, anons
    pub kind: Option<String>,    // tv, movie, ova, ona, special
    pub minimum_age: Option<u32>,
    pub shikimori_id: Option<String>,
    pub screenshots: Vec<String>,
}

/// Canonical entity extended with what the single-item detail page needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalAnimeDetails {
    #[serde(flatten)]
    pub anime: CanonicalAnime,
    /// Season number -> episode map, passed through as returned upstream
    pub seasons: serde_json::Map<String, serde_json::Value>,
    pub player_link: String,
}

/// Presentation type of a homepage section
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Hero,
    Carousel,
    Grid,
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionKind::Hero => write!(f, "hero"),
            SectionKind::Carousel => write!(f, "carousel"),
            SectionKind::Grid => write!(f, "grid"),
        }
    }
}

impl std::str::FromStr for SectionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hero" => Ok(SectionKind::Hero),
            "carousel" => Ok(SectionKind::Carousel),
            "grid" => Ok(SectionKind::Grid),
            _ => Err(anyhow::anyhow!("Invalid section kind: {}", s)),
        }
    }
}

/// A named, ordered list of catalog items for homepage display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionPayload {
    pub key: String,
    pub title: String,
    pub kind: SectionKind,
    pub items: Vec<CanonicalAnime>,
}

impl SectionPayload {
    /// Section with no items, used when its fetch failed
    pub fn empty(key: &str, title: &str, kind: SectionKind) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            kind,
            items: Vec::new(),
        }
    }
}

/// Composite homepage; every section is always present, possibly empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomepagePayload {
    pub hero: SectionPayload,
    pub trending: SectionPayload,
    pub popular: SectionPayload,
    pub latest_updates: SectionPayload,
}

impl HomepagePayload {
    /// Sections in display order
    pub fn sections(&self) -> [&SectionPayload; 4] {
        [&self.hero, &self.trending, &self.popular, &self.latest_updates]
    }

    pub fn is_empty(&self) -> bool {
        self.sections().iter().all(|s| s.items.is_empty())
    }
}

/// One page of the catalog listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
    pub items: Vec<CanonicalAnime>,
    pub total: u64,
    pub total_pages: u64,
}

/// Per-item metadata used for page titles and social previews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoRecord {
    pub shikimori_id: String,
    pub title: String,
    pub description: Option<String>,
    pub poster_url: Option<String>,
}

/// Flat record consumed by the search-index sync job, unique by `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocument {
    pub id: i64,
    pub title: String,
    pub poster_url: Option<String>,
    pub year: Option<i32>,
    pub shikimori_id: Option<String>,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
}

/// Row of the catalog table in the relational store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnime {
    pub id: i64,
    pub shikimori_id: Option<String>,
    pub title: String,
    pub title_orig: Option<String>,
    pub description: Option<String>,
    pub poster_url: Option<String>,
    pub year: Option<i32>,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub episodes_count: Option<u32>,
    pub shikimori_rating: Option<f64>,
    pub shikimori_votes: Option<u32>,
    pub updated_at: Option<String>,
}

/// Row of the homepage section configuration table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDefinition {
    pub position: i64,
    pub section_key: String,
    pub title: String,
    pub kind: SectionKind,
    /// Catalog ids in display order
    pub anime_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CanonicalAnime {
        CanonicalAnime {
            id: "serial-1".to_string(),
            title: AnimeTitle {
                ru: "Тест".to_string(),
                en: "Test".to_string(),
            },
            poster_url: PLACEHOLDER_POSTER.to_string(),
            description: PLACEHOLDER_DESCRIPTION.to_string(),
            genres: vec![],
            year: Some(2020),
            rating: None,
            episode_count: Some(12),
            status: None,
            kind: Some("tv".to_string()),
            minimum_age: None,
            shikimori_id: None,
            screenshots: vec![],
        }
    }

    #[test]
    fn test_canonical_anime_uses_camel_case() {
        let value = serde_json::to_value(sample()).unwrap();
        assert!(value.get("posterUrl").is_some());
        assert!(value.get("episodeCount").is_some());
        assert!(value.get("minimumAge").is_some());
        assert_eq!(value["title"]["en"], "Test");
    }

    #[test]
    fn test_details_flatten_base_fields() {
        let details = CanonicalAnimeDetails {
            anime: sample(),
            seasons: serde_json::Map::new(),
            player_link: "https://kodik.info/serial/1".to_string(),
        };
        let value = serde_json::to_value(&details).unwrap();
        assert_eq!(value["id"], "serial-1");
        assert_eq!(value["playerLink"], "https://kodik.info/serial/1");
    }

    #[test]
    fn test_section_kind_round_trip() {
        for kind in [SectionKind::Hero, SectionKind::Carousel, SectionKind::Grid] {
            let parsed: SectionKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("banner".parse::<SectionKind>().is_err());
    }

    #[test]
    fn test_homepage_payload_keys() {
        let payload = HomepagePayload {
            hero: SectionPayload::empty("hero", "Hero", SectionKind::Hero),
            trending: SectionPayload::empty("trending", "Trending now", SectionKind::Carousel),
            popular: SectionPayload::empty("popular", "Popular", SectionKind::Carousel),
            latest_updates: SectionPayload::empty("latest", "Latest updates", SectionKind::Grid),
        };
        assert!(payload.is_empty());

        let value = serde_json::to_value(&payload).unwrap();
        for key in ["hero", "trending", "popular", "latestUpdates"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
