//! Mapping of raw catalog records onto the canonical entity.
//!
//! Every function here is total: a missing or mistyped field degrades to its
//! fallback instead of failing. Canonical output fed back in (camelCase keys)
//! normalizes to an equal entity.

use serde_json::{Map, Value};
use shared::models::*;
use url::Url;

/// Host every Shikimori image is rewritten to
const SHIKIMORI_HOST: &str = "shiki.one";

static NULL: Value = Value::Null;

/// Map one raw catalog record onto the canonical entity
pub fn normalize(raw: &Value) -> CanonicalAnime {
    let material = raw.get("material_data").unwrap_or(&NULL);
    let pick = |upstream: &Value, upstream_key: &str, canonical_key: &str| {
        upstream
            .get(upstream_key)
            .filter(|v| !v.is_null())
            .or_else(|| raw.get(canonical_key))
            .cloned()
            .unwrap_or(Value::Null)
    };

    let screenshots = string_list(raw.get("screenshots"))
        .or_else(|| string_list(material.get("screenshots")))
        .unwrap_or_default();

    CanonicalAnime {
        id: text(raw.get("id")).unwrap_or_default(),
        title: title(raw, material),
        poster_url: poster(raw, material, &screenshots),
        description: text(material.get("description"))
            .or_else(|| text(raw.get("description")))
            .unwrap_or_else(|| PLACEHOLDER_DESCRIPTION.to_string()),
        genres: string_list(material.get("genres"))
            .or_else(|| string_list(raw.get("genres")))
            .unwrap_or_default(),
        year: positive_int(&pick(material, "year", "year"))
            .or_else(|| positive_int(raw.get("year").unwrap_or(&NULL)))
            .and_then(|y| i32::try_from(y).ok()),
        rating: positive_float(&pick(material, "shikimori_rating", "rating")),
        episode_count: positive_int(&pick(material, "episodes_total", "episodeCount"))
            .and_then(|e| u32::try_from(e).ok()),
        status: text(material.get("anime_status")).or_else(|| text(raw.get("status"))),
        kind: text(material.get("anime_kind"))
            .or_else(|| text(material.get("anime_type")))
            .or_else(|| text(raw.get("kind"))),
        minimum_age: positive_int(&pick(material, "minimal_age", "minimumAge"))
            .and_then(|a| u32::try_from(a).ok()),
        shikimori_id: text(raw.get("shikimori_id"))
            .or_else(|| text(material.get("shikimori_id")))
            .or_else(|| text(raw.get("shikimoriId"))),
        screenshots,
    }
}

/// Canonical entity plus the season map and player link of the detail page
pub fn normalize_details(raw: &Value) -> CanonicalAnimeDetails {
    let seasons = raw
        .get("seasons")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);

    let player_link = text(raw.get("link"))
        .or_else(|| text(raw.get("playerLink")))
        .map(|link| {
            if link.starts_with("//") {
                format!("https:{}", link)
            } else {
                link
            }
        })
        .unwrap_or_default();

    CanonicalAnimeDetails {
        anime: normalize(raw),
        seasons,
        player_link,
    }
}

/// Canonical entity for a row of the relational catalog table
pub fn from_stored(row: &StoredAnime) -> CanonicalAnime {
    let primary = non_blank(&row.title).unwrap_or_else(|| UNTITLED.to_string());
    let secondary = row
        .title_orig
        .as_deref()
        .and_then(non_blank)
        .unwrap_or_else(|| primary.clone());

    CanonicalAnime {
        id: row.id.to_string(),
        title: AnimeTitle {
            ru: primary,
            en: secondary,
        },
        poster_url: row
            .poster_url
            .as_deref()
            .and_then(normalize_image_url)
            .unwrap_or_else(|| PLACEHOLDER_POSTER.to_string()),
        description: row
            .description
            .as_deref()
            .and_then(non_blank)
            .unwrap_or_else(|| PLACEHOLDER_DESCRIPTION.to_string()),
        genres: Vec::new(),
        year: row.year.filter(|y| *y > 0),
        rating: row.shikimori_rating.filter(|r| *r > 0.0),
        episode_count: row.episodes_count.filter(|e| *e > 0),
        status: row.status.as_deref().and_then(non_blank),
        kind: row.kind.as_deref().and_then(non_blank),
        minimum_age: None,
        shikimori_id: row.shikimori_id.as_deref().and_then(non_blank),
        screenshots: Vec::new(),
    }
}

/// Canonicalize an image URL, moving Shikimori mirrors onto one host
///
/// Returns `None` for blank or unparsable input. Non-Shikimori hosts keep
/// their URL as parsed.
pub fn normalize_image_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    let absolute = if trimmed.starts_with("//") {
        format!("https:{}", trimmed)
    } else if trimmed.starts_with('/') {
        format!("https://{}{}", SHIKIMORI_HOST, trimmed)
    } else {
        trimmed.to_string()
    };

    let mut parsed = Url::parse(&absolute).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let is_shikimori = host == "shikimori.one"
        || host.ends_with(".shikimori.one")
        || host.ends_with(&format!(".{}", SHIKIMORI_HOST));

    if is_shikimori {
        parsed.set_host(Some(SHIKIMORI_HOST)).ok()?;
    }

    Some(parsed.to_string())
}

fn title(raw: &Value, material: &Value) -> AnimeTitle {
    if let Some(existing) = raw.get("title").filter(|t| t.is_object()) {
        let ru = text(existing.get("ru")).unwrap_or_else(|| UNTITLED.to_string());
        let en = text(existing.get("en")).unwrap_or_else(|| ru.clone());
        return AnimeTitle { ru, en };
    }

    let ru = text(raw.get("title"))
        .or_else(|| text(material.get("anime_title")))
        .or_else(|| text(raw.get("title_orig")))
        .unwrap_or_else(|| UNTITLED.to_string());
    let en = text(material.get("title_en")).unwrap_or_else(|| ru.clone());
    AnimeTitle { ru, en }
}

fn poster(raw: &Value, material: &Value, screenshots: &[String]) -> String {
    let candidates = [
        text(material.get("poster_url")),
        text(raw.get("posterUrl")).filter(|p| p != PLACEHOLDER_POSTER),
        screenshots.first().cloned(),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| normalize_image_url(&candidate))
        .unwrap_or_else(|| PLACEHOLDER_POSTER.to_string())
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Non-blank string, or a number rendered as one
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_blank(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| item.as_str().and_then(non_blank))
            .collect(),
    )
}

/// Positive integer from a number or a numeric string; zero means unknown
fn positive_int(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    (number > 0).then_some(number)
}

/// Positive float from a number or a numeric string; zero means unrated
fn positive_float(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (number.is_finite() && number > 0.0).then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_record() -> Value {
        json!({
            "id": "serial-45134",
            "type": "anime-serial",
            "link": "//kodik.info/serial/45134/abc/720p",
            "title": "Магическая битва",
            "title_orig": "Jujutsu Kaisen",
            "year": 2020,
            "shikimori_id": "40748",
            "screenshots": ["https://i.kodik.biz/screenshots/1.jpg"],
            "seasons": { "1": { "link": "//kodik.info/season/1" } },
            "material_data": {
                "title_en": "Jujutsu Kaisen",
                "poster_url": "https://dere.shikimori.one/uploads/poster/animes/40748/x.jpeg?v=1",
                "description": "Юдзи Итадори...",
                "genres": ["экшен", "сёнэн"],
                "year": 2020,
                "shikimori_rating": 8.5,
                "episodes_total": 24,
                "anime_status": "released",
                "anime_kind": "tv",
                "minimal_age": 16
            }
        })
    }

    #[test]
    fn test_full_record() {
        let anime = normalize(&full_record());
        assert_eq!(anime.id, "serial-45134");
        assert_eq!(anime.title.ru, "Магическая битва");
        assert_eq!(anime.title.en, "Jujutsu Kaisen");
        assert_eq!(
            anime.poster_url,
            "https://shiki.one/uploads/poster/animes/40748/x.jpeg?v=1"
        );
        assert_eq!(anime.genres, vec!["экшен", "сёнэн"]);
        assert_eq!(anime.year, Some(2020));
        assert_eq!(anime.rating, Some(8.5));
        assert_eq!(anime.episode_count, Some(24));
        assert_eq!(anime.status.as_deref(), Some("released"));
        assert_eq!(anime.kind.as_deref(), Some("tv"));
        assert_eq!(anime.minimum_age, Some(16));
        assert_eq!(anime.shikimori_id.as_deref(), Some("40748"));
        assert_eq!(anime.screenshots.len(), 1);
    }

    #[test]
    fn test_fallbacks_for_empty_record() {
        for raw in [json!({}), json!(null), json!([]), json!("text"), json!({ "material_data": 7 })] {
            let anime = normalize(&raw);
            assert_eq!(anime.id, "");
            assert_eq!(anime.title.ru, UNTITLED);
            assert_eq!(anime.title.en, UNTITLED);
            assert_eq!(anime.poster_url, PLACEHOLDER_POSTER);
            assert_eq!(anime.description, PLACEHOLDER_DESCRIPTION);
            assert!(anime.genres.is_empty());
            assert_eq!(anime.year, None);
            assert_eq!(anime.rating, None);
            assert_eq!(anime.episode_count, None);
            assert_eq!(anime.status, None);
            assert_eq!(anime.kind, None);
            assert_eq!(anime.minimum_age, None);
            assert!(anime.screenshots.is_empty());
        }
    }

    #[test]
    fn test_mistyped_fields_degrade() {
        let raw = json!({
            "id": 42,
            "title": "  ",
            "title_orig": "Original",
            "screenshots": "not-a-list",
            "material_data": {
                "poster_url": "not a valid url",
                "genres": ["ok", 3, null, ""],
                "year": "2019",
                "shikimori_rating": "0",
                "episodes_total": -1,
                "minimal_age": { "nested": true }
            }
        });

        let anime = normalize(&raw);
        assert_eq!(anime.id, "42");
        assert_eq!(anime.title.ru, "Original");
        assert_eq!(anime.title.en, "Original");
        assert_eq!(anime.poster_url, PLACEHOLDER_POSTER);
        assert_eq!(anime.genres, vec!["ok"]);
        assert_eq!(anime.year, Some(2019));
        assert_eq!(anime.rating, None);
        assert_eq!(anime.episode_count, None);
        assert_eq!(anime.minimum_age, None);
    }

    #[test]
    fn test_poster_falls_back_to_screenshot() {
        let raw = json!({
            "id": "movie-1",
            "title": "Фильм",
            "screenshots": ["//i.kodik.biz/1.jpg", "https://i.kodik.biz/2.jpg"]
        });
        assert_eq!(normalize(&raw).poster_url, "https://i.kodik.biz/1.jpg");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let oversized = json!({
            "material_data": { "year": 3000000000u64, "minimal_age": 4294967296u64, "episodes_total": 5000000000u64 }
        });
        for raw in [
            full_record(),
            json!({}),
            json!({ "id": "x", "title": "Т", "screenshots": ["bad url"] }),
            oversized,
        ] {
            let first = normalize(&raw);
            let reserialized = serde_json::to_value(&first).unwrap();
            let second = normalize(&reserialized);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_out_of_range_integers_fall_back() {
        let anime = normalize(&json!({
            "material_data": { "year": 3000000000u64, "minimal_age": 4294967296u64, "episodes_total": 12 }
        }));
        assert_eq!(anime.year, None);
        assert_eq!(anime.minimum_age, None);
        assert_eq!(anime.episode_count, Some(12));
    }

    #[test]
    fn test_details() {
        let details = normalize_details(&full_record());
        assert_eq!(details.anime.id, "serial-45134");
        assert_eq!(details.player_link, "https://kodik.info/serial/45134/abc/720p");
        assert!(details.seasons.contains_key("1"));

        let reserialized = serde_json::to_value(&details).unwrap();
        assert_eq!(normalize_details(&reserialized), details);

        let bare = normalize_details(&json!({ "id": "x" }));
        assert!(bare.seasons.is_empty());
        assert_eq!(bare.player_link, "");
    }

    #[test]
    fn test_from_stored() {
        let row = StoredAnime {
            id: 7,
            shikimori_id: Some("5114".to_string()),
            title: "Стальной алхимик".to_string(),
            title_orig: Some("Fullmetal Alchemist".to_string()),
            description: None,
            poster_url: Some("/system/animes/original/5114.jpg".to_string()),
            year: Some(2009),
            kind: Some("tv".to_string()),
            status: Some("released".to_string()),
            episodes_count: Some(64),
            shikimori_rating: Some(9.1),
            shikimori_votes: Some(200_000),
            updated_at: None,
        };

        let anime = from_stored(&row);
        assert_eq!(anime.id, "7");
        assert_eq!(anime.title.en, "Fullmetal Alchemist");
        assert_eq!(anime.poster_url, "https://shiki.one/system/animes/original/5114.jpg");
        assert_eq!(anime.description, PLACEHOLDER_DESCRIPTION);
        assert_eq!(anime.episode_count, Some(64));
    }

    #[test]
    fn test_image_url_canonicalization() {
        let cases = [
            (
                "https://nyaa.shikimori.one/uploads/poster/animes/11757/x.jpeg",
                Some("https://shiki.one/uploads/poster/animes/11757/x.jpeg"),
            ),
            (
                "/uploads/poster/animes/199/x.jpeg",
                Some("https://shiki.one/uploads/poster/animes/199/x.jpeg"),
            ),
            (
                "//shiki.one/uploads/poster/animes/199/x.jpeg",
                Some("https://shiki.one/uploads/poster/animes/199/x.jpeg"),
            ),
            ("https://example.com/image.jpg", Some("https://example.com/image.jpg")),
            (
                "https://nyaa.shikimori.one/uploads/x.jpeg?version=1&size=large",
                Some("https://shiki.one/uploads/x.jpeg?version=1&size=large"),
            ),
            (
                "  https://shikimori.one/uploads/poster/animes/199/x.jpeg  ",
                Some("https://shiki.one/uploads/poster/animes/199/x.jpeg"),
            ),
            (
                "https://images.shiki.one/system/animes/original/1.jpg",
                Some("https://shiki.one/system/animes/original/1.jpg"),
            ),
            ("", None),
            ("   ", None),
            ("not a valid url", None),
        ];

        for (input, expected) in cases {
            assert_eq!(normalize_image_url(input).as_deref(), expected, "input: {input:?}");
        }
    }
}
