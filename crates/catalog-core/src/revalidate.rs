//! Authenticated purge of the homepage caches.
//!
//! A request moves through two steps: `authenticate` turns a presented token
//! into an `AuthorizedPurge`, and only that value can purge.

use crate::catalog_cache::{CatalogCache, HOMEPAGE_KEY};
use crate::error::{CatalogError, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Keys purged by a homepage revalidation, in reporting order
pub const HOMEPAGE_CACHE_KEYS: [&str; 5] = [HOMEPAGE_KEY, "hero", "trending", "popular", "latest"];

/// Checks revalidation tokens against the configured secret
pub struct Revalidator {
    secret: Option<String>,
    cache: Arc<CatalogCache>,
}

/// Proof that a request presented the right token
#[must_use]
pub struct AuthorizedPurge<'a> {
    cache: &'a CatalogCache,
}

impl Revalidator {
    /// An unset or empty secret rejects every request
    pub fn new(secret: Option<String>, cache: Arc<CatalogCache>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            cache,
        }
    }

    pub fn authenticate(&self, presented: Option<&str>) -> Result<AuthorizedPurge<'_>> {
        let Some(secret) = self.secret.as_deref() else {
            warn!("Revalidation rejected: no secret configured");
            return Err(CatalogError::Authorization);
        };

        match presented {
            Some(token) if constant_time_eq(token.as_bytes(), secret.as_bytes()) => Ok(AuthorizedPurge {
                cache: &self.cache,
            }),
            _ => {
                warn!(token_present = presented.is_some(), "Revalidation rejected: bad token");
                Err(CatalogError::Authorization)
            }
        }
    }

    /// Authenticate and purge; returns the purged keys in fixed order
    pub fn revalidate(&self, presented: Option<&str>) -> Result<Vec<String>> {
        Ok(self.authenticate(presented)?.purge())
    }
}

impl AuthorizedPurge<'_> {
    /// Drop every homepage key; reports all of them whether or not they were cached
    pub fn purge(self) -> Vec<String> {
        let present = self.cache.invalidate(HOMEPAGE_CACHE_KEYS);
        info!(present = ?present, "Homepage caches revalidated");
        HOMEPAGE_CACHE_KEYS.iter().map(|k| k.to_string()).collect()
    }
}

/// Byte comparison whose running time depends only on the lengths
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::SectionAggregator;
    use crate::api::KodikClient;
    use crate::testing::{list_body, raw_record, FakeTransport};
    use shared::config::CacheConfig;

    fn cache() -> Arc<CatalogCache> {
        Arc::new(CatalogCache::new(&CacheConfig {
            homepage_ttl_seconds: 300,
            seo_ttl_seconds: 3600,
            sitemap_ttl_seconds: 21600,
        }))
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret-longer"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_rejects_wrong_or_missing_token() {
        let revalidator = Revalidator::new(Some("s3cret".to_string()), cache());

        for presented in [None, Some(""), Some("wrong"), Some("s3cret ")] {
            assert_eq!(
                revalidator.revalidate(presented).unwrap_err(),
                CatalogError::Authorization
            );
        }
    }

    #[test]
    fn test_unset_secret_rejects_everything() {
        for secret in [None, Some(String::new())] {
            let revalidator = Revalidator::new(secret, cache());
            assert!(revalidator.revalidate(Some("")).is_err());
            assert!(revalidator.revalidate(Some("anything")).is_err());
            assert!(revalidator.revalidate(None).is_err());
        }
    }

    #[tokio::test]
    async fn test_purge_forces_homepage_rebuild() {
        let cache = cache();
        let transport = FakeTransport::routed(|_| Ok(list_body(vec![raw_record("a", "А")], 1)));
        let aggregator = SectionAggregator::new(KodikClient::with_transport(
            transport.clone(),
            "https://catalog.test",
            Some("tok".to_string()),
        ));

        cache.homepage(&aggregator).await.unwrap();
        assert_eq!(transport.calls(), 4);

        let revalidator = Revalidator::new(Some("s3cret".to_string()), cache.clone());
        let purged = revalidator.revalidate(Some("s3cret")).unwrap();
        assert_eq!(purged, vec!["homepage", "hero", "trending", "popular", "latest"]);

        cache.homepage(&aggregator).await.unwrap();
        assert_eq!(transport.calls(), 8);

        // Rejected requests leave the cache alone
        assert!(revalidator.revalidate(Some("nope")).is_err());
        cache.homepage(&aggregator).await.unwrap();
        assert_eq!(transport.calls(), 8);
    }
}
