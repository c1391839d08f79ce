//! Catalog API client with credential checks and retry logic.

use super::transport::{HttpTransport, Transport};
use super::types::*;
use crate::error::{CatalogError, Result};
use serde_json::Value;
use shared::config::{CatalogApiConfig, CATALOG_TOKEN_ENV};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

/// Third-party streaming-catalog API client
///
/// Holds no cache of its own; every call goes to the transport.
#[derive(Clone)]
pub struct KodikClient {
    /// Transport used for every request
    transport: Arc<dyn Transport>,
    /// Base URL for the API
    base_url: String,
    /// Access token, appended as the `token` query parameter
    token: Option<String>,
    /// Maximum retries for transport failures, 429 and 5xx
    max_retries: u32,
    /// Base delay for retry (exponential backoff)
    retry_delay_ms: u64,
}

impl KodikClient {
    /// Create a client over HTTP from configuration
    pub fn new(config: &CatalogApiConfig) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_seconds))?;
        Ok(Self::with_transport(
            Arc::new(transport),
            config.base_url.clone(),
            config.token.clone(),
        )
        .with_retries(config.max_retries, config.retry_delay_ms))
    }

    /// Create a client over an arbitrary transport, without retries
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            token,
            max_retries: 0,
            retry_delay_ms: 0,
        }
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CatalogError::Configuration(format!("{} is not set", CATALOG_TOKEN_ENV)))
    }

    fn build_url(&self, endpoint: &str, token: &str, filters: &Filters) -> Result<Url> {
        let raw = format!("{}{}", self.base_url.trim_end_matches('/'), endpoint);
        let mut url = Url::parse(&raw)
            .map_err(|e| CatalogError::Configuration(format!("Invalid catalog API URL {}: {}", raw, e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("token", token);
            for (key, value) in filters.query_pairs() {
                query.append_pair(key, &value);
            }
        }

        Ok(url)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(2u64.saturating_pow(attempt)))
    }

    /// Make a GET request and decode the JSON body
    ///
    /// The token is checked before anything touches the transport.
    async fn get_json(&self, endpoint: &str, filters: &Filters) -> Result<Value> {
        let token = self.require_token()?;
        let url = self.build_url(endpoint, token, filters)?;

        let mut attempt = 0;
        let response = loop {
            debug!(endpoint = endpoint, attempt = attempt + 1, "Making catalog API request");

            match self.transport.get(&url).await {
                Ok(response) if response.is_success() => break response,
                Ok(response) if response.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        endpoint = endpoint,
                        status = response.status,
                        delay_ms = delay.as_millis() as u64,
                        "Catalog API request failed, retrying"
                    );
                    sleep(delay).await;
                }
                Ok(response) => {
                    warn!(
                        endpoint = endpoint,
                        status = response.status,
                        "Catalog API request failed"
                    );
                    return Err(CatalogError::Upstream {
                        status: Some(response.status),
                        body: response.body,
                    });
                }
                Err(CatalogError::Transport(e)) if attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(endpoint = endpoint, error = %e, delay_ms = delay.as_millis() as u64, "Request error, retrying");
                    sleep(delay).await;
                }
                Err(e) => {
                    warn!(endpoint = endpoint, error = %e, "Request error");
                    return Err(e);
                }
            }

            attempt += 1;
        };

        let body: Value = serde_json::from_str(&response.body)
            .map_err(|e| CatalogError::Decode(format!("{} returned invalid JSON: {}", endpoint, e)))?;

        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            warn!(endpoint = endpoint, error = %message, "Catalog API returned an error");
            return Err(CatalogError::Upstream {
                status: Some(response.status),
                body: message,
            });
        }

        Ok(body)
    }

    /// Fetch any list-shaped endpoint
    pub async fn fetch_list(&self, endpoint: &str, filters: &Filters) -> Result<ListResponse> {
        let body = self.get_json(endpoint, filters).await?;
        let response = ListResponse::from_body(&body);
        debug!(
            endpoint = endpoint,
            results = response.results.len(),
            total = response.total,
            "Fetched list"
        );
        Ok(response)
    }

    /// Filtered listing (`/list`)
    pub async fn list(&self, filters: &Filters) -> Result<ListResponse> {
        self.fetch_list("/list", filters).await
    }

    /// Title search (`/search`)
    pub async fn search(&self, title: &str, limit: u32) -> Result<ListResponse> {
        info!(title = title, limit = limit, "Searching catalog");
        let filters = Filters::new()
            .with("title", title)
            .with("limit", limit)
            .with("with_material_data", true);
        self.fetch_list("/search", &filters).await
    }

    async fn titles(&self, endpoint: &str) -> Result<Vec<String>> {
        let response = self.fetch_list(endpoint, &Filters::new()).await?;
        Ok(response
            .results
            .into_iter()
            .filter_map(|v| serde_json::from_value::<TitledEntry>(v).ok())
            .map(|entry| entry.title)
            .collect())
    }

    /// Fetch all genre titles
    pub async fn genres(&self) -> Result<Vec<String>> {
        self.titles("/genres").await
    }

    /// Fetch all studio titles
    pub async fn studios(&self) -> Result<Vec<String>> {
        self.titles("/studios").await
    }

    /// Fetch all anime type titles
    pub async fn anime_types(&self) -> Result<Vec<String>> {
        self.titles("/anime_types").await
    }

    /// Fetch all anime status titles
    pub async fn anime_statuses(&self) -> Result<Vec<String>> {
        self.titles("/anime_statuses").await
    }

    /// Fetch release years, newest first
    pub async fn years(&self) -> Result<Vec<i32>> {
        let response = self.fetch_list("/years", &Filters::new()).await?;
        let mut years: Vec<i32> = response
            .results
            .into_iter()
            .filter_map(|v| serde_json::from_value::<YearEntry>(v).ok())
            .map(|entry| entry.year)
            .collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        Ok(years)
    }
}
