//! HTTP server implementation using Axum.

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use catalog_core::{
    build_curated_sections, read_store, CatalogCache, CatalogError, Revalidator,
    SectionAggregator,
};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::models::*;
use shared::CatalogStore;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Header carrying the revalidation secret
pub const REVALIDATE_HEADER: &str = "x-revalidate-token";

const DEFAULT_PAGE_SIZE: u32 = 24;
const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_SORT: &str = "rating.desc";
const DEFAULT_SEARCH_LIMIT: u32 = 20;
const MAX_SEARCH_LIMIT: u32 = 50;

/// Application state shared across handlers.
pub struct AppState {
    pub aggregator: SectionAggregator,
    pub cache: Arc<CatalogCache>,
    pub revalidator: Revalidator,
    pub store: Arc<CatalogStore>,
}

/// Catalog error rendered as `{ "error": ... }` with a mapped status
pub struct ApiError(CatalogError);

impl From<CatalogError> for ApiError {
    fn from(error: CatalogError) -> Self {
        Self(error)
    }
}

fn status_for(error: &CatalogError) -> StatusCode {
    match error {
        CatalogError::Configuration(_) | CatalogError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        CatalogError::Authorization => StatusCode::UNAUTHORIZED,
        CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::Upstream { .. } | CatalogError::Transport(_) | CatalogError::Decode(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = match &self.0 {
            CatalogError::Authorization => "Unauthorized".to_string(),
            CatalogError::NotFound(what) => format!("Not found: {}", what),
            other => {
                warn!(status = status.as_u16(), error = %other, "Request failed");
                other.to_string()
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build the router over shared state
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/homepage", get(homepage))
        .route("/api/homepage/sections", get(curated_sections))
        .route("/api/homepage/section/:key", get(homepage_section))
        .route("/api/catalog", get(catalog_page))
        .route("/api/anime/:id", get(anime_details))
        .route("/api/search", get(search))
        .route("/api/genres", get(genres))
        .route("/api/studios", get(studios))
        .route("/api/types", get(anime_types))
        .route("/api/statuses", get(anime_statuses))
        .route("/api/years", get(years))
        .route("/api/seo/:shikimori_id", get(seo))
        .route("/api/sitemap-ids", get(sitemap_ids))
        .route("/api/revalidate/homepage", post(revalidate_homepage))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %listener.local_addr()?, "Server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store = state.store.clone();
    let catalog_items = match read_store(move || store.count()).await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(error = %e, "Failed to count catalog rows");
            None
        }
    };

    Json(json!({
        "status": "ok",
        "catalogItems": catalog_items,
        "cache": state.cache.stats(),
    }))
}

async fn homepage(State(state): State<Arc<AppState>>) -> ApiResult<HomepagePayload> {
    let payload = state.cache.homepage(&state.aggregator).await?;
    Ok(Json((*payload).clone()))
}

/// One cached homepage section (`hero`, `trending`, `popular`, `latest`)
async fn homepage_section(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<SectionPayload> {
    Ok(Json(state.cache.section(&state.aggregator, &key).await?))
}

async fn curated_sections(State(state): State<Arc<AppState>>) -> ApiResult<Vec<SectionPayload>> {
    let store = state.store.clone();
    Ok(Json(read_store(move || build_curated_sections(&store)).await?))
}

#[derive(Debug, Deserialize)]
struct CatalogQuery {
    page: Option<u64>,
    limit: Option<u32>,
    sort: Option<String>,
}

async fn catalog_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<CatalogPage> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let sort = query.sort.as_deref().unwrap_or(DEFAULT_SORT);

    let page = state.aggregator.build_catalog_page(page, limit, sort).await?;
    Ok(Json(page))
}

async fn anime_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<CanonicalAnimeDetails> {
    state
        .aggregator
        .anime_details(&id)
        .await?
        .map(Json)
        .ok_or_else(|| CatalogError::NotFound(format!("anime {}", id)).into())
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    query: Option<String>,
    limit: Option<u32>,
}

async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<CanonicalAnime>> {
    let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).min(MAX_SEARCH_LIMIT);
    let text = query.query.unwrap_or_default();
    Ok(Json(state.aggregator.search(&text, limit).await?))
}

/// Dictionary read that degrades to an empty list
async fn dictionary<T>(
    name: &'static str,
    fetch: impl Future<Output = catalog_core::Result<Vec<T>>>,
) -> Json<Vec<T>> {
    match fetch.await {
        Ok(values) => Json(values),
        Err(e) => {
            warn!(dictionary = name, error = %e, "Dictionary fetch failed, returning empty list");
            Json(Vec::new())
        }
    }
}

async fn genres(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    dictionary("genres", state.aggregator.client().genres()).await
}

async fn studios(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    dictionary("studios", state.aggregator.client().studios()).await
}

async fn anime_types(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    dictionary("types", state.aggregator.client().anime_types()).await
}

async fn anime_statuses(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    dictionary("statuses", state.aggregator.client().anime_statuses()).await
}

async fn years(State(state): State<Arc<AppState>>) -> Json<Vec<i32>> {
    dictionary("years", state.aggregator.client().years()).await
}

async fn seo(
    State(state): State<Arc<AppState>>,
    Path(shikimori_id): Path<String>,
) -> ApiResult<SeoRecord> {
    state
        .cache
        .seo(&state.store, &shikimori_id)
        .await?
        .map(Json)
        .ok_or_else(|| CatalogError::NotFound(format!("seo record {}", shikimori_id)).into())
}

async fn sitemap_ids(State(state): State<Arc<AppState>>) -> ApiResult<Vec<String>> {
    let ids = state.cache.sitemap_ids(&state.store).await?;
    Ok(Json((*ids).clone()))
}

async fn revalidate_homepage(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Value> {
    let presented = headers.get(REVALIDATE_HEADER).and_then(|v| v.to_str().ok());
    let revalidated = state.revalidator.revalidate(presented)?;
    Ok(Json(json!({ "ok": true, "revalidated": revalidated })))
}
