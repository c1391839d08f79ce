//! Test doubles shared by the unit tests of this crate.

use crate::api::{Transport, TransportResponse};
use crate::cache::Clock;
use crate::error::{CatalogError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

type Responder = Box<dyn Fn(&Url) -> Result<TransportResponse> + Send + Sync>;

/// Transport that answers from a closure and records every request
pub struct FakeTransport {
    responder: Responder,
    calls: AtomicUsize,
    urls: Mutex<Vec<Url>>,
    delay: Option<Duration>,
}

impl FakeTransport {
    pub fn routed(
        responder: impl Fn(&Url) -> Result<TransportResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self::build(Box::new(responder), None))
    }

    /// Like `routed`, but every response is delayed
    pub fn routed_with_delay(
        delay: Duration,
        responder: impl Fn(&Url) -> Result<TransportResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self::build(Box::new(responder), Some(delay)))
    }

    fn build(responder: Responder, delay: Option<Duration>) -> Self {
        Self {
            responder,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            delay,
        }
    }

    /// Always answers 200 with the given JSON
    pub fn json(body: Value) -> Arc<Self> {
        let body = body.to_string();
        Self::routed(move |_| {
            Ok(TransportResponse {
                status: 200,
                body: body.clone(),
            })
        })
    }

    /// Always answers with the given status and body
    pub fn status(status: u16, body: &str) -> Arc<Self> {
        let body = body.to_string();
        Self::routed(move |_| {
            Ok(TransportResponse {
                status,
                body: body.clone(),
            })
        })
    }

    /// Answers from the queue in order, failing once it is exhausted
    pub fn sequence(responses: Vec<Result<(u16, String)>>) -> Arc<Self> {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::routed(move |_| {
            let next = queue.lock().unwrap().pop_front();
            match next {
                Some(Ok((status, body))) => Ok(TransportResponse { status, body }),
                Some(Err(e)) => Err(e),
                None => Err(CatalogError::Transport("no scripted response left".to_string())),
            }
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_url(&self) -> Option<Url> {
        self.urls.lock().unwrap().last().cloned()
    }

    pub fn urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(url)
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc::now()),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Value of a query parameter, if present
pub fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Minimal upstream record as the catalog API returns it
pub fn raw_record(id: &str, title: &str) -> Value {
    serde_json::json!({
        "id": id,
        "title": title,
        "link": format!("//kodik.info/serial/{}", id),
        "screenshots": [],
        "material_data": {
            "title_en": format!("{} (en)", title),
            "poster_url": format!("https://nyaa.shikimori.one/posters/{}.jpg", id),
            "genres": ["драма"],
            "year": 2021,
            "shikimori_rating": 8.4,
            "episodes_total": 12,
            "anime_status": "ongoing",
            "anime_kind": "tv"
        }
    })
}

/// 200 response wrapping the given records
pub fn list_body(records: Vec<Value>, total: u64) -> TransportResponse {
    TransportResponse {
        status: 200,
        body: serde_json::json!({ "results": records, "total": total }).to_string(),
    }
}
