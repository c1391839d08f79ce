//! In-memory TTL cache with single-flight computation.
//!
//! Entries expire lazily: a read at or after `stored_at + ttl` is a miss and
//! drops the entry. Concurrent readers of the same missing key share one
//! computation instead of each starting their own.

use crate::error::Result;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Source of the current time, substitutable in tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Cached value with the time it was stored and how long it stays live
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(self.stored_at).to_std() {
            Ok(elapsed) => elapsed >= self.ttl,
            // Clock moved backwards; the entry is younger than its TTL
            Err(_) => false,
        }
    }
}

type SharedComputation<V> = Shared<BoxFuture<'static, Result<V>>>;

/// A computation in progress; `id` tells a finished flight whether it was invalidated
struct Flight<V> {
    id: u64,
    future: SharedComputation<V>,
}

struct State<V> {
    entries: HashMap<String, CacheEntry<V>>,
    in_flight: HashMap<String, Flight<V>>,
    next_flight: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    joined: AtomicU64,
    computations: AtomicU64,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Reads that attached to a computation already in flight
    pub joined: u64,
    pub computations: u64,
    pub entries: usize,
}

/// TTL cache keyed by string; cheap to clone, clones share state
pub struct TtlCache<V> {
    name: &'static str,
    default_ttl: Duration,
    state: Arc<Mutex<State<V>>>,
    clock: Arc<dyn Clock>,
    counters: Arc<Counters>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            default_ttl: self.default_ttl,
            state: self.state.clone(),
            clock: self.clock.clone(),
            counters: self.counters.clone(),
        }
    }
}

fn lock<V>(state: &Mutex<State<V>>) -> MutexGuard<'_, State<V>> {
    // The map stays consistent even if a holder panicked
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache on the wall clock
    pub fn new(name: &'static str, default_ttl: Duration) -> Self {
        Self::with_clock(name, default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(name: &'static str, default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            default_ttl,
            state: Arc::new(Mutex::new(State {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                next_flight: 0,
            })),
            clock,
            counters: Arc::new(Counters::default()),
        }
    }

    /// `get_or_compute_with_ttl` using the cache's default TTL
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.get_or_compute_with_ttl(key, self.default_ttl, compute).await
    }

    /// Return the live entry for `key`, or compute, store and return it
    ///
    /// `compute` runs at most once per miss no matter how many callers are
    /// waiting on the key. A failed computation is handed to every waiter and
    /// nothing is stored.
    pub async fn get_or_compute_with_ttl<F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let computation = {
            let mut state = lock(&self.state);
            let now = self.clock.now();

            if let Some(entry) = state.entries.get(key) {
                if !entry.is_expired(now) {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = self.name, key = key, "Cache hit");
                    return Ok(entry.value.clone());
                }
                state.entries.remove(key);
                debug!(cache = self.name, key = key, "Cache entry expired");
            }

            if let Some(flight) = state.in_flight.get(key) {
                self.counters.joined.fetch_add(1, Ordering::Relaxed);
                debug!(cache = self.name, key = key, "Joining computation in flight");
                flight.future.clone()
            } else {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(cache = self.name, key = key, "Cache miss");

                let id = state.next_flight;
                state.next_flight += 1;

                let future = self.flight(key.to_string(), id, ttl, compute()).boxed().shared();
                state.in_flight.insert(
                    key.to_string(),
                    Flight {
                        id,
                        future: future.clone(),
                    },
                );
                future
            }
        };

        computation.await
    }

    /// Wrap `work` so that whichever waiter drives it to completion stores the result
    fn flight<Fut>(
        &self,
        key: String,
        id: u64,
        ttl: Duration,
        work: Fut,
    ) -> impl Future<Output = Result<V>> + Send + 'static
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let name = self.name;
        let state = self.state.clone();
        let clock = self.clock.clone();
        let counters = self.counters.clone();

        async move {
            let result = work.await;
            counters.computations.fetch_add(1, Ordering::Relaxed);

            let mut state = lock(&state);
            let still_current = state.in_flight.get(&key).map(|f| f.id) == Some(id);
            if !still_current {
                debug!(cache = name, key = %key, "Discarding result of invalidated computation");
                return result;
            }

            state.in_flight.remove(&key);
            match &result {
                Ok(value) => {
                    state.entries.insert(
                        key.clone(),
                        CacheEntry {
                            value: value.clone(),
                            stored_at: clock.now(),
                            ttl,
                        },
                    );
                    debug!(cache = name, key = %key, ttl_secs = ttl.as_secs(), "Cache stored");
                }
                Err(e) => {
                    debug!(cache = name, key = %key, error = %e, "Computation failed, nothing cached");
                }
            }

            result
        }
    }

    /// Remove entries for `keys` immediately; returns the keys that had an
    /// entry or a computation in flight
    ///
    /// A computation in flight keeps running for its current waiters but its
    /// result is not stored, so the next read recomputes.
    pub fn invalidate<I, S>(&self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = lock(&self.state);
        let mut removed = Vec::new();

        for key in keys {
            let key = key.as_ref();
            let had_entry = state.entries.remove(key).is_some();
            let had_flight = state.in_flight.remove(key).is_some();
            if had_entry || had_flight {
                removed.push(key.to_string());
            }
        }

        if !removed.is_empty() {
            debug!(cache = self.name, keys = ?removed, "Invalidated cache entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let state = lock(&self.state);
        let now = self.clock.now();
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            joined: self.counters.joined.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
            entries: state.entries.values().filter(|e| !e.is_expired(now)).count(),
        }
    }
}
