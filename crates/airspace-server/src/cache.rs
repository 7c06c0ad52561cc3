//! Response caching for expensive boundary computations.

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::ApiError;

pub trait CacheEntry {
    fn fetched_at(&self) -> Instant;
    fn ttl(&self) -> Duration;

    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.fetched_at()) >= self.ttl()
    }
}

/// Drop expired entries, then the oldest ones until at most `max_entries` remain.
pub fn prune_cache<K, V>(cache: &DashMap<K, V>, max_entries: usize)
where
    K: Clone + Eq + Hash,
    V: CacheEntry,
{
    let now = Instant::now();
    let mut entries: Vec<(K, Instant)> = Vec::new();
    let mut expired: Vec<K> = Vec::new();
    for entry in cache.iter() {
        if entry.value().is_expired(now) {
            expired.push(entry.key().clone());
        } else {
            entries.push((entry.key().clone(), entry.value().fetched_at()));
        }
    }

    for key in &expired {
        cache.remove(key);
    }

    if cache.len() <= max_entries {
        return;
    }

    entries.sort_by_key(|(_, fetched_at)| *fetched_at);
    for (key, _) in entries {
        if cache.len() <= max_entries {
            break;
        }
        cache.remove(&key);
    }
}

/// Keyed store of computed responses with a per-entry lifetime.
pub trait ResponseCache<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;
    fn put(&self, key: K, value: V, ttl: Duration);
    fn invalidate(&self, key: &K);
}

struct Cached<V> {
    value: V,
    fetched_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry for Cached<V> {
    fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// In-process [`ResponseCache`] backed by a DashMap.
pub struct TtlCache<K, V> {
    entries: DashMap<K, Cached<V>>,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> ResponseCache<K, V> for TtlCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let hit = self.entries.get(key).and_then(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.value.clone())
            }
        });
        if hit.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        hit
    }

    fn put(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(
            key,
            Cached {
                value,
                fetched_at: Instant::now(),
                ttl,
            },
        );
        prune_cache(&self.entries, self.max_entries);
    }

    fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }
}

type SharedResult<V> = Shared<BoxFuture<'static, Result<V, ApiError>>>;

/// Coalesces concurrent computations of the same key into one.
pub struct SingleFlight<K, V> {
    in_flight: Mutex<HashMap<K, SharedResult<V>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the computation for `key`, starting it with `compute` only if
    /// no caller is already running one.
    pub async fn run<F, Fut>(&self, key: K, compute: F) -> Result<V, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let (future, leader) = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match in_flight.get(&key) {
                // A finished entry means its leader was dropped before cleanup.
                Some(existing) if existing.peek().is_none() => (existing.clone(), false),
                _ => {
                    let future = compute().boxed().shared();
                    in_flight.insert(key.clone(), future.clone());
                    (future, true)
                }
            }
        };

        if !leader {
            tracing::debug!("Joining in-flight computation");
        }

        let result = future.await;
        if leader {
            self.in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
        result
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
