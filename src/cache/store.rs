//! # API Cache Store
//!
//! The namespaced TTL+LRU store behind the response cache.
//!
//! ```text
//!     namespace "jupiter_api"          namespace "birdeye_api"
//!     ┌───────────────────────┐        ┌───────────────────────┐
//!     │ quote:SOL  → entry    │        │ price:BONK → entry    │
//!     │ quote:BONK → entry    │        │ ...                   │
//!     │ ...        (LRU order)│        └───────────────────────┘
//!     └───────────────────────┘
//!
//!     get  → lazy expiry check, promote to most-recently-used
//!     set  → at max_size, evict the globally oldest-created entry
//! ```
//!
//! Expiry is observed on access only; no sweeper runs. Eviction scans every
//! namespace for the oldest `created_at`, which stays cheap because the
//! namespace count is small and bounded (one per external provider).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use ahash::RandomState;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use super::entry::{ApiStats, CacheEntry, CacheInfo, CacheStats, NamespaceInfo, NamespaceStats};
use crate::error::FetchError;

/// Construction-time cache tuning.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Total entry cap across all namespaces.
    pub max_size: usize,
    /// TTL applied when neither the call nor the per-API table has one.
    pub default_ttl: Duration,
    /// Per-namespace TTL defaults, consulted when a call passes no TTL.
    pub api_ttls: HashMap<String, Duration>,
}

impl CacheConfig {
    /// Empty per-API table, 1000 entries, 60s default TTL.
    pub fn new() -> Self {
        Self {
            max_size: 1000,
            default_ttl: Duration::from_secs(60),
            api_ttls: HashMap::new(),
        }
    }

    /// The stock per-provider TTL table shipped with the default providers.
    pub fn with_default_providers() -> Self {
        let mut config = Self::new();
        for (api, secs) in [
            ("solana_rpc", 15),
            ("jupiter_api", 10),
            ("birdeye_api", 30),
            ("helius_api", 30),
            ("dexscreener_api", 60),
        ] {
            config.api_ttls.insert(api.to_string(), Duration::from_secs(secs));
        }
        config
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.max(1);
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_api_ttl(mut self, api: impl Into<String>, ttl: Duration) -> Self {
        self.api_ttls.insert(api.into(), ttl);
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

type NamespaceMap = IndexMap<String, CacheEntry, RandomState>;

struct CacheState {
    /// `namespace → insertion-ordered entries`; order is LRU, oldest first.
    namespaces: HashMap<String, NamespaceMap, RandomState>,
    stats: HashMap<String, ApiStats, RandomState>,
}

pub(crate) type PendingMap =
    HashMap<String, broadcast::Sender<Result<Value, FetchError>>, RandomState>;

/// Namespaced TTL+LRU response cache with in-flight fetch coalescing.
///
/// Values are [`serde_json::Value`], matching what the downstream providers
/// return and keeping every entry introspectable. Thread-safe behind one
/// mutex; no method holds the lock across an await point.
///
/// The coalescing operations live in the same type; see
/// [`get_or_fetch`](Self::get_or_fetch).
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use gavel::ApiCache;
///
/// let cache = ApiCache::default();
/// cache.set("jupiter_api", "quote:SOL", json!({"price": 100.5}), None);
///
/// assert_eq!(
///     cache.get("jupiter_api", "quote:SOL"),
///     Some(json!({"price": 100.5}))
/// );
/// assert_eq!(cache.get("birdeye_api", "quote:SOL"), None);
/// ```
pub struct ApiCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
    /// In-flight fetch episodes, keyed by `namespace:key`.
    pub(crate) pending: Mutex<PendingMap>,
}

impl ApiCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState {
                namespaces: HashMap::with_hasher(RandomState::new()),
                stats: HashMap::with_hasher(RandomState::new()),
            }),
            pending: Mutex::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    /// Looks up a fresh entry, promoting it to most-recently-used.
    ///
    /// An expired entry is removed on this access and reported as a miss.
    pub fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut state = self.state.lock().expect("cache lock poisoned");
        let CacheState { namespaces, stats } = &mut *state;
        let stat = stats.entry(namespace.to_string()).or_default();

        let Some(map) = namespaces.get_mut(namespace) else {
            stat.misses += 1;
            return None;
        };
        let Some(index) = map.get_index_of(key) else {
            stat.misses += 1;
            return None;
        };

        let expired = map[index].is_expired(now);
        if expired {
            map.shift_remove_index(index);
            stat.misses += 1;
            debug!(namespace, key, "expired entry removed on access");
            return None;
        }

        let value = {
            let (_, entry) = map.get_index_mut(index).expect("index just looked up");
            entry.hits += 1;
            entry.value.clone()
        };
        let last = map.len() - 1;
        map.move_index(index, last);
        stat.hits += 1;
        Some(value)
    }

    /// Stores a value.
    ///
    /// Effective TTL is `ttl`, else the per-API table, else the global
    /// default. When the total entry count is at `max_size` and this insert
    /// adds a new key, the single globally oldest-created entry is evicted
    /// first.
    pub fn set(&self, namespace: &str, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = self.effective_ttl(namespace, ttl);
        let mut state = self.state.lock().expect("cache lock poisoned");

        let is_new = state
            .namespaces
            .get(namespace)
            .map_or(true, |map| !map.contains_key(key));
        if is_new && Self::total_entries(&state.namespaces) >= self.config.max_size {
            Self::evict_oldest(&mut state.namespaces);
        }

        let map = state
            .namespaces
            .entry(namespace.to_string())
            .or_insert_with(|| IndexMap::with_hasher(RandomState::new()));
        // Re-insert at the most-recently-used end.
        map.shift_remove(key);
        map.insert(key.to_string(), CacheEntry::new(value, ttl));
    }

    /// Removes one entry. Returns whether it existed.
    pub fn invalidate(&self, namespace: &str, key: &str) -> bool {
        let mut state = self.state.lock().expect("cache lock poisoned");
        state
            .namespaces
            .get_mut(namespace)
            .and_then(|map| map.shift_remove(key))
            .is_some()
    }

    /// Drops a whole namespace. Returns the number of entries removed.
    pub fn invalidate_api(&self, namespace: &str) -> usize {
        let mut state = self.state.lock().expect("cache lock poisoned");
        let removed = state
            .namespaces
            .remove(namespace)
            .map_or(0, |map| map.len());
        if removed > 0 {
            debug!(namespace, removed, "namespace invalidated");
        }
        removed
    }

    /// Drops every entry in every namespace. Counters survive.
    pub fn clear_all(&self) {
        let mut state = self.state.lock().expect("cache lock poisoned");
        state.namespaces.clear();
    }

    /// Total entries across all namespaces.
    pub fn len(&self) -> usize {
        let state = self.state.lock().expect("cache lock poisoned");
        Self::total_entries(&state.namespaces)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit/miss counters, aggregate and per namespace.
    pub fn get_stats(&self) -> CacheStats {
        let state = self.state.lock().expect("cache lock poisoned");

        let mut namespaces = HashMap::new();
        let mut total_hits = 0;
        let mut total_misses = 0;
        for (name, stat) in &state.stats {
            total_hits += stat.hits;
            total_misses += stat.misses;
            namespaces.insert(
                name.clone(),
                NamespaceStats {
                    hits: stat.hits,
                    misses: stat.misses,
                    entries: state.namespaces.get(name).map_or(0, |m| m.len()),
                    hit_rate: stat.hit_rate(),
                },
            );
        }

        let lookups = total_hits + total_misses;
        CacheStats {
            total_entries: Self::total_entries(&state.namespaces),
            total_hits,
            total_misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                total_hits as f64 / lookups as f64
            },
            max_size: self.config.max_size,
            namespaces,
        }
    }

    /// Configuration and approximate footprint.
    pub fn get_info(&self) -> CacheInfo {
        let state = self.state.lock().expect("cache lock poisoned");

        let mut namespaces = HashMap::new();
        let mut approx_bytes = 0;
        for (name, map) in &state.namespaces {
            let bytes: usize = map.values().map(CacheEntry::approx_bytes).sum();
            approx_bytes += bytes;
            namespaces.insert(
                name.clone(),
                NamespaceInfo {
                    entries: map.len(),
                    approx_bytes: bytes,
                    default_ttl_secs: self.effective_ttl(name, None).as_secs_f64(),
                },
            );
        }

        CacheInfo {
            max_size: self.config.max_size,
            default_ttl_secs: self.config.default_ttl.as_secs_f64(),
            total_entries: Self::total_entries(&state.namespaces),
            approx_bytes,
            namespaces,
        }
    }

    pub(crate) fn effective_ttl(&self, namespace: &str, ttl: Option<Duration>) -> Duration {
        ttl.or_else(|| self.config.api_ttls.get(namespace).copied())
            .unwrap_or(self.config.default_ttl)
    }

    fn total_entries(namespaces: &HashMap<String, NamespaceMap, RandomState>) -> usize {
        namespaces.values().map(NamespaceMap::len).sum()
    }

    /// Removes the single entry with the smallest `created_at` across every
    /// namespace.
    fn evict_oldest(namespaces: &mut HashMap<String, NamespaceMap, RandomState>) {
        let mut oldest: Option<(String, usize, Instant)> = None;
        for (name, map) in namespaces.iter() {
            for (index, entry) in map.values().enumerate() {
                let older = oldest
                    .as_ref()
                    .map_or(true, |(_, _, created)| entry.created_at < *created);
                if older {
                    oldest = Some((name.clone(), index, entry.created_at));
                }
            }
        }

        if let Some((name, index, _)) = oldest {
            if let Some(map) = namespaces.get_mut(&name) {
                if let Some((key, _)) = map.shift_remove_index(index) {
                    debug!(namespace = %name, key = %key, "oldest entry evicted");
                }
            }
        }
    }
}

impl Default for ApiCache {
    fn default() -> Self {
        Self::new(CacheConfig::new())
    }
}
