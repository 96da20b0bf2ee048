//! # Cache Entries and Statistics
//!
//! Value holders for the response cache: one [`CacheEntry`] per stored
//! response, one [`ApiStats`] counter pair per namespace, and the
//! serializable snapshots `get_stats`/`get_info` hand out.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

/// One cached response.
///
/// Lifecycle: created on `set` or a fetch miss, served while fresh, judged
/// expired lazily on access (never swept in the background), and removed by
/// explicit invalidation, expiry-on-access, or capacity eviction.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub(crate) value: Value,
    pub(crate) created_at: Instant,
    pub(crate) expires_at: Instant,
    pub(crate) hits: u64,
}

impl CacheEntry {
    /// Invariant: `expires_at = created_at + ttl`.
    pub(crate) fn new(value: Value, ttl: Duration) -> Self {
        let created_at = Instant::now();
        Self {
            value,
            created_at,
            expires_at: created_at + ttl,
            hits: 0,
        }
    }

    /// Whether the entry has outlived its TTL, judged against `now`.
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    /// Rough serialized footprint in bytes, for `get_info`.
    pub(crate) fn approx_bytes(&self) -> usize {
        serde_json::to_vec(&self.value).map(|v| v.len()).unwrap_or(0)
    }
}

/// Per-namespace hit/miss counters. The hit rate is derived, never stored.
#[derive(Debug, Clone, Default)]
pub struct ApiStats {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
}

impl ApiStats {
    pub(crate) fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Per-namespace slice of a stats snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub hit_rate: f64,
}

/// Aggregate cache statistics, JSON-serializable for health endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_hits: u64,
    pub total_misses: u64,
    pub hit_rate: f64,
    pub max_size: usize,
    pub namespaces: HashMap<String, NamespaceStats>,
}

impl CacheStats {
    /// Human-readable multi-line report.
    pub fn summary(&self) -> String {
        format!(
            "API Cache\n\
             ├─ entries: {} / {}\n\
             ├─ hits: {}, misses: {} ({:.1}% hit rate)\n\
             └─ namespaces: {}",
            self.total_entries,
            self.max_size,
            self.total_hits,
            self.total_misses,
            self.hit_rate * 100.0,
            self.namespaces.len(),
        )
    }
}

/// Per-namespace slice of an info snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceInfo {
    pub entries: usize,
    pub approx_bytes: usize,
    /// TTL applied to this namespace when `set` passes none.
    pub default_ttl_secs: f64,
}

/// Configuration and footprint snapshot, JSON-serializable.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub max_size: usize,
    pub default_ttl_secs: f64,
    pub total_entries: usize,
    pub approx_bytes: usize,
    pub namespaces: HashMap<String, NamespaceInfo>,
}
