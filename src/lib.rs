//! # Gavel
//!
//! In-process request governance: named rate limiters paired with a
//! coalescing response cache, sitting between your callers and a set of
//! external, rate-limited, latency-variable providers.
//!
//! ```text
//!     callers ──► RateLimiterRegistry ──► ApiCache ──► providers
//!                  "may I call now?"       "has someone
//!                                           already asked?"
//! ```
//!
//! ## Features
//!
//! - **Three admission engines**: [`TokenBucket`] (lazy continuous refill),
//!   [`SlidingWindow`] (exact timestamp counting), and [`AdaptiveLimiter`]
//!   (AIMD feedback over observed latency and errors).
//! - **Named limits with scoping**: one config per provider, enforced
//!   globally or per endpoint/user/IP with lazily created instances.
//! - **Fail-open dispatch**: an unknown or disabled limit never blocks
//!   traffic.
//! - **TTL+LRU response cache** partitioned by provider namespace, with
//!   lazy expiry and a global entry cap.
//! - **Request coalescing**: N concurrent identical misses cost exactly one
//!   outbound fetch; all waiters see the same value or the same error.
//! - **Batch and fan-out helpers**: [`ApiCache::batch_get_or_fetch`] goes
//!   outbound only for uncached keys; [`parallel_fetch`] isolates
//!   per-source failures.
//! - **Introspection everywhere**: JSON-serializable statistics and state
//!   snapshots, plus an optional write-only SQLite audit trail.
//!
//! Everything is single-process and in-memory. Distributed limit
//! coordination is a deliberate non-goal; pair each process with its own
//! governance context.
//!
//! ## Quick start
//!
//! ```rust
//! use serde_json::json;
//! use gavel::{Governance, RateLimitConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), gavel::Error> {
//! let gov = Governance::new();
//! gov.limiter
//!     .configure(RateLimitConfig::new("jupiter_api", 5.0).with_burst(10.0))?;
//!
//! let verdict = gov.limiter.acquire("jupiter_api", None);
//! if verdict.allowed {
//!     let quote = gov
//!         .cache
//!         .get_or_fetch("jupiter_api", "quote:SOL", || async {
//!             // ... call the provider ...
//!             Ok(json!({"price": 100.5}))
//!         }, None)
//!         .await?;
//!     assert_eq!(quote["price"], 100.5);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod rate_limiter;

pub use cache::{
    cache_key, canonical_json, parallel_fetch, ApiCache, CacheConfig, CacheInfo, CacheStats,
    CachedCall, NamespaceInfo, NamespaceStats,
};
pub use error::{ConfigError, Error, FetchError, Result};
pub use rate_limiter::{
    AdaptiveLimiter, AuditStore, Limiter, RateLimitConfig, RateLimitState, RateLimiterRegistry,
    RegistryStatistics, Scope, SlidingWindow, Strategy, TokenBucket, Verdict,
};

/// The governance context owned by process bootstrap.
///
/// Bundles the two subsystems so they can be constructed once and passed by
/// reference (or behind an `Arc`) to every caller. There is deliberately no
/// global instance; tests and embedders each build their own.
pub struct Governance {
    pub limiter: RateLimiterRegistry,
    pub cache: ApiCache,
}

impl Governance {
    /// Empty registry, default cache tuning.
    pub fn new() -> Self {
        Self {
            limiter: RateLimiterRegistry::new(),
            cache: ApiCache::new(CacheConfig::new()),
        }
    }

    /// Context preloaded with the stock provider limits and TTL table.
    pub fn with_default_providers() -> Result<Self, ConfigError> {
        let limiter = RateLimiterRegistry::new();
        limiter.register_default_providers()?;
        Ok(Self {
            limiter,
            cache: ApiCache::new(CacheConfig::with_default_providers()),
        })
    }
}

impl Default for Governance {
    fn default() -> Self {
        Self::new()
    }
}
