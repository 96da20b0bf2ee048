//! # Response Cache Subsystem
//!
//! Per-provider response caching with request coalescing.
//!
//! ```text
//!     ┌────────────────────────────────────────────────┐
//!     │                    ApiCache                    │
//!     │  namespaced TTL+LRU store  ·  pending fetches  │
//!     └───────┬────────────────┬───────────────┬───────┘
//!             │                │               │
//!             ▼                ▼               ▼
//!       get / set       get_or_fetch     batch_get_or_fetch
//!       invalidate      (coalesced)      (partitioned)
//! ```
//!
//! Plus [`parallel_fetch`] for failure-isolated fan-out and [`CachedCall`]
//! for the "cache this function's result" pattern.

pub mod coalesce;
pub mod entry;
pub mod key;
pub mod store;

pub use coalesce::parallel_fetch;
pub use entry::{CacheInfo, CacheStats, NamespaceInfo, NamespaceStats};
pub use key::{cache_key, canonical_json, CachedCall};
pub use store::{ApiCache, CacheConfig};
