//! # Rate Limiter Registry
//!
//! Named limiter lifecycle and dispatch. Callers never hold a limiter
//! directly; they pass a name (and optionally a scope key) and the registry
//! resolves, lazily creates, and drives the right instance.
//!
//! ```text
//!     acquire("jupiter_api", Some("user-42"))
//!            │
//!            ▼
//!     ┌─────────────────────────────────────────────┐
//!     │ config lookup                               │
//!     │   unknown / disabled ────────► ✅ fail-open │
//!     │   scope = Global ────► global limiter       │
//!     │   scope ≠ Global ────► scoped["name/key"]   │
//!     │                        (created on demand)  │
//!     └─────────────────────────────────────────────┘
//!            │
//!            ▼
//!     Verdict { allowed, wait } + aggregate counters
//! ```
//!
//! Fail-open is deliberate: a missing or disabled limit must never block
//! primary traffic. The registry reports, it does not police configuration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ahash::RandomState;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::adaptive::AdaptiveLimiter;
use super::audit::AuditStore;
use super::bucket::{TokenBucket, Verdict};
use super::config::{RateLimitConfig, Scope, Strategy};
use super::window::SlidingWindow;
use crate::error::ConfigError;

/// One admission engine, tagged by strategy.
///
/// Only the `Adaptive` variant can consume response feedback; the registry
/// asks for that capability through [`observer`](Limiter::observer) instead
/// of inspecting the tag.
pub enum Limiter {
    Bucket(TokenBucket),
    Window(SlidingWindow),
    Adaptive(AdaptiveLimiter),
}

impl Limiter {
    /// Builds the engine a config calls for. The alias strategies map onto
    /// the closest engine: fixed window runs on the sliding window, leaky
    /// bucket on the token bucket.
    fn from_config(config: &RateLimitConfig) -> Self {
        match config.strategy {
            Strategy::TokenBucket | Strategy::LeakyBucket => {
                Self::Bucket(TokenBucket::new(config.rate_per_sec, config.burst_capacity))
            }
            Strategy::SlidingWindow | Strategy::FixedWindow => Self::Window(SlidingWindow::new(
                config.burst_capacity as usize,
                Duration::from_secs_f64(config.window_seconds()),
            )),
            Strategy::Adaptive => Self::Adaptive(AdaptiveLimiter::new(
                config.rate_per_sec,
                (config.rate_per_sec * 0.1).max(0.1),
                config.rate_per_sec * 5.0,
            )),
        }
    }

    /// Attempts to admit a request costing `tokens`.
    ///
    /// The token count applies to bucket-backed engines only; a window
    /// admits exactly one request per call regardless.
    pub fn acquire(&self, tokens: f64) -> Verdict {
        match self {
            Self::Bucket(bucket) => bucket.acquire(tokens),
            Self::Window(window) => window.acquire(),
            Self::Adaptive(adaptive) => adaptive.acquire(tokens),
        }
    }

    /// The feedback capability, present only on the adaptive engine.
    pub fn observer(&self) -> Option<&AdaptiveLimiter> {
        match self {
            Self::Adaptive(adaptive) => Some(adaptive),
            _ => None,
        }
    }

    /// Remaining admission headroom: tokens for buckets, free slots for
    /// windows.
    pub fn remaining(&self) -> f64 {
        match self {
            Self::Bucket(bucket) => bucket.available(),
            Self::Window(window) => (window.limit() - window.occupancy()) as f64,
            Self::Adaptive(adaptive) => adaptive.available(),
        }
    }

    /// Estimated wait before the next single admission would succeed.
    fn wait_hint(&self) -> Duration {
        match self {
            Self::Bucket(bucket) => {
                let available = bucket.available();
                if available >= 1.0 {
                    Duration::ZERO
                } else {
                    Duration::from_secs_f64((1.0 - available) / bucket.rate())
                }
            }
            Self::Window(window) => window.wait_hint(),
            Self::Adaptive(adaptive) => adaptive.wait_hint(),
        }
    }

    fn reset(&self) {
        match self {
            Self::Bucket(bucket) => bucket.reset(),
            Self::Window(window) => window.reset(),
            Self::Adaptive(adaptive) => adaptive.reset(),
        }
    }
}

/// Snapshot of one named limiter for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitState {
    pub name: String,
    pub strategy: Strategy,
    pub enabled: bool,
    /// Tokens (buckets) or free slots (windows) available right now.
    pub remaining_capacity: f64,
    /// Whether a single request would currently be denied.
    pub is_limited: bool,
    /// Suggested wait when limited, zero otherwise.
    pub retry_after_seconds: f64,
}

/// Aggregate admission counters with derived rates.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatistics {
    pub total_requests: u64,
    pub allowed_requests: u64,
    pub limited_requests: u64,
    pub total_wait_time_ms: u64,
    /// Fraction of requests denied.
    pub limit_rate: f64,
    /// Mean wait hint across denied requests, in milliseconds.
    pub avg_wait_time_ms: f64,
    pub num_limiters: usize,
    pub num_scoped_limiters: usize,
}

impl RegistryStatistics {
    /// Human-readable multi-line report.
    pub fn summary(&self) -> String {
        format!(
            "Rate Limiter Registry\n\
             ├─ requests: {} total, {} allowed, {} limited ({:.1}%)\n\
             ├─ avg wait on denial: {:.1} ms\n\
             └─ limiters: {} named, {} scoped instances",
            self.total_requests,
            self.allowed_requests,
            self.limited_requests,
            self.limit_rate * 100.0,
            self.avg_wait_time_ms,
            self.num_limiters,
            self.num_scoped_limiters,
        )
    }
}

/// Owner of every named limit in the process.
///
/// Thread-safe and cheap to share behind an `Arc`. All mutation goes through
/// `&self`; the maps are concurrent and the counters are atomics.
///
/// # Example
///
/// ```rust
/// use gavel::{RateLimiterRegistry, RateLimitConfig};
///
/// let registry = RateLimiterRegistry::new();
/// registry
///     .configure(RateLimitConfig::new("jupiter_api", 5.0).with_burst(10.0))
///     .unwrap();
///
/// for _ in 0..10 {
///     assert!(registry.acquire("jupiter_api", None).allowed);
/// }
/// assert!(!registry.acquire("jupiter_api", None).allowed);
/// ```
pub struct RateLimiterRegistry {
    configs: DashMap<String, RateLimitConfig, RandomState>,

    /// One engine per named limit, shared by all globally-scoped traffic.
    global: DashMap<String, Arc<Limiter>, RandomState>,

    /// Lazily created engines for non-global scopes, keyed by
    /// `(limit name, scope key)`.
    scoped: DashMap<(String, String), Arc<Limiter>, RandomState>,

    audit: Option<AuditStore>,

    total_requests: AtomicU64,
    allowed_requests: AtomicU64,
    limited_requests: AtomicU64,
    total_wait_time_ms: AtomicU64,
}

impl RateLimiterRegistry {
    /// Creates an empty registry with no audit persistence.
    pub fn new() -> Self {
        Self {
            configs: DashMap::with_hasher(RandomState::new()),
            global: DashMap::with_hasher(RandomState::new()),
            scoped: DashMap::with_hasher(RandomState::new()),
            audit: None,
            total_requests: AtomicU64::new(0),
            allowed_requests: AtomicU64::new(0),
            limited_requests: AtomicU64::new(0),
            total_wait_time_ms: AtomicU64::new(0),
        }
    }

    /// Creates a registry that mirrors configs and decisions into `audit`.
    ///
    /// Audit writes are best-effort: a failing write is logged and dropped,
    /// never surfaced to the admission path.
    pub fn with_audit(audit: AuditStore) -> Self {
        let mut registry = Self::new();
        registry.audit = Some(audit);
        registry
    }

    /// Registers (or replaces) a named limit.
    ///
    /// Replacing an existing name rebuilds its global engine and drops its
    /// scoped instances; accumulated admission state does not carry over.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the config fails validation. Nothing
    /// is registered in that case.
    pub fn configure(&self, config: RateLimitConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let name = config.name.clone();
        self.global
            .insert(name.clone(), Arc::new(Limiter::from_config(&config)));
        self.scoped.retain(|(n, _), _| *n != name);

        if let Some(audit) = &self.audit {
            if let Err(err) = audit.record_config(&config) {
                warn!(name = %name, error = %err, "failed to persist limiter config");
            }
        }

        info!(
            name = %name,
            rate = config.rate_per_sec,
            burst = config.burst_capacity,
            strategy = config.strategy.as_str(),
            scope = config.scope.as_str(),
            "limiter configured"
        );
        self.configs.insert(name, config);
        Ok(())
    }

    /// Registers the stock set of downstream provider limits.
    ///
    /// Existing names are replaced, so call this before any site-specific
    /// `configure` overrides.
    pub fn register_default_providers(&self) -> Result<(), ConfigError> {
        self.configure(RateLimitConfig::new("solana_rpc", 10.0).with_burst(20.0))?;
        self.configure(RateLimitConfig::new("jupiter_api", 10.0).with_burst(20.0))?;
        self.configure(RateLimitConfig::new("birdeye_api", 5.0).with_burst(10.0))?;
        self.configure(
            RateLimitConfig::new("helius_api", 10.0)
                .with_burst(20.0)
                .with_strategy(Strategy::Adaptive),
        )?;
        self.configure(
            RateLimitConfig::new("dexscreener_api", 5.0)
                .with_burst(10.0)
                .with_strategy(Strategy::SlidingWindow),
        )?;
        Ok(())
    }

    /// Admits one request against the named limit.
    ///
    /// Equivalent to [`acquire_n`](Self::acquire_n) with a cost of one token.
    pub fn acquire(&self, name: &str, scope_key: Option<&str>) -> Verdict {
        self.acquire_n(name, scope_key, 1.0)
    }

    /// Admits a request costing `tokens` against the named limit.
    ///
    /// An unknown or disabled name admits unconditionally (fail-open). With a
    /// non-global scope and a scope key, each distinct key gets its own
    /// engine mirroring the named config, created on first use.
    pub fn acquire_n(&self, name: &str, scope_key: Option<&str>, tokens: f64) -> Verdict {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let Some(config) = self.configs.get(name) else {
            debug!(name, "no limiter configured, admitting");
            self.allowed_requests.fetch_add(1, Ordering::Relaxed);
            return Verdict::allow();
        };
        if !config.enabled {
            self.allowed_requests.fetch_add(1, Ordering::Relaxed);
            return Verdict::allow();
        }

        let limiter = self.resolve(&config, scope_key);
        drop(config);

        let verdict = limiter.acquire(tokens);
        if verdict.allowed {
            self.allowed_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.limited_requests.fetch_add(1, Ordering::Relaxed);
            self.total_wait_time_ms
                .fetch_add(verdict.wait.as_millis() as u64, Ordering::Relaxed);
            debug!(name, wait_ms = verdict.wait.as_millis() as u64, "request limited");
        }

        if let Some(audit) = &self.audit {
            let wait_ms = verdict.wait.as_secs_f64() * 1000.0;
            if let Err(err) = audit.log_request(name, scope_key, verdict.allowed, wait_ms) {
                warn!(name, error = %err, "failed to log admission decision");
            }
        }

        verdict
    }

    /// Async admission with a single bounded sleep-and-retry.
    ///
    /// On denial with `wait` set, sleeps the reported hint once and retries
    /// exactly once; with `wait` unset, denial returns `false` immediately.
    pub async fn acquire_async(
        &self,
        name: &str,
        scope_key: Option<&str>,
        tokens: f64,
        wait: bool,
    ) -> bool {
        let verdict = self.acquire_n(name, scope_key, tokens);
        if verdict.allowed {
            return true;
        }
        if !wait || verdict.wait.is_zero() {
            return false;
        }
        tokio::time::sleep(verdict.wait).await;
        self.acquire_n(name, scope_key, tokens).allowed
    }

    /// Feeds response feedback to the named limiter.
    ///
    /// A no-op unless the name resolves to an adaptive engine.
    pub fn record_response(&self, name: &str, latency_ms: f64, success: bool) {
        if let Some(limiter) = self.global.get(name) {
            if let Some(adaptive) = limiter.observer() {
                adaptive.record_response(latency_ms, success);
            }
        }
    }

    /// Snapshot of the named global limiter, `None` for unknown names.
    pub fn get_state(&self, name: &str) -> Option<RateLimitState> {
        let config = self.configs.get(name)?;
        let limiter = self.global.get(name)?;

        let remaining = limiter.remaining();
        let is_limited = config.enabled && remaining < 1.0;
        let retry_after = if is_limited {
            let hint = limiter.wait_hint().as_secs_f64();
            if hint > 0.0 {
                hint
            } else {
                config.retry_after_seconds
            }
        } else {
            0.0
        };

        Some(RateLimitState {
            name: name.to_string(),
            strategy: config.strategy,
            enabled: config.enabled,
            remaining_capacity: remaining,
            is_limited,
            retry_after_seconds: retry_after,
        })
    }

    /// Aggregate counters plus derived rates.
    pub fn get_statistics(&self) -> RegistryStatistics {
        let total = self.total_requests.load(Ordering::Relaxed);
        let allowed = self.allowed_requests.load(Ordering::Relaxed);
        let limited = self.limited_requests.load(Ordering::Relaxed);
        let wait_ms = self.total_wait_time_ms.load(Ordering::Relaxed);

        RegistryStatistics {
            total_requests: total,
            allowed_requests: allowed,
            limited_requests: limited,
            total_wait_time_ms: wait_ms,
            limit_rate: if total == 0 {
                0.0
            } else {
                limited as f64 / total as f64
            },
            avg_wait_time_ms: if limited == 0 {
                0.0
            } else {
                wait_ms as f64 / limited as f64
            },
            num_limiters: self.global.len(),
            num_scoped_limiters: self.scoped.len(),
        }
    }

    /// Rebuilds limiter state from the stored config.
    ///
    /// With a scope key, only that scoped instance is recreated. Without
    /// one, the global engine is recreated and every scoped instance for
    /// the name is dropped.
    pub fn reset(&self, name: &str, scope_key: Option<&str>) {
        let Some(config) = self.configs.get(name) else {
            return;
        };

        match scope_key {
            Some(key) => {
                self.scoped.insert(
                    (name.to_string(), key.to_string()),
                    Arc::new(Limiter::from_config(&config)),
                );
            }
            None => {
                self.global
                    .insert(name.to_string(), Arc::new(Limiter::from_config(&config)));
                self.scoped.retain(|(n, _), _| n != name);
            }
        }
        debug!(name, ?scope_key, "limiter reset");
    }

    /// Re-enables enforcement for a named limit.
    pub fn enable(&self, name: &str) {
        self.set_enabled(name, true);
    }

    /// Soft kill switch: a disabled limit admits everything.
    pub fn disable(&self, name: &str) {
        self.set_enabled(name, false);
    }

    fn set_enabled(&self, name: &str, enabled: bool) {
        if let Some(mut config) = self.configs.get_mut(name) {
            config.enabled = enabled;
            info!(name, enabled, "limiter kill switch flipped");
            if let Some(audit) = &self.audit {
                if let Err(err) = audit.set_enabled(name, enabled) {
                    warn!(name, error = %err, "failed to persist kill switch");
                }
            }
        }
    }

    /// Reclaims scoped-limiter memory.
    ///
    /// Clears every scoped instance regardless of `max_age`; per-scope
    /// last-access ages are not tracked. Cleared scopes are recreated fresh
    /// on their next request. Returns the number of instances dropped.
    pub fn cleanup_scoped(&self, max_age: Duration) -> usize {
        let _ = max_age;
        let dropped = self.scoped.len();
        self.scoped.clear();
        if dropped > 0 {
            info!(dropped, "scoped limiters cleared");
        }
        dropped
    }

    /// Names of every configured limit.
    pub fn names(&self) -> Vec<String> {
        self.configs.iter().map(|c| c.key().clone()).collect()
    }

    /// Resolves the engine a request should be checked against.
    fn resolve(&self, config: &RateLimitConfig, scope_key: Option<&str>) -> Arc<Limiter> {
        match (config.scope, scope_key) {
            (Scope::Global, _) | (_, None) => self
                .global
                .entry(config.name.clone())
                .or_insert_with(|| Arc::new(Limiter::from_config(config)))
                .clone(),
            (_, Some(key)) => self
                .scoped
                .entry((config.name.clone(), key.to_string()))
                .or_insert_with(|| {
                    debug!(name = %config.name, scope_key = key, "scoped limiter created");
                    Arc::new(Limiter::from_config(config))
                })
                .clone(),
        }
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_denial() {
        let registry = RateLimiterRegistry::new();
        registry
            .configure(RateLimitConfig::new("jupiter", 5.0).with_burst(10.0))
            .unwrap();

        for i in 0..10 {
            assert!(registry.acquire("jupiter", None).allowed, "request {i}");
        }
        let verdict = registry.acquire("jupiter", None);
        assert!(!verdict.allowed);
        assert!(verdict.wait_seconds() > 0.0);
    }

    #[test]
    fn unknown_name_fails_open() {
        let registry = RateLimiterRegistry::new();
        for _ in 0..100 {
            assert!(registry.acquire("never_configured", None).allowed);
        }
    }

    #[test]
    fn disabled_limiter_fails_open() {
        let registry = RateLimiterRegistry::new();
        registry
            .configure(RateLimitConfig::new("api", 1.0).with_burst(1.0))
            .unwrap();

        registry.disable("api");
        for _ in 0..50 {
            assert!(registry.acquire("api", None).allowed);
        }

        registry.enable("api");
        assert!(registry.acquire("api", None).allowed);
        assert!(!registry.acquire("api", None).allowed);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let registry = RateLimiterRegistry::new();
        assert!(registry
            .configure(RateLimitConfig::new("api", -1.0))
            .is_err());
        assert!(registry.get_state("api").is_none());
    }

    #[test]
    fn scoped_limits_are_independent_per_key() {
        let registry = RateLimiterRegistry::new();
        registry
            .configure(
                RateLimitConfig::new("api", 1.0)
                    .with_burst(2.0)
                    .with_scope(Scope::User),
            )
            .unwrap();

        assert!(registry.acquire("api", Some("alice")).allowed);
        assert!(registry.acquire("api", Some("alice")).allowed);
        assert!(!registry.acquire("api", Some("alice")).allowed);

        // Bob's budget is untouched by Alice's exhaustion.
        assert!(registry.acquire("api", Some("bob")).allowed);

        // No scope key on a scoped config falls back to the global engine.
        assert!(registry.acquire("api", None).allowed);
    }

    #[test]
    fn statistics_track_admissions_and_denials() {
        let registry = RateLimiterRegistry::new();
        registry
            .configure(RateLimitConfig::new("api", 5.0).with_burst(5.0))
            .unwrap();

        for _ in 0..8 {
            registry.acquire("api", None);
        }

        let stats = registry.get_statistics();
        assert_eq!(stats.total_requests, 8);
        assert_eq!(stats.allowed_requests, 5);
        assert_eq!(stats.limited_requests, 3);
        assert!(stats.limit_rate > 0.37 && stats.limit_rate < 0.38);
        assert_eq!(stats.num_limiters, 1);
        assert!(stats.summary().contains("8 total"));
    }

    #[test]
    fn state_snapshot_reflects_exhaustion() {
        let registry = RateLimiterRegistry::new();
        registry
            .configure(RateLimitConfig::new("api", 2.0).with_burst(2.0))
            .unwrap();

        let state = registry.get_state("api").unwrap();
        assert!(!state.is_limited);
        assert_eq!(state.remaining_capacity, 2.0);

        registry.acquire("api", None);
        registry.acquire("api", None);

        let state = registry.get_state("api").unwrap();
        assert!(state.is_limited);
        assert!(state.retry_after_seconds > 0.0);

        assert!(registry.get_state("missing").is_none());
    }

    #[test]
    fn reset_restores_full_budget() {
        let registry = RateLimiterRegistry::new();
        registry
            .configure(RateLimitConfig::new("api", 1.0).with_burst(2.0))
            .unwrap();

        registry.acquire("api", None);
        registry.acquire("api", None);
        assert!(!registry.acquire("api", None).allowed);

        registry.reset("api", None);
        assert!(registry.acquire("api", None).allowed);
    }

    #[test]
    fn cleanup_scoped_clears_everything() {
        let registry = RateLimiterRegistry::new();
        registry
            .configure(
                RateLimitConfig::new("api", 10.0)
                    .with_burst(20.0)
                    .with_scope(Scope::Ip),
            )
            .unwrap();

        registry.acquire("api", Some("10.0.0.1"));
        registry.acquire("api", Some("10.0.0.2"));
        registry.acquire("api", Some("10.0.0.3"));
        assert_eq!(registry.get_statistics().num_scoped_limiters, 3);

        let dropped = registry.cleanup_scoped(Duration::from_secs(3600));
        assert_eq!(dropped, 3);
        assert_eq!(registry.get_statistics().num_scoped_limiters, 0);
    }

    #[test]
    fn record_response_reaches_only_adaptive_engines() {
        let registry = RateLimiterRegistry::new();
        registry
            .configure(
                RateLimitConfig::new("helius", 10.0)
                    .with_burst(20.0)
                    .with_strategy(Strategy::Adaptive),
            )
            .unwrap();
        registry
            .configure(RateLimitConfig::new("jupiter", 10.0))
            .unwrap();

        for _ in 0..10 {
            registry.record_response("helius", 1500.0, false);
            registry.record_response("jupiter", 1500.0, false);
        }

        let helius = registry.get_state("helius").unwrap();
        // Backed off: the rebuilt bucket holds 2 × 8 tokens.
        assert!(helius.remaining_capacity < 20.0);

        let jupiter = registry.get_state("jupiter").unwrap();
        assert_eq!(jupiter.remaining_capacity, 20.0);
    }

    #[test]
    fn sliding_window_config_ignores_token_cost() {
        let registry = RateLimiterRegistry::new();
        registry
            .configure(
                RateLimitConfig::new("dex", 5.0)
                    .with_burst(3.0)
                    .with_strategy(Strategy::SlidingWindow),
            )
            .unwrap();

        // Each call is one admission no matter the cost.
        assert!(registry.acquire_n("dex", None, 10.0).allowed);
        assert!(registry.acquire_n("dex", None, 10.0).allowed);
        assert!(registry.acquire_n("dex", None, 10.0).allowed);
        assert!(!registry.acquire_n("dex", None, 10.0).allowed);
    }

    #[test]
    fn default_providers_register_the_stock_set() {
        let registry = RateLimiterRegistry::new();
        registry.register_default_providers().unwrap();

        let mut names = registry.names();
        names.sort();
        assert_eq!(
            names,
            vec![
                "birdeye_api",
                "dexscreener_api",
                "helius_api",
                "jupiter_api",
                "solana_rpc"
            ]
        );

        let solana = registry.get_state("solana_rpc").unwrap();
        assert_eq!(solana.remaining_capacity, 20.0);
        assert_eq!(
            registry.get_state("helius_api").unwrap().strategy,
            Strategy::Adaptive
        );
    }

    #[test]
    fn audit_store_receives_configs_and_decisions() {
        let registry = RateLimiterRegistry::with_audit(AuditStore::open_in_memory().unwrap());
        registry
            .configure(RateLimitConfig::new("api", 1.0).with_burst(1.0))
            .unwrap();

        registry.acquire("api", None);
        registry.acquire("api", None);
        registry.disable("api");
        // Audit failures never surface here; reaching this point is the test.
    }

    #[tokio::test]
    async fn acquire_async_waits_then_succeeds() {
        let registry = RateLimiterRegistry::new();
        registry
            .configure(RateLimitConfig::new("api", 20.0).with_burst(2.0))
            .unwrap();

        registry.acquire_n("api", None, 2.0);

        let admitted = registry.acquire_async("api", None, 1.0, true).await;
        assert!(admitted);
    }

    #[tokio::test]
    async fn acquire_async_without_wait_denies_immediately() {
        let registry = RateLimiterRegistry::new();
        registry
            .configure(RateLimitConfig::new("api", 1.0).with_burst(1.0))
            .unwrap();

        registry.acquire("api", None);

        let start = std::time::Instant::now();
        assert!(!registry.acquire_async("api", None, 1.0, false).await);
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
