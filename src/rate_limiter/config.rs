//! # Rate Limiter Configuration
//!
//! Named limiter definitions: how fast, how bursty, which algorithm, and at
//! what granularity a limit applies.
//!
//! ```text
//!     Configuration Example:
//!     ┌────────────────────────────────────┐
//!     │ name: "jupiter_api"                │
//!     │ rate_per_sec: 10.0                 │ ← sustained rate
//!     │ burst_capacity: 20.0               │ ← short-term headroom
//!     │ strategy: TokenBucket              │
//!     │ scope: Global                      │ ← or Endpoint/User/Ip
//!     └────────────────────────────────────┘
//! ```
//!
//! A config lives for the process lifetime once registered. The `enabled`
//! flag is a soft kill switch: a disabled limiter admits everything.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Admission control algorithm backing a named limit.
///
/// Only three engines exist ([`TokenBucket`](crate::TokenBucket),
/// [`SlidingWindow`](crate::SlidingWindow),
/// [`AdaptiveLimiter`](crate::AdaptiveLimiter)); `FixedWindow` and
/// `LeakyBucket` are accepted in configs and instantiate the closest engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Capped token pool replenished continuously. The default.
    TokenBucket,
    /// Exact request-timestamp counting over a trailing window.
    SlidingWindow,
    /// Accepted alias; runs on the sliding-window engine.
    FixedWindow,
    /// Accepted alias; runs on the token-bucket engine.
    LeakyBucket,
    /// Token bucket whose rate self-tunes from latency/error feedback.
    Adaptive,
}

impl Strategy {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::TokenBucket => "token_bucket",
            Self::SlidingWindow => "sliding_window",
            Self::FixedWindow => "fixed_window",
            Self::LeakyBucket => "leaky_bucket",
            Self::Adaptive => "adaptive",
        }
    }
}

/// Granularity at which a named limit is enforced.
///
/// Anything other than `Global` makes the registry keep one limiter instance
/// per scope key, created lazily on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// One shared limiter for all callers.
    Global,
    /// One limiter per endpoint path.
    Endpoint,
    /// One limiter per user identifier.
    User,
    /// One limiter per client address.
    Ip,
}

impl Scope {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Endpoint => "endpoint",
            Self::User => "user",
            Self::Ip => "ip",
        }
    }
}

/// Definition of one named rate limit.
///
/// Build with [`RateLimitConfig::new`] and the `with_*` methods, then hand to
/// [`RateLimiterRegistry::configure`](crate::RateLimiterRegistry::configure).
///
/// # Example
///
/// ```rust
/// use gavel::{RateLimitConfig, Strategy, Scope};
///
/// let config = RateLimitConfig::new("jupiter_api", 10.0)
///     .with_burst(20.0)
///     .with_strategy(Strategy::TokenBucket)
///     .with_scope(Scope::Global);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Name callers pass to `acquire`; usually the downstream provider.
    pub name: String,

    /// Sustained requests per second.
    pub rate_per_sec: f64,

    /// Maximum burst (token bucket capacity / window occupancy limit).
    pub burst_capacity: f64,

    /// Admission algorithm.
    pub strategy: Strategy,

    /// Enforcement granularity.
    pub scope: Scope,

    /// Hint reported alongside denials when no wait can be computed.
    pub retry_after_seconds: f64,

    /// Soft kill switch; a disabled limiter admits every request.
    pub enabled: bool,

    /// Relative priority, informational only (carried into the audit store).
    pub priority: i64,
}

impl RateLimitConfig {
    /// Creates a config with the default burst of twice the rate.
    pub fn new(name: impl Into<String>, rate_per_sec: f64) -> Self {
        Self {
            name: name.into(),
            rate_per_sec,
            burst_capacity: (rate_per_sec * 2.0).ceil(),
            strategy: Strategy::TokenBucket,
            scope: Scope::Global,
            retry_after_seconds: 1.0,
            enabled: true,
            priority: 0,
        }
    }

    /// Sets the burst capacity explicitly.
    pub fn with_burst(mut self, burst_capacity: f64) -> Self {
        self.burst_capacity = burst_capacity;
        self
    }

    /// Selects the admission algorithm.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Selects the enforcement granularity.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the fallback retry-after hint in seconds.
    pub fn with_retry_after(mut self, seconds: f64) -> Self {
        self.retry_after_seconds = seconds;
        self
    }

    /// Sets the informational priority.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Checks the parameters for consistency.
    ///
    /// # Errors
    ///
    /// Fails when the name is empty, the rate or burst is not a positive
    /// finite number, or the retry-after hint is negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::new("limiter name must not be empty"));
        }
        if !self.rate_per_sec.is_finite() || self.rate_per_sec <= 0.0 {
            return Err(ConfigError::new(format!(
                "rate_per_sec must be a positive finite number, got {}",
                self.rate_per_sec
            )));
        }
        if !self.burst_capacity.is_finite() || self.burst_capacity < 1.0 {
            return Err(ConfigError::new(format!(
                "burst_capacity must be at least 1, got {}",
                self.burst_capacity
            )));
        }
        if self.retry_after_seconds < 0.0 {
            return Err(ConfigError::new("retry_after_seconds must not be negative"));
        }
        Ok(())
    }

    /// Window length used when this config runs on the sliding-window engine.
    ///
    /// The burst is the occupancy limit; the window length is chosen so the
    /// sustained rate matches `rate_per_sec`.
    pub(crate) fn window_seconds(&self) -> f64 {
        self.burst_capacity / self.rate_per_sec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_burst_is_twice_rate() {
        let config = RateLimitConfig::new("api", 10.0);
        assert_eq!(config.burst_capacity, 20.0);
        assert_eq!(config.strategy, Strategy::TokenBucket);
        assert_eq!(config.scope, Scope::Global);
        assert!(config.enabled);
    }

    #[test]
    fn builder_methods() {
        let config = RateLimitConfig::new("api", 5.0)
            .with_burst(50.0)
            .with_strategy(Strategy::SlidingWindow)
            .with_scope(Scope::User)
            .with_retry_after(2.0)
            .with_priority(7);

        assert_eq!(config.burst_capacity, 50.0);
        assert_eq!(config.strategy, Strategy::SlidingWindow);
        assert_eq!(config.scope, Scope::User);
        assert_eq!(config.retry_after_seconds, 2.0);
        assert_eq!(config.priority, 7);
    }

    #[test]
    fn validation_rejects_bad_parameters() {
        assert!(RateLimitConfig::new("", 10.0).validate().is_err());
        assert!(RateLimitConfig::new("api", 0.0).validate().is_err());
        assert!(RateLimitConfig::new("api", -3.0).validate().is_err());
        assert!(RateLimitConfig::new("api", f64::NAN).validate().is_err());
        assert!(RateLimitConfig::new("api", 10.0)
            .with_burst(0.0)
            .validate()
            .is_err());
        assert!(RateLimitConfig::new("api", 10.0)
            .with_retry_after(-1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn window_seconds_matches_rate() {
        let config = RateLimitConfig::new("api", 2.0).with_burst(10.0);
        assert_eq!(config.window_seconds(), 5.0);
    }

    #[test]
    fn strategy_and_scope_names() {
        assert_eq!(Strategy::TokenBucket.as_str(), "token_bucket");
        assert_eq!(Strategy::Adaptive.as_str(), "adaptive");
        assert_eq!(Scope::Global.as_str(), "global");
        assert_eq!(Scope::Ip.as_str(), "ip");
    }
}
