//! # Token Bucket
//!
//! The core admission primitive: a capped pool of fractional tokens that
//! refills continuously at a fixed rate. Refill is lazy: tokens are
//! credited at the moment of each `acquire` from the elapsed time, so no
//! background task ever runs.
//!
//! ```text
//!     acquire(n) flow:
//!
//!     credit elapsed·rate ──► tokens ≥ n? ──yes──► subtract ──► ✅ allowed
//!                                  │
//!                                  no
//!                                  ▼
//!                     ❌ denied, wait = (n - tokens) / rate
//!                        (tokens untouched)
//! ```
//!
//! A denial never mutates the pool: the wait value is a hint, not a
//! reservation. Two callers told to wait 100ms may race for the same
//! refilled tokens; that race is accepted and bounded by burst sizing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Outcome of an admission check.
///
/// Capacity exhaustion is data, not an error: a denied verdict carries the
/// estimated wait until enough tokens will have refilled. The caller decides
/// whether to sleep, queue, or reject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    /// Whether the request was admitted.
    pub allowed: bool,
    /// Estimated time until admission would succeed. Zero when allowed.
    pub wait: Duration,
}

impl Verdict {
    /// An admitted request.
    #[inline]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            wait: Duration::ZERO,
        }
    }

    /// A denied request with a wait hint.
    #[inline]
    pub fn deny(wait: Duration) -> Self {
        Self {
            allowed: false,
            wait,
        }
    }

    /// The wait hint as fractional seconds.
    #[inline]
    pub fn wait_seconds(&self) -> f64 {
        self.wait.as_secs_f64()
    }
}

/// Mutable bucket state, guarded by one mutex.
///
/// Invariant: `0 ≤ tokens ≤ capacity` at every release of the lock.
struct BucketState {
    tokens: f64,
    last_update: Instant,
}

/// Token-bucket rate limiter with lazy refill.
///
/// Thread-safe: the fractional token pool sits behind a mutex whose critical
/// section is a handful of float operations; lifetime counters are plain
/// atomics outside it.
///
/// # Example
///
/// ```rust
/// use gavel::TokenBucket;
///
/// // 10 tokens/second sustained, bursts up to 5.
/// let bucket = TokenBucket::new(10.0, 5.0);
///
/// let verdict = bucket.acquire(1.0);
/// assert!(verdict.allowed);
/// ```
pub struct TokenBucket {
    state: Mutex<BucketState>,

    /// Tokens credited per second.
    rate: f64,

    /// Maximum tokens the pool can hold (burst capacity).
    capacity: f64,

    // Lifetime counters, read by state snapshots.
    total_acquired: AtomicU64,
    total_rejected: AtomicU64,
}

impl TokenBucket {
    /// Creates a bucket that starts full.
    ///
    /// Degenerate parameters are clamped rather than rejected here; validated
    /// construction goes through
    /// [`RateLimitConfig`](crate::RateLimitConfig) and the registry.
    pub fn new(rate: f64, capacity: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        let capacity = if capacity.is_finite() && capacity >= 1.0 {
            capacity
        } else {
            1.0
        };

        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_update: Instant::now(),
            }),
            rate,
            capacity,
            total_acquired: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
        }
    }

    /// Attempts to take `n` tokens.
    ///
    /// Credits the refill for the elapsed time first, then either subtracts
    /// `n` (allowed) or leaves the pool untouched and reports how long until
    /// `n` tokens will have accumulated.
    ///
    /// Requesting more than the capacity can never succeed; the verdict still
    /// carries the nominal `(n - tokens) / rate` hint so callers can spot the
    /// misconfiguration in logs.
    pub fn acquire(&self, n: f64) -> Verdict {
        let mut state = self.state.lock().expect("token bucket lock poisoned");
        self.refill(&mut state);

        if state.tokens >= n {
            state.tokens -= n;
            self.total_acquired.fetch_add(1, Ordering::Relaxed);
            Verdict::allow()
        } else {
            let wait = (n - state.tokens) / self.rate;
            self.total_rejected.fetch_add(1, Ordering::Relaxed);
            Verdict::deny(Duration::from_secs_f64(wait.max(0.0)))
        }
    }

    /// Single sleep-and-retry form of [`acquire`](Self::acquire).
    ///
    /// On denial, sleeps the reported wait once and tries again exactly once.
    /// This is best-effort: another waiter may consume the refilled tokens
    /// during the sleep, in which case the retry fails too. There is no
    /// retry loop by design.
    pub async fn acquire_async(&self, n: f64) -> bool {
        let verdict = self.acquire(n);
        if verdict.allowed {
            return true;
        }
        if verdict.wait.is_zero() {
            return false;
        }
        debug!(wait_ms = verdict.wait.as_millis() as u64, "token bucket waiting for refill");
        tokio::time::sleep(verdict.wait).await;
        self.acquire(n).allowed
    }

    /// Current token count after crediting the pending refill.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().expect("token bucket lock poisoned");
        self.refill(&mut state);
        state.tokens
    }

    /// Burst capacity this bucket was built with.
    #[inline]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Sustained refill rate in tokens per second.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Lifetime (admitted, denied) request counts.
    pub fn counters(&self) -> (u64, u64) {
        (
            self.total_acquired.load(Ordering::Relaxed),
            self.total_rejected.load(Ordering::Relaxed),
        )
    }

    /// Refills the pool to capacity and zeroes the counters.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("token bucket lock poisoned");
        state.tokens = self.capacity;
        state.last_update = Instant::now();
        self.total_acquired.store(0, Ordering::Relaxed);
        self.total_rejected.store(0, Ordering::Relaxed);
    }

    /// Credits `elapsed · rate` tokens, capped at capacity.
    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_update).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
            state.last_update = now;
        }
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("rate", &self.rate)
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}
