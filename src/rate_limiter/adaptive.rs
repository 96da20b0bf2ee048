//! # Adaptive Limiter
//!
//! A token bucket whose rate is steered by a feedback loop over observed
//! response latency and errors. The loop is deliberately gentle,
//! multiplicative-decrease with modest multiplicative growth, so the rate
//! settles instead of oscillating.
//!
//! ```text
//!     record_response(latency, success)
//!            │
//!            ▼  every 10th response:
//!     ┌──────────────────────────────────────────────┐
//!     │ error rate > 10%  or  avg latency > 1000ms   │──► rate × 0.8
//!     │ error rate < 1%   and avg latency < 200ms    │──► rate × 1.1
//!     │ otherwise                                    │──► unchanged
//!     └──────────────────────────────────────────────┘
//!            │ (clamped to [min_rate, max_rate])
//!            ▼
//!     rate changed → rebuild bucket, capacity = 2 × rate
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, info};

use super::bucket::{TokenBucket, Verdict};

/// Responses between adjustment evaluations.
const ADJUST_INTERVAL: u64 = 10;

/// Latency samples retained for the rolling average.
const LATENCY_SAMPLES: usize = 100;

const BACKOFF_FACTOR: f64 = 0.8;
const GROWTH_FACTOR: f64 = 1.1;

const ERROR_RATE_HIGH: f64 = 0.1;
const ERROR_RATE_LOW: f64 = 0.01;
const LATENCY_HIGH_MS: f64 = 1000.0;
const LATENCY_LOW_MS: f64 = 200.0;

struct AdaptiveState {
    bucket: TokenBucket,
    current_rate: f64,

    /// Rolling latency samples in milliseconds, newest last.
    latencies: VecDeque<f64>,

    successes: u64,
    errors: u64,
}

impl AdaptiveState {
    fn responses(&self) -> u64 {
        self.successes + self.errors
    }

    fn error_rate(&self) -> f64 {
        let total = self.responses();
        if total == 0 {
            0.0
        } else {
            self.errors as f64 / total as f64
        }
    }

    fn avg_latency_ms(&self) -> f64 {
        if self.latencies.is_empty() {
            0.0
        } else {
            self.latencies.iter().sum::<f64>() / self.latencies.len() as f64
        }
    }
}

/// Self-tuning rate limiter.
///
/// Admission is delegated to an owned [`TokenBucket`]; the bucket is rebuilt
/// with `capacity = 2 × rate` whenever the control loop moves the rate. A
/// rebuild starts the new bucket full, which is acceptable: rate changes are
/// rare (at most once per `ADJUST_INTERVAL` responses) and bounded.
///
/// # Example
///
/// ```rust
/// use gavel::AdaptiveLimiter;
///
/// let limiter = AdaptiveLimiter::new(10.0, 1.0, 50.0);
/// assert!(limiter.acquire(1.0).allowed);
///
/// // Healthy responses nudge the rate up over time.
/// for _ in 0..10 {
///     limiter.record_response(50.0, true);
/// }
/// assert!(limiter.current_rate() > 10.0);
/// ```
pub struct AdaptiveLimiter {
    state: Mutex<AdaptiveState>,
    initial_rate: f64,
    min_rate: f64,
    max_rate: f64,
}

impl AdaptiveLimiter {
    /// Creates a limiter starting at `initial_rate`, clamped to
    /// `[min_rate, max_rate]`.
    pub fn new(initial_rate: f64, min_rate: f64, max_rate: f64) -> Self {
        let min_rate = if min_rate.is_finite() && min_rate > 0.0 {
            min_rate
        } else {
            0.1
        };
        let max_rate = max_rate.max(min_rate);
        let rate = initial_rate.clamp(min_rate, max_rate);

        Self {
            state: Mutex::new(AdaptiveState {
                bucket: TokenBucket::new(rate, rate * 2.0),
                current_rate: rate,
                latencies: VecDeque::with_capacity(LATENCY_SAMPLES),
                successes: 0,
                errors: 0,
            }),
            initial_rate: rate,
            min_rate,
            max_rate,
        }
    }

    /// Attempts to take `n` tokens at the current adaptive rate.
    pub fn acquire(&self, n: f64) -> Verdict {
        self.state
            .lock()
            .expect("adaptive limiter lock poisoned")
            .bucket
            .acquire(n)
    }

    /// Single sleep-and-retry form of [`acquire`](Self::acquire).
    pub async fn acquire_async(&self, n: f64) -> bool {
        let verdict = self.acquire(n);
        if verdict.allowed {
            return true;
        }
        if verdict.wait.is_zero() {
            return false;
        }
        tokio::time::sleep(verdict.wait).await;
        self.acquire(n).allowed
    }

    /// Feeds one observed response into the control loop.
    ///
    /// Latency goes into a rolling window of the last `LATENCY_SAMPLES`
    /// samples. Every `ADJUST_INTERVAL`-th response the loop evaluates the
    /// error rate of that interval plus the rolling average latency, moves
    /// the rate if warranted, and starts a fresh interval; all other calls
    /// only record.
    pub fn record_response(&self, latency_ms: f64, success: bool) {
        let mut state = self.state.lock().expect("adaptive limiter lock poisoned");

        if state.latencies.len() == LATENCY_SAMPLES {
            state.latencies.pop_front();
        }
        state.latencies.push_back(latency_ms);

        if success {
            state.successes += 1;
        } else {
            state.errors += 1;
        }

        if state.responses() == ADJUST_INTERVAL {
            self.adjust(&mut state);
            state.successes = 0;
            state.errors = 0;
        }
    }

    /// Requests per second the limiter is currently admitting at.
    pub fn current_rate(&self) -> f64 {
        self.state
            .lock()
            .expect("adaptive limiter lock poisoned")
            .current_rate
    }

    /// Tokens currently available in the underlying bucket.
    pub fn available(&self) -> f64 {
        self.state
            .lock()
            .expect("adaptive limiter lock poisoned")
            .bucket
            .available()
    }

    /// Lower rate clamp.
    #[inline]
    pub fn min_rate(&self) -> f64 {
        self.min_rate
    }

    /// Upper rate clamp.
    #[inline]
    pub fn max_rate(&self) -> f64 {
        self.max_rate
    }

    /// Estimated wait before one token is available, for state snapshots.
    pub(crate) fn wait_hint(&self) -> Duration {
        let state = self.state.lock().expect("adaptive limiter lock poisoned");
        let available = state.bucket.available();
        if available >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - available) / state.current_rate)
        }
    }

    /// Restores the initial rate and forgets all feedback.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("adaptive limiter lock poisoned");
        state.current_rate = self.initial_rate;
        state.bucket = TokenBucket::new(self.initial_rate, self.initial_rate * 2.0);
        state.latencies.clear();
        state.successes = 0;
        state.errors = 0;
    }

    /// One control-loop evaluation. Caller holds the state lock.
    fn adjust(&self, state: &mut AdaptiveState) {
        let error_rate = state.error_rate();
        let avg_latency = state.avg_latency_ms();
        let old_rate = state.current_rate;

        let new_rate = if error_rate > ERROR_RATE_HIGH || avg_latency > LATENCY_HIGH_MS {
            (old_rate * BACKOFF_FACTOR).max(self.min_rate)
        } else if error_rate < ERROR_RATE_LOW && avg_latency < LATENCY_LOW_MS {
            (old_rate * GROWTH_FACTOR).min(self.max_rate)
        } else {
            old_rate
        };

        if (new_rate - old_rate).abs() > f64::EPSILON {
            info!(
                old_rate,
                new_rate,
                error_rate,
                avg_latency_ms = avg_latency,
                "adaptive rate adjusted"
            );
            state.current_rate = new_rate;
            state.bucket = TokenBucket::new(new_rate, new_rate * 2.0);
        } else {
            debug!(
                rate = old_rate,
                error_rate,
                avg_latency_ms = avg_latency,
                "adaptive rate unchanged"
            );
        }
    }
}

impl std::fmt::Debug for AdaptiveLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveLimiter")
            .field("current_rate", &self.current_rate())
            .field("min_rate", &self.min_rate)
            .field("max_rate", &self.max_rate)
            .finish()
    }
}
