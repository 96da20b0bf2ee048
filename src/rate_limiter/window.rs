//! # Sliding Window
//!
//! Exact admission counting over a trailing interval. Unlike the token
//! bucket's continuous refill, the window remembers each admitted request's
//! timestamp and prunes the ones that have aged out on every call.
//!
//! ```text
//!     window = 1s, limit = 3
//!
//!     time ──────────────────────────────────────►
//!            ▲      ▲   ▲        ▲
//!            t1     t2  t3       now
//!            └──────┴───┴── kept while > now - 1s
//!
//!     count < 3 → admit, record now
//!     count = 3 → deny, wait = t1 + 1s - now
//! ```
//!
//! Pruning is O(occupancy) per call, which stays cheap because occupancy is
//! bounded by the configured limit.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use super::bucket::Verdict;

/// Sliding-window rate limiter: at most `limit` admissions per trailing
/// `window` interval, counted exactly.
///
/// Each `acquire` admits a single request. There is no fractional cost here;
/// the window counts requests, not tokens.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use gavel::SlidingWindow;
///
/// let window = SlidingWindow::new(3, Duration::from_secs(1));
/// assert!(window.acquire().allowed);
/// assert!(window.acquire().allowed);
/// assert!(window.acquire().allowed);
///
/// let verdict = window.acquire();
/// assert!(!verdict.allowed);
/// assert!(verdict.wait_seconds() > 0.0);
/// ```
pub struct SlidingWindow {
    /// Admission timestamps, oldest first. All retained entries satisfy
    /// `timestamp > now - window` after each prune.
    timestamps: Mutex<VecDeque<Instant>>,

    limit: usize,
    window: Duration,

    total_acquired: AtomicU64,
    total_rejected: AtomicU64,
}

impl SlidingWindow {
    /// Creates an empty window. A zero limit is bumped to 1.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            timestamps: Mutex::new(VecDeque::with_capacity(limit.max(1))),
            limit: limit.max(1),
            window,
            total_acquired: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
        }
    }

    /// Attempts to admit one request.
    ///
    /// Denials report the time until the oldest retained admission ages out,
    /// which is exactly when one slot frees up.
    pub fn acquire(&self) -> Verdict {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock().expect("sliding window lock poisoned");
        Self::prune(&mut timestamps, now, self.window);

        if timestamps.len() < self.limit {
            timestamps.push_back(now);
            self.total_acquired.fetch_add(1, Ordering::Relaxed);
            Verdict::allow()
        } else {
            // Non-empty here: limit >= 1 and len >= limit.
            let oldest = timestamps[0];
            let wait = (oldest + self.window).saturating_duration_since(now);
            self.total_rejected.fetch_add(1, Ordering::Relaxed);
            Verdict::deny(wait)
        }
    }

    /// Single sleep-and-retry form of [`acquire`](Self::acquire).
    ///
    /// Same contract as the token bucket's async path: on denial, one sleep
    /// for the reported wait and one retry. The freed slot may go to another
    /// caller during the sleep.
    pub async fn acquire_async(&self) -> bool {
        let verdict = self.acquire();
        if verdict.allowed {
            return true;
        }
        if verdict.wait.is_zero() {
            return false;
        }
        debug!(wait_ms = verdict.wait.as_millis() as u64, "sliding window waiting for a slot");
        tokio::time::sleep(verdict.wait).await;
        self.acquire().allowed
    }

    /// Number of admissions currently inside the window.
    pub fn occupancy(&self) -> usize {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock().expect("sliding window lock poisoned");
        Self::prune(&mut timestamps, now, self.window);
        timestamps.len()
    }

    /// Maximum admissions per window.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Window length.
    #[inline]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Estimated wait before a slot frees up, for state snapshots.
    pub(crate) fn wait_hint(&self) -> Duration {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock().expect("sliding window lock poisoned");
        Self::prune(&mut timestamps, now, self.window);

        if timestamps.len() < self.limit {
            Duration::ZERO
        } else {
            (timestamps[0] + self.window).saturating_duration_since(now)
        }
    }

    /// Lifetime (admitted, denied) request counts.
    pub fn counters(&self) -> (u64, u64) {
        (
            self.total_acquired.load(Ordering::Relaxed),
            self.total_rejected.load(Ordering::Relaxed),
        )
    }

    /// Forgets all admissions and zeroes the counters.
    pub fn reset(&self) {
        self.timestamps
            .lock()
            .expect("sliding window lock poisoned")
            .clear();
        self.total_acquired.store(0, Ordering::Relaxed);
        self.total_rejected.store(0, Ordering::Relaxed);
    }

    /// Drops timestamps that have aged out of the window.
    fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

impl std::fmt::Debug for SlidingWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindow")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("occupancy", &self.occupancy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn admits_up_to_limit() {
        let window = SlidingWindow::new(3, Duration::from_secs(1));
        assert!(window.acquire().allowed);
        assert!(window.acquire().allowed);
        assert!(window.acquire().allowed);
        assert!(!window.acquire().allowed);
        assert_eq!(window.occupancy(), 3);
    }

    #[test]
    fn denial_wait_points_at_oldest_expiry() {
        let window = SlidingWindow::new(2, Duration::from_millis(500));
        window.acquire();
        window.acquire();

        let verdict = window.acquire();
        assert!(!verdict.allowed);
        let wait = verdict.wait_seconds();
        assert!(wait > 0.4 && wait <= 0.5, "wait was {wait}");
    }

    #[test]
    fn slots_free_up_as_admissions_age_out() {
        let window = SlidingWindow::new(2, Duration::from_millis(100));
        assert!(window.acquire().allowed);
        assert!(window.acquire().allowed);
        assert!(!window.acquire().allowed);

        thread::sleep(Duration::from_millis(120));
        assert_eq!(window.occupancy(), 0);
        assert!(window.acquire().allowed);
    }

    #[test]
    fn never_exceeds_limit_within_any_window() {
        let window = SlidingWindow::new(5, Duration::from_millis(200));
        let mut admitted = 0;
        for _ in 0..50 {
            if window.acquire().allowed {
                admitted += 1;
            }
        }
        // The loop finishes well inside one window length.
        assert_eq!(admitted, 5);
        assert_eq!(window.occupancy(), 5);
    }

    #[test]
    fn reset_empties_the_window() {
        let window = SlidingWindow::new(2, Duration::from_secs(10));
        window.acquire();
        window.acquire();
        window.reset();

        assert_eq!(window.occupancy(), 0);
        assert!(window.acquire().allowed);
        assert_eq!(window.counters(), (1, 0));
    }

    #[test]
    fn concurrent_acquires_respect_the_limit() {
        let window = Arc::new(SlidingWindow::new(4, Duration::from_secs(5)));
        let mut handles = vec![];

        for _ in 0..12 {
            let window = window.clone();
            handles.push(thread::spawn(move || window.acquire().allowed));
        }

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();

        assert_eq!(admitted, 4);
    }

    #[tokio::test]
    async fn acquire_async_waits_for_a_slot() {
        let window = SlidingWindow::new(1, Duration::from_millis(80));
        assert!(window.acquire().allowed);

        let start = Instant::now();
        let admitted = window.acquire_async().await;

        assert!(admitted);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
