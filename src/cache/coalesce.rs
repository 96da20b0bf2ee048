//! # Fetch Coalescing
//!
//! The miss path of the cache: at most one outbound fetch per
//! `(namespace, key)` at any moment, no matter how many tasks ask.
//!
//! ```text
//!     task A ──get_or_fetch──► miss ──► registers episode, runs fetcher
//!     task B ──get_or_fetch──► miss ──► finds episode, awaits A's result
//!     task C ──get_or_fetch──► miss ──► finds episode, awaits A's result
//!                                          │
//!     fetcher resolves once ◄──────────────┘
//!     A caches it; A, B, C all receive the same value (or the same error)
//! ```
//!
//! An episode is a broadcast channel in the pending map, keyed
//! `namespace:key`. Registration, subscription, and resolution all happen
//! under the map's mutex, so a task either subscribes before the result is
//! sent or finds no episode and starts a fresh one. The episode entry is
//! always gone before `get_or_fetch` returns, success or failure, so the
//! next miss retries cleanly.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::store::ApiCache;
use crate::error::FetchError;

/// Removes a pending episode when its leader is dropped mid-fetch.
///
/// Dropping the sender closes the channel, so co-waiters observe the
/// cancellation instead of hanging, and the next caller starts over.
struct EpisodeGuard<'a> {
    cache: &'a ApiCache,
    dedup_key: String,
}

impl Drop for EpisodeGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.cache.pending.lock().expect("pending map lock poisoned");
        pending.remove(&self.dedup_key);
    }
}

impl ApiCache {
    /// Returns the cached value or fetches it, de-duplicating concurrent
    /// identical requests.
    ///
    /// On a miss, exactly one caller (the leader) runs `fetcher`; every
    /// other concurrent caller for the same `(namespace, key)` awaits the
    /// leader's outcome. All of them observe the identical value or the
    /// identical error. The fetcher's error is propagated unmodified; the
    /// cache never retries on its own.
    ///
    /// Cancelling a waiter affects nobody else. Cancelling the leader
    /// surfaces an error to the waiters and clears the episode so the next
    /// call starts fresh.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        fetcher: F,
        ttl: Option<Duration>,
    ) -> Result<Value, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>>,
    {
        self.get_or_fetch_gated(namespace, key, fetcher, ttl, |_| true)
            .await
    }

    /// [`get_or_fetch`](Self::get_or_fetch) with a predicate gating whether
    /// the fetched value is cache-worthy. Waiters still receive ungated
    /// values; they just are not stored.
    pub(crate) async fn get_or_fetch_gated<F, Fut, G>(
        &self,
        namespace: &str,
        key: &str,
        fetcher: F,
        ttl: Option<Duration>,
        cache_if: G,
    ) -> Result<Value, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>>,
        G: Fn(&Value) -> bool,
    {
        if let Some(value) = self.get(namespace, key) {
            return Ok(value);
        }

        let dedup_key = format!("{namespace}:{key}");

        // Join an in-flight episode, or open one. Subscription and
        // registration happen under the lock, so no resolution can slip
        // between them.
        let waiter = {
            let mut pending = self.pending.lock().expect("pending map lock poisoned");
            match pending.get(&dedup_key) {
                Some(sender) => Some(sender.subscribe()),
                None => {
                    // The previous leader may have resolved between the miss
                    // above and taking this lock.
                    if let Some(value) = self.get(namespace, key) {
                        return Ok(value);
                    }
                    let (sender, _) = broadcast::channel(1);
                    pending.insert(dedup_key.clone(), sender);
                    None
                }
            }
        };

        if let Some(mut receiver) = waiter {
            debug!(namespace, key, "awaiting in-flight fetch");
            return match receiver.recv().await {
                Ok(outcome) => outcome,
                Err(_) => Err(FetchError::msg("in-flight fetch was cancelled")),
            };
        }

        let guard = EpisodeGuard {
            cache: self,
            dedup_key: dedup_key.clone(),
        };

        debug!(namespace, key, "fetching on cache miss");
        let outcome = fetcher().await;

        if let Ok(value) = &outcome {
            if cache_if(value) {
                self.set(namespace, key, value.clone(), ttl);
            }
        }

        {
            let mut pending = self.pending.lock().expect("pending map lock poisoned");
            if let Some(sender) = pending.remove(&dedup_key) {
                // No receivers is fine; send only fails when nobody waited.
                let _ = sender.send(outcome.clone());
            }
        }
        drop(guard);

        outcome
    }

    /// Fetches many keys, going outbound only for the ones not already
    /// cached and fresh.
    ///
    /// Cached keys are answered locally; the remainder goes to
    /// `batch_fetcher` in one call, and its results are cached and merged
    /// into the returned map. A key the fetcher does not return is simply
    /// absent from the result.
    ///
    /// Concurrent calls to this method are not de-duplicated against each
    /// other; two overlapping batches may both fetch the same missing key.
    pub async fn batch_get_or_fetch<F, Fut>(
        &self,
        namespace: &str,
        keys: &[String],
        batch_fetcher: F,
        ttl: Option<Duration>,
    ) -> Result<HashMap<String, Value>, FetchError>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Result<HashMap<String, Value>, FetchError>>,
    {
        let mut results = HashMap::new();
        let mut missing = Vec::new();
        for key in keys {
            match self.get(namespace, key) {
                Some(value) => {
                    results.insert(key.clone(), value);
                }
                None => missing.push(key.clone()),
            }
        }

        if missing.is_empty() {
            return Ok(results);
        }

        debug!(
            namespace,
            cached = results.len(),
            missing = missing.len(),
            "batch fetch"
        );
        let fetched = batch_fetcher(missing).await?;
        for (key, value) in fetched {
            self.set(namespace, &key, value.clone(), ttl);
            results.insert(key, value);
        }
        Ok(results)
    }
}

/// Runs named fetches concurrently, isolating per-source failures.
///
/// Every fetch runs to completion regardless of the others. A failed source
/// is logged and yields `None`; it never blocks or poisons its siblings.
pub async fn parallel_fetch(
    fetches: Vec<(String, BoxFuture<'_, Result<Value, FetchError>>)>,
) -> HashMap<String, Option<Value>> {
    let (names, futures): (Vec<_>, Vec<_>) = fetches.into_iter().unzip();
    let outcomes = join_all(futures).await;

    names
        .into_iter()
        .zip(outcomes)
        .map(|(name, outcome)| match outcome {
            Ok(value) => (name, Some(value)),
            Err(err) => {
                warn!(source = %name, error = %err, "parallel fetch source failed");
                (name, None)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_misses_share_one_fetch() {
        let cache = Arc::new(ApiCache::default());
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..5 {
            let cache = cache.clone();
            let fetches = fetches.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("jupiter", "SOL", move || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(json!({"price": 100.5}))
                    }, None)
                    .await
            }));
        }

        for handle in handles {
            let value = handle.await.unwrap().unwrap();
            assert_eq!(value, json!({"price": 100.5}));
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_failure_reaches_every_waiter_and_clears_the_episode() {
        let cache = Arc::new(ApiCache::default());
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..3 {
            let cache = cache.clone();
            let fetches = fetches.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("jupiter", "SOL", move || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(FetchError::msg("upstream 503"))
                    }, None)
                    .await
            }));
        }

        for handle in handles {
            let outcome = handle.await.unwrap();
            assert!(outcome.unwrap_err().to_string().contains("upstream 503"));
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // A failed episode leaves nothing cached and nothing pending; the
        // next call fetches again.
        let value = cache
            .get_or_fetch("jupiter", "SOL", || async { Ok(json!(42)) }, None)
            .await
            .unwrap();
        assert_eq!(value, json!(42));
    }

    #[tokio::test]
    async fn hit_never_invokes_the_fetcher() {
        let cache = ApiCache::default();
        cache.set("jupiter", "SOL", json!(1), None);

        let value = cache
            .get_or_fetch("jupiter", "SOL", || async {
                panic!("fetcher must not run on a hit")
            }, None)
            .await
            .unwrap();
        assert_eq!(value, json!(1));
    }

    #[tokio::test]
    async fn fetched_value_lands_in_the_cache() {
        let cache = ApiCache::default();
        cache
            .get_or_fetch("jupiter", "SOL", || async { Ok(json!(7)) }, None)
            .await
            .unwrap();

        assert_eq!(cache.get("jupiter", "SOL"), Some(json!(7)));
    }

    #[tokio::test]
    async fn gated_value_is_returned_but_not_stored() {
        let cache = ApiCache::default();
        let value = cache
            .get_or_fetch_gated(
                "jupiter",
                "SOL",
                || async { Ok(json!(null)) },
                None,
                |v| !v.is_null(),
            )
            .await
            .unwrap();

        assert_eq!(value, json!(null));
        assert_eq!(cache.get("jupiter", "SOL"), None);
    }

    #[tokio::test]
    async fn batch_fetches_only_missing_keys() {
        let cache = ApiCache::default();
        cache.set("jupiter", "SOL", json!(1), None);
        cache.set("jupiter", "BONK", json!(2), None);

        let keys: Vec<String> = ["SOL", "BONK", "WIF", "JTO"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let results = cache
            .batch_get_or_fetch("jupiter", &keys, |missing| async move {
                let mut sorted = missing.clone();
                sorted.sort();
                assert_eq!(sorted, vec!["JTO", "WIF"]);
                Ok(missing.into_iter().map(|k| (k, json!(9))).collect())
            }, None)
            .await
            .unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(results["SOL"], json!(1));
        assert_eq!(results["WIF"], json!(9));
        // Fetched keys were cached for next time.
        assert_eq!(cache.get("jupiter", "JTO"), Some(json!(9)));
    }

    #[tokio::test]
    async fn batch_with_everything_cached_skips_the_fetcher() {
        let cache = ApiCache::default();
        cache.set("jupiter", "SOL", json!(1), None);

        let results = cache
            .batch_get_or_fetch(
                "jupiter",
                &["SOL".to_string()],
                |_missing: Vec<String>| async move {
                    panic!("batch fetcher must not run when everything is cached")
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(results["SOL"], json!(1));
    }

    #[tokio::test]
    async fn parallel_fetch_isolates_failures() {
        let results = parallel_fetch(vec![
            (
                "price".to_string(),
                async { Ok(json!(100.5)) }.boxed(),
            ),
            (
                "sentiment".to_string(),
                async { Err(FetchError::msg("feed down")) }.boxed(),
            ),
            (
                "volume".to_string(),
                async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(json!(12345))
                }
                .boxed(),
            ),
        ])
        .await;

        assert_eq!(results["price"], Some(json!(100.5)));
        assert_eq!(results["sentiment"], None);
        assert_eq!(results["volume"], Some(json!(12345)));
    }
}
