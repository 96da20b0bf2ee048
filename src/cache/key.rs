//! # Cache Key Derivation
//!
//! Zero-boilerplate "cache this call" support: a stable key from a function
//! identity plus its arguments, and [`CachedCall`] wrapping the whole
//! look-aside pattern.
//!
//! Keys must be stable across processes and argument orderings, so argument
//! objects are serialized with their keys sorted recursively. Long keys are
//! collapsed to a SHA-256 digest to keep them fixed-length.

use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::store::ApiCache;
use crate::error::FetchError;

/// Serialized keys longer than this are replaced by a digest.
const MAX_LITERAL_KEY_LEN: usize = 100;

/// Canonical JSON text for `value`: object keys sorted recursively, no
/// whitespace. Equal values always produce equal text.
pub fn canonical_json(value: &Value) -> String {
    fn canonicalize(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                out.push('{');
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&Value::String((*key).clone()).to_string());
                    out.push(':');
                    canonicalize(&map[*key], out);
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    canonicalize(item, out);
                }
                out.push(']');
            }
            other => out.push_str(&other.to_string()),
        }
    }

    let mut out = String::new();
    canonicalize(value, &mut out);
    out
}

/// Derives the cache key for `function` called with `args`.
///
/// Short keys stay readable (`function:{"mint":"SOL"}`); anything whose
/// serialized form exceeds [`MAX_LITERAL_KEY_LEN`] characters becomes
/// `function:<sha256 hex>`.
pub fn cache_key(function: &str, args: &Value) -> String {
    let serialized = canonical_json(args);
    if serialized.len() > MAX_LITERAL_KEY_LEN {
        let digest = Sha256::digest(serialized.as_bytes());
        format!("{function}:{}", hex::encode(digest))
    } else {
        format!("{function}:{serialized}")
    }
}

type KeyFn = Box<dyn Fn(&Value) -> String + Send + Sync>;
type CacheIf = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// Reusable "cache this function's result" wrapper.
///
/// Binds a namespace and function identity once; each
/// [`invoke`](CachedCall::invoke) derives the key from the arguments, checks
/// the cache, and coalesces concurrent identical fetches. Supports a custom
/// key function and a predicate gating whether a result is worth caching.
///
/// # Example
///
/// ```rust,no_run
/// use serde_json::{json, Value};
/// use gavel::{ApiCache, CachedCall, FetchError};
///
/// # async fn example() -> Result<(), FetchError> {
/// let cache = ApiCache::default();
/// let quote = CachedCall::new("jupiter_api", "get_quote")
///     .with_cache_if(|v: &Value| !v.is_null());
///
/// let price = quote
///     .invoke(&cache, json!({"mint": "SOL"}), |args| async move {
///         // ... call the provider with `args` ...
///         # let _ = args;
///         Ok(json!({"price": 100.5}))
///     })
///     .await?;
/// # let _ = price;
/// # Ok(())
/// # }
/// ```
pub struct CachedCall {
    namespace: String,
    function: String,
    ttl: Option<Duration>,
    key_fn: Option<KeyFn>,
    cache_if: Option<CacheIf>,
}

impl CachedCall {
    pub fn new(namespace: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            function: function.into(),
            ttl: None,
            key_fn: None,
            cache_if: None,
        }
    }

    /// Overrides the namespace's default TTL for results of this call.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Replaces the canonical key derivation with a custom function.
    pub fn with_key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.key_fn = Some(Box::new(key_fn));
        self
    }

    /// Only results satisfying the predicate are stored; others are still
    /// returned to the caller.
    pub fn with_cache_if<F>(mut self, cache_if: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.cache_if = Some(Box::new(cache_if));
        self
    }

    /// The key this call derives for `args`.
    pub fn key_for(&self, args: &Value) -> String {
        match &self.key_fn {
            Some(key_fn) => key_fn(args),
            None => cache_key(&self.function, args),
        }
    }

    /// Runs the look-aside pattern: derive the key, check the cache, and on
    /// a miss run `fetcher` with the arguments (coalesced with concurrent
    /// identical invocations).
    pub async fn invoke<F, Fut>(
        &self,
        cache: &ApiCache,
        args: Value,
        fetcher: F,
    ) -> Result<Value, FetchError>
    where
        F: FnOnce(Value) -> Fut,
        Fut: std::future::Future<Output = Result<Value, FetchError>>,
    {
        let key = self.key_for(&args);
        cache
            .get_or_fetch_gated(
                &self.namespace,
                &key,
                move || fetcher(args),
                self.ttl,
                |value| self.cache_if.as_ref().map_or(true, |p| p(value)),
            )
            .await
    }
}
