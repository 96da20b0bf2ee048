use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use gavel::{
    cache_key, ApiCache, RateLimitConfig, RateLimiterRegistry, SlidingWindow, TokenBucket,
};
use std::time::Duration;

fn bench_token_bucket(c: &mut Criterion) {
    // Rate high enough that the bench never hits a denial.
    let bucket = TokenBucket::new(1e9, 1e9);
    c.bench_function("token_bucket_acquire", |b| {
        b.iter(|| black_box(bucket.acquire(1.0)))
    });

    let empty = TokenBucket::new(1.0, 1.0);
    empty.acquire(1.0);
    c.bench_function("token_bucket_denial", |b| {
        b.iter(|| black_box(empty.acquire(1.0)))
    });
}

fn bench_sliding_window(c: &mut Criterion) {
    let window = SlidingWindow::new(1_000_000, Duration::from_millis(1));
    c.bench_function("sliding_window_acquire", |b| {
        b.iter(|| black_box(window.acquire()))
    });
}

fn bench_registry(c: &mut Criterion) {
    let registry = RateLimiterRegistry::new();
    registry
        .configure(RateLimitConfig::new("bench", 1e9).with_burst(1e9))
        .unwrap();

    c.bench_function("registry_acquire_global", |b| {
        b.iter(|| black_box(registry.acquire("bench", None)))
    });
    c.bench_function("registry_acquire_unknown", |b| {
        b.iter(|| black_box(registry.acquire("missing", None)))
    });
}

fn bench_cache(c: &mut Criterion) {
    let cache = ApiCache::default();
    cache.set("bench", "hot", json!({"price": 100.5, "volume": 12345}), None);

    c.bench_function("cache_hit", |b| {
        b.iter(|| black_box(cache.get("bench", "hot")))
    });
    c.bench_function("cache_miss", |b| {
        b.iter(|| black_box(cache.get("bench", "cold")))
    });
    c.bench_function("cache_set", |b| {
        b.iter(|| cache.set("bench", "hot", json!({"price": 100.5}), None))
    });
}

fn bench_key_derivation(c: &mut Criterion) {
    let short = json!({"mint": "SOL", "amount": 10});
    let long = json!({"mints": vec!["So11111111111111111111111111111111111111112"; 16]});

    c.bench_function("cache_key_literal", |b| {
        b.iter(|| black_box(cache_key("get_quote", &short)))
    });
    c.bench_function("cache_key_digest", |b| {
        b.iter(|| black_box(cache_key("get_quotes", &long)))
    });
}

criterion_group!(
    benches,
    bench_token_bucket,
    bench_sliding_window,
    bench_registry,
    bench_cache,
    bench_key_derivation
);
criterion_main!(benches);
