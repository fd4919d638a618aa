//! Benchmarks for the cache store
//!
//! This benchmark measures:
//! - Key derivation over short and long texts
//! - put/get throughput on the in-memory medium
//! - Eviction cost when every write overflows the budget

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lingo_core::cache::{rolling_hash, CacheStore, MemoryMedium, Namespace, StoreBudget};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

const TTL: Duration = Duration::from_secs(3600);

fn bench_key_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_derivation");
    for len in [16usize, 256, 4096] {
        let text = "翻译 translation ".repeat(len / 16 + 1);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &text, |b, text| {
            b.iter(|| rolling_hash(black_box(&[text.as_str(), "zh"])))
        });
    }
    group.finish();
}

fn bench_put_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = rt.block_on(async {
        CacheStore::open(Arc::new(MemoryMedium::new()), StoreBudget::bytes(64 << 20))
            .await
            .unwrap()
    });
    let payload = vec![b'a'; 512];

    let mut group = c.benchmark_group("cache_store");
    group.throughput(Throughput::Elements(1));

    group.bench_function("put", |b| {
        let mut i = 0u64;
        b.to_async(&rt).iter(|| {
            i += 1;
            let key = i.to_string();
            let store = &store;
            let payload = &payload;
            async move {
                store
                    .put(Namespace::Translation, &[key.as_str(), "zh"], payload, TTL)
                    .await
                    .unwrap();
            }
        })
    });

    rt.block_on(async {
        store
            .put(Namespace::Translation, &["hot", "zh"], &payload, TTL)
            .await
            .unwrap();
    });
    group.bench_function("get_hit", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(store.get(Namespace::Translation, &["hot", "zh"]).await);
        })
    });
    group.bench_function("get_miss", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(store.get(Namespace::Translation, &["cold", "zh"]).await);
        })
    });
    group.finish();
}

fn bench_eviction(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = rt.block_on(async {
        CacheStore::open(Arc::new(MemoryMedium::new()), StoreBudget::bytes(64 * 1024))
            .await
            .unwrap()
    });
    let payload = vec![b'e'; 1024];

    c.bench_function("put_with_eviction", |b| {
        let mut i = 0u64;
        b.to_async(&rt).iter(|| {
            i += 1;
            let key = i.to_string();
            let store = &store;
            let payload = &payload;
            async move {
                store
                    .put(Namespace::Image, &[key.as_str()], payload, TTL)
                    .await
                    .unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_key_derivation, bench_put_get, bench_eviction);
criterion_main!(benches);
