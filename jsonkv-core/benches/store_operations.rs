use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use jsonkv_core::{LocalStore, StoreConfig};
use rand::Rng;
use serde_json::json;
use std::time::Duration;
use tempfile::tempdir;

fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_create");
    group.measurement_time(Duration::from_secs(10));

    // Every create rewrites the whole table, so cost grows with table size
    for existing in [0usize, 100, 1_000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(existing), &existing, |b, &existing| {
            let dir = tempdir().unwrap();
            let store = LocalStore::open(StoreConfig::in_directory(dir.path())).unwrap();
            for i in 0..existing {
                store.create(&format!("seed-{}", i), json!({ "n": i }), None).unwrap();
            }

            let mut rng = rand::rng();
            b.iter(|| {
                let key = format!("k-{}", rng.random::<u64>());
                store.create(black_box(&key), json!("value"), Some(3_600)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_read");

    let dir = tempdir().unwrap();
    let store = LocalStore::open(StoreConfig::in_directory(dir.path())).unwrap();
    for i in 0..1_000 {
        let value = json!({ "n": i, "tags": ["a", "b"] });
        store.create(&format!("key-{}", i), value, None).unwrap();
    }

    group.bench_function("read_hit", |b| {
        let mut rng = rand::rng();
        b.iter(|| {
            let key = format!("key-{}", rng.random_range(0..1_000));
            black_box(store.read(&key).unwrap())
        });
    });

    group.bench_function("display_all_1000", |b| {
        b.iter(|| black_box(store.display_all().unwrap()));
    });

    group.finish();
}

fn bench_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_open");

    let dir = tempdir().unwrap();
    {
        let store = LocalStore::open(StoreConfig::in_directory(dir.path())).unwrap();
        for i in 0..5_000 {
            store.create(&format!("key-{}", i), json!("x".repeat(100)), None).unwrap();
        }
    }

    group.bench_function("load_5000", |b| {
        b.iter(|| {
            let config = StoreConfig::in_directory(dir.path());
            black_box(LocalStore::open(config).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_create, bench_read, bench_open);
criterion_main!(benches);
