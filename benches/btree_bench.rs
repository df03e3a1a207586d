//! B+ tree benchmarks: inserts, point lookups and range scans through the
//! buffer pool.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pagekv::{Config, Database, EvictionPolicy, TableId};
use tempfile::TempDir;

fn populated(count: i64, pool_size: usize, policy: EvictionPolicy) -> (Database, TableId, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let config = Config::builder()
        .pool_size(pool_size)
        .eviction_policy(policy)
        .build();
    let mut db = Database::init(config).expect("init database");
    let table = db.open_table(dir.path().join("bench.db")).expect("open table");
    for key in 0..count {
        db.insert(table, key, format!("value-{key}").as_bytes())
            .expect("insert");
    }
    (db, table, dir)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree/insert");
    group.sample_size(10);

    for count in [1_000i64, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("sequential", count), &count, |b, &count| {
            b.iter(|| {
                let (db, table, dir) = populated(count, 256, EvictionPolicy::Scan);
                black_box(db.find(table, count - 1).ok());
                drop(db);
                drop(dir);
            });
        });
    }

    group.finish();
}

fn bench_point_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree/point_lookup");
    group.throughput(Throughput::Elements(1));

    for (name, policy) in [("scan", EvictionPolicy::Scan), ("lru", EvictionPolicy::Lru)] {
        let (db, table, _dir) = populated(50_000, 64, policy);
        group.bench_function(BenchmarkId::new(name, "50k"), |b| {
            let mut key = 0i64;
            b.iter(|| {
                key = (key + 7919) % 50_000;
                black_box(db.find(table, key).expect("find"))
            });
        });
    }

    group.finish();
}

fn bench_range_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree/range_scan");
    let (db, table, _dir) = populated(50_000, 256, EvictionPolicy::Scan);

    for width in [100i64, 1_000] {
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| black_box(db.find_range(table, 20_000, 20_000 + width).expect("range")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_point_lookup, bench_range_scan);
criterion_main!(benches);
