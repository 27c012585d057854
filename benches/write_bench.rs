// Write performance benchmarks for TCDB

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use tcdb::{Options, DB};
use tempfile::TempDir;

fn benchmark_sequential_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_insert");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let temp_dir = TempDir::new().unwrap();
                let db = DB::open(temp_dir.path(), Options::default()).unwrap();

                for i in 0..size {
                    let key = format!("key{:08}", i);
                    let value = format!("value{:08}", i);
                    db.insert(key.as_bytes(), value.as_bytes()).unwrap();
                }

                black_box(&db);
            });
        });
    }

    group.finish();
}

fn benchmark_random_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_insert");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let temp_dir = TempDir::new().unwrap();
                let db = DB::open(temp_dir.path(), Options::default()).unwrap();

                use rand::Rng;
                let mut rng = rand::rng();

                for _ in 0..size {
                    let key_num: u32 = rng.random();
                    let key = format!("key{:08}", key_num);
                    let value = format!("value{:08}", key_num);
                    db.insert(key.as_bytes(), value.as_bytes()).unwrap();
                }

                black_box(&db);
            });
        });
    }

    group.finish();
}

fn benchmark_flush_and_compaction(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush_and_compaction");
    group.sample_size(10);

    // Small memtables force a flush every few hundred writes and a level-0
    // compaction every fourth flush.
    group.throughput(Throughput::Elements(20_000));
    group.bench_function("insert_20000_small_memtable", |b| {
        b.iter(|| {
            let temp_dir = TempDir::new().unwrap();
            let opts = Options::default().memtable_size(32 * 1024).sst_file_size(64 * 1024);
            let db = DB::open(temp_dir.path(), opts).unwrap();

            for i in 0..20_000u32 {
                let key = format!("key{:08}", i);
                db.insert(key.as_bytes(), &[b'x'; 100]).unwrap();
            }

            black_box(&db);
        });
    });

    group.finish();
}

fn benchmark_overwrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("overwrite");

    group.throughput(Throughput::Elements(1000));
    group.bench_function("overwrite_1000", |b| {
        let temp_dir = TempDir::new().unwrap();
        let db = DB::open(temp_dir.path(), Options::default()).unwrap();

        for i in 0..1000 {
            let key = format!("key{:08}", i);
            let value = format!("initial_value{:08}", i);
            db.insert(key.as_bytes(), value.as_bytes()).unwrap();
        }

        b.iter(|| {
            for i in 0..1000 {
                let key = format!("key{:08}", i);
                let value = format!("updated_value{:08}", i);
                db.insert(key.as_bytes(), value.as_bytes()).unwrap();
            }
            black_box(&db);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_sequential_insert,
    benchmark_random_insert,
    benchmark_flush_and_compaction,
    benchmark_overwrite
);
criterion_main!(benches);
