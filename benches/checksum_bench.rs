use criterion::{black_box, criterion_group, criterion_main, Criterion};
use md5pack::archive::{store, PackOptions};
use md5pack::checksum::digest_reader;
use md5pack::integrity::check;
use std::io::Cursor;

fn bench_digest(c: &mut Criterion) {
    let data = vec![0u8; 1024 * 1024];

    c.bench_function("md5_digest_1mb", |b| {
        b.iter(|| digest_reader(Cursor::new(black_box(&data))).unwrap())
    });
}

fn bench_store_and_check(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("bench.bin");
    std::fs::write(&source, vec![42u8; 1024 * 1024]).unwrap();
    let opts = PackOptions::default();

    c.bench_function("store_1mb", |b| {
        b.iter(|| store(black_box(&source), &opts).unwrap())
    });

    let container = store(&source, &opts).unwrap().path;
    c.bench_function("check_1mb", |b| {
        b.iter(|| check(black_box(&container)).unwrap())
    });
}

criterion_group!(benches, bench_digest, bench_store_and_check);
criterion_main!(benches);
