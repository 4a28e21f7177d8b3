//! Criterion benchmarks for the verification engine.
//!
//! Run with: cargo bench -p verifpal-engine

use criterion::{criterion_group, criterion_main, Criterion};
use std::fs;
use std::path::PathBuf;
use verifpal_engine::{verify, VerifyConfig};
use verifpal_model::{lower, sanity, Model};

fn models_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("models")
}

fn load_model(name: &str) -> Model {
    let source = fs::read_to_string(models_dir().join(name)).unwrap();
    let ast = verifpal_syntax::parse(&source).unwrap();
    lower(&ast, name).unwrap()
}

fn bench_sanity(c: &mut Criterion, name: &str) {
    let model = load_model(name);
    c.bench_function(&format!("sanity/{name}"), |b| {
        b.iter(|| sanity(&model).unwrap())
    });
}

fn bench_verify(c: &mut Criterion, name: &str) {
    let model = load_model(name);
    let config = VerifyConfig::default();
    c.bench_function(&format!("verify/{name}"), |b| {
        b.iter(|| verify(&model, &config).unwrap())
    });
}

fn benchmarks(c: &mut Criterion) {
    bench_sanity(c, "dh_unsigned.vp");
    bench_verify(c, "trivial.vp");
    bench_verify(c, "encrypted.vp");
    bench_verify(c, "dh_passive.vp");
    bench_verify(c, "dh_unsigned.vp");
    bench_verify(c, "mac.vp");
}

criterion_group!(benches, benchmarks);
criterion_main!(benches);
