//! Codec benchmarks: CBOR against JSON on the same values.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use offsetlog_bench::utils::event_record;
use offsetlog_codec::{CborCodec, Codec, JsonCodec, Value};

/// Create a simple map value.
fn simple_map() -> Value {
    Value::map([
        ("name", Value::from("Alice")),
        ("email", Value::from("alice@example.com")),
        ("age", Value::Integer(30)),
    ])
}

/// Create a nested value.
fn nested_value(depth: usize, width: usize) -> Value {
    if depth == 0 {
        Value::from("leaf")
    } else {
        Value::map((0..width).map(|i| (format!("key_{i}"), nested_value(depth - 1, width))))
    }
}

fn codecs() -> [(&'static str, Box<dyn Codec>); 2] {
    [
        ("cbor", Box::new(CborCodec::new())),
        ("json", Box::new(JsonCodec::new())),
    ]
}

/// Benchmark encoding.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for (name, codec) in codecs() {
        let simple = simple_map();
        group.bench_function(BenchmarkId::new(name, "map_simple"), |b| {
            b.iter(|| black_box(codec.encode(black_box(&simple)).unwrap()));
        });

        let nested = nested_value(3, 5);
        group.bench_function(BenchmarkId::new(name, "nested_3x5"), |b| {
            b.iter(|| black_box(codec.encode(black_box(&nested)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark decoding.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for (name, codec) in codecs() {
        let encoded = codec.encode(&simple_map()).unwrap();
        group.bench_function(BenchmarkId::new(name, "map_simple"), |b| {
            b.iter(|| black_box(codec.decode(black_box(&encoded)).unwrap()));
        });

        let encoded = codec.encode(&nested_value(3, 5)).unwrap();
        group.bench_function(BenchmarkId::new(name, "nested_3x5"), |b| {
            b.iter(|| black_box(codec.decode(black_box(&encoded)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark CBOR byte strings of growing size.
fn bench_cbor_bytes(c: &mut Criterion) {
    let mut group = c.benchmark_group("cbor_bytes");
    let codec = CborCodec::new();

    for size in [64, 256, 1024, 4096, 16384] {
        group.throughput(Throughput::Bytes(size as u64));
        let value = event_record(0, size);
        let encoded = codec.encode(&value).unwrap();

        group.bench_with_input(BenchmarkId::new("encode", size), &value, |b, value| {
            b.iter(|| black_box(codec.encode(black_box(value)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, bytes| {
            b.iter(|| black_box(codec.decode(black_box(bytes)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_cbor_bytes);

criterion_main!(benches);
