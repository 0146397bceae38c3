//! Record framer benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use offsetlog_bench::utils::random_data;
use offsetlog_core::frame::{frame, scan_next, scan_prev, unframe};

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    for size in [64, 1024, 16384] {
        group.throughput(Throughput::Bytes(size as u64));
        let payload = random_data(size);
        let framed = frame(&payload).unwrap();

        group.bench_with_input(BenchmarkId::new("frame", size), &payload, |b, payload| {
            b.iter(|| black_box(frame(black_box(payload)).unwrap()));
        });
        // unframe checks the CRC, so this is dominated by the checksum
        group.bench_with_input(BenchmarkId::new("unframe", size), &framed, |b, framed| {
            b.iter(|| black_box(unframe(black_box(framed), 0).unwrap()));
        });
    }

    group.finish();
}

/// Walk 1000 frames in both directions without checksums.
fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    let payload = random_data(128);
    let mut buffer = Vec::new();
    for _ in 0..1000 {
        buffer.extend_from_slice(&frame(&payload).unwrap());
    }

    group.bench_function("next_1000", |b| {
        b.iter(|| {
            let mut at = 0;
            while at < buffer.len() {
                at = scan_next(black_box(&buffer), at).unwrap();
            }
            black_box(at);
        });
    });

    group.bench_function("prev_1000", |b| {
        b.iter(|| {
            let mut end = buffer.len();
            while end > 0 {
                end = scan_prev(black_box(&buffer), end).unwrap();
            }
            black_box(end);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_frame, bench_scan);

criterion_main!(benches);
