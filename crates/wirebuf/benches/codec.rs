//! Benchmark – hex/base64 codecs and the `OutStream` record writers
#![allow(missing_docs)]

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use wirebuf::{MemBuf, PositionedBuffer, codec};

/// Deterministic pseudo-random payload of exactly `len` bytes.
fn make_payload(len: usize) -> Vec<u8> {
    let mut state = 0x2545_f491_u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

fn bench_codecs(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for &len in &[64usize, 4_096, 65_536] {
        let payload = make_payload(len);
        let hex = codec::to_hex(&payload);
        let base64 = codec::to_base64(&payload);
        group.throughput(Throughput::Bytes(len as u64));

        group.bench_with_input(BenchmarkId::new("to_hex", len), &payload, |b, p| {
            b.iter(|| black_box(codec::to_hex(black_box(p))));
        });
        group.bench_with_input(BenchmarkId::new("from_hex", len), &hex, |b, t| {
            b.iter(|| black_box(codec::from_hex(black_box(t)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("to_base64", len), &payload, |b, p| {
            b.iter(|| black_box(codec::to_base64(black_box(p))));
        });
        group.bench_with_input(BenchmarkId::new("from_base64", len), &base64, |b, t| {
            b.iter(|| black_box(codec::from_base64(black_box(t))));
        });
    }
    group.finish();
}

fn bench_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("records");
    let text: String = "wire\u{e9}\u{20ac}".repeat(200);

    group.bench_function("write_i4_x1000", |b| {
        b.iter(|| {
            let mut buf = MemBuf::with_capacity(4_000);
            let mut out = buf.out();
            for i in 0..1_000i32 {
                out.write_i4(black_box(i)).unwrap();
            }
            drop(out);
            black_box(buf.size())
        });
    });
    group.bench_function("write_utf", |b| {
        b.iter(|| {
            let mut buf = MemBuf::new();
            buf.out().write_utf(black_box(&text)).unwrap();
            black_box(buf.size())
        });
    });
    group.bench_function("read_utf", |b| {
        let mut encoded = MemBuf::new();
        encoded.out().write_utf(&text).unwrap();
        let encoded = encoded.into_vec();
        b.iter(|| {
            let mut buf = MemBuf::from(black_box(encoded.as_slice()));
            black_box(buf.input().read_utf().unwrap())
        });
    });
    group.finish();
}

fn criterion() -> Criterion {
    let mut c = Criterion::default();
    if cfg!(feature = "bench-fast") {
        c = c
            .warm_up_time(Duration::from_millis(10))
            .measurement_time(Duration::from_millis(100))
            .sample_size(10);
    } else {
        c = c
            .warm_up_time(Duration::from_secs(3))
            .measurement_time(Duration::from_secs(5));
    }
    c
}

criterion_group! { name = benches; config = criterion(); targets = bench_codecs, bench_records }
criterion_main!(benches);
