// ABOUTME: Benchmark suite for the mux core's hot paths: ring buffer I/O and frame header codec
// ABOUTME: Measures per-operation cost so regressions in the wire-facing primitives are visible

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::io::Cursor;
use tcpmux::{flags, FrameHeader, FrameType, RingBuffer};

fn bench_frame_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_header");

    group.bench_function("encode", |b| {
        let header = FrameHeader::new(FrameType::Data, flags::SYN, 3, 4096);
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(12);
            header.encode(&mut buf);
            black_box(buf);
        });
    });

    group.bench_function("decode", |b| {
        let header = FrameHeader::new(FrameType::Data, flags::SYN, 3, 4096);
        let mut buf = BytesMut::with_capacity(12);
        header.encode(&mut buf);
        b.iter(|| {
            let mut cursor = Cursor::new(&buf[..]);
            black_box(FrameHeader::decode(&mut cursor).unwrap());
        });
    });

    group.finish();
}

fn bench_ring_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer");

    for size in [64usize, 1024, 16 * 1024] {
        group.bench_with_input(BenchmarkId::new("append_pop", size), &size, |b, &size| {
            let payload = vec![0xABu8; size];
            let mut scratch = vec![0u8; size];
            b.iter(|| {
                let mut ring = RingBuffer::new(size * 2);
                ring.append(&payload);
                ring.pop(&mut scratch).unwrap();
                black_box(&scratch);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_frame_roundtrip, bench_ring_buffer);
criterion_main!(benches);
