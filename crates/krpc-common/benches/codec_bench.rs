// Criterion benchmarks for the krpc-common codec
//
// Run benchmarks with:
//   cargo bench -p krpc-common
//
// For detailed output with plots:
//   cargo bench -p krpc-common -- --save-baseline main

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use krpc_common::tasks::{Task, Tasks, MAX_TASKS};
use krpc_common::xdr::{Release, XdrCodec, XdrDecoder, XdrEncoder};
use krpc_common::{AcceptStat, CallHeader, ReplyHeader};

fn tasks(count: usize) -> Tasks {
    Tasks::from_vec(
        (0..count as i32)
            .map(|pid| Task::new("kworker/u16:3", pid, 1, 0x0420_8040))
            .collect(),
    )
}

fn encoded(tasks: &Tasks) -> Vec<u8> {
    let mut enc = XdrEncoder::new();
    tasks.encode(&mut enc).unwrap();
    enc.into_inner()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("tasks_encode");

    for count in [0, 3, MAX_TASKS] {
        let value = tasks(count);
        group.bench_function(format!("{}_records", count), |b| {
            b.iter(|| {
                let mut enc = XdrEncoder::with_limit(Tasks::MAX_ENCODED_LEN).unwrap();
                black_box(&value).encode(&mut enc).unwrap();
                enc.into_inner()
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("tasks_decode");

    for count in [0, 3, MAX_TASKS] {
        let bytes = encoded(&tasks(count));
        group.bench_function(format!("{}_records", count), |b| {
            b.iter(|| {
                let mut decoded = Tasks::decode(&mut XdrDecoder::new(black_box(&bytes))).unwrap();
                decoded.release();
            });
        });
    }

    group.bench_function("reject_over_bound", |b| {
        let bytes = ((MAX_TASKS + 1) as u32).to_be_bytes();
        b.iter(|| Tasks::decode(&mut XdrDecoder::new(black_box(&bytes))).is_err());
    });

    group.finish();
}

fn bench_headers(c: &mut Criterion) {
    let mut group = c.benchmark_group("headers");

    group.bench_function("call_header_round_trip", |b| {
        let header = CallHeader::new(7, 0x2000_0001, 1, 1);
        b.iter(|| {
            let mut enc = XdrEncoder::new();
            black_box(&header).encode(&mut enc).unwrap();
            CallHeader::decode(&mut XdrDecoder::new(enc.as_bytes())).unwrap()
        });
    });

    group.bench_function("reply_header_decode", |b| {
        let mut enc = XdrEncoder::new();
        ReplyHeader::accepted(7, AcceptStat::Success)
            .encode(&mut enc)
            .unwrap();
        let bytes = enc.into_inner();
        b.iter(|| ReplyHeader::decode(&mut XdrDecoder::new(black_box(&bytes))).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_headers);
criterion_main!(benches);
