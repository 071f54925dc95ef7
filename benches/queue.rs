//! Throughput Benchmark for WireFlow
//!
//! Measures raw write-queue throughput and the full session send/poll path,
//! with and without backpressure accounting.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use wireflow::session::{Session, WriteHandle, WriteQueue};
use wireflow::worker::{RunQueueWorker, Worker};

fn bench_session(limit: usize) -> Session {
    let worker = Arc::new(RunQueueWorker::new("bench-worker"));
    Session::new(
        worker as Arc<dyn Worker>,
        "127.0.0.1:4000".parse().unwrap(),
        "127.0.0.1:5000".parse().unwrap(),
        true,
        limit,
    )
}

/// Benchmark the raw queue: offer followed by poll
fn bench_write_queue(c: &mut Criterion) {
    let queue = WriteQueue::new();

    let mut group = c.benchmark_group("write_queue");
    group.throughput(Throughput::Elements(1));

    group.bench_function("offer_poll", |b| {
        b.iter(|| {
            queue.offer(Arc::new(WriteHandle::new("payload")));
            black_box(queue.poll());
        });
    });

    group.bench_function("offer_first_poll", |b| {
        b.iter(|| {
            queue.offer_first(Arc::new(WriteHandle::new("payload")));
            black_box(queue.poll());
        });
    });

    group.finish();
}

/// Benchmark the full session path
fn bench_session_send(c: &mut Criterion) {
    let mut group = c.benchmark_group("session");
    group.throughput(Throughput::Elements(1));

    // No permit pool: pure queue discipline
    let unbounded = bench_session(0);
    group.bench_function("send_poll_unbounded", |b| {
        b.iter(|| {
            unbounded.send(Arc::new(WriteHandle::new("payload")));
            black_box(unbounded.poll_outbound());
        });
    });

    // Large pool: permit accounting on every send/poll, never blocking
    let bounded = bench_session(1 << 20);
    group.bench_function("send_poll_bounded", |b| {
        b.iter(|| {
            bounded.send(Arc::new(WriteHandle::new("payload")));
            black_box(bounded.poll_outbound());
        });
    });

    let priority = bench_session(0);
    group.bench_function("priority_send_poll", |b| {
        b.iter(|| {
            priority.send_priority(Arc::new(WriteHandle::new("handshake")));
            black_box(priority.poll_outbound());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_write_queue, bench_session_send);
criterion_main!(benches);
