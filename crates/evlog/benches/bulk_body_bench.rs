//! 🏎️ How fast does a batch become a `_bulk` body?
//!
//! Benchmarks `render_bulk_body` over full-size batches of realistic events,
//! and the in-memory round trip through `InMemoryStore::bulk`.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use evlog::EventStore;
use evlog::backends::InMemoryStore;
use evlog::bulk::{BulkOperation, render_bulk_body};
use evlog::common::OwnerReference;
use serde_json::{Value, json};

fn event(n: usize) -> Value {
    let mut body = json!({
        "@timestamp": "2024-03-01T10:00:00.000Z",
        "message": format!("action {n} executed"),
        "event": {"action": "execute", "provider": "actions", "outcome": "success", "duration": 1_500_000},
        "event_log": {"version": "8.0.0"},
    });
    OwnerReference::primary("action", format!("id-{n}")).attach_to(&mut body);
    body
}

fn operations(len: usize) -> Vec<BulkOperation> {
    (0..len)
        .map(|n| BulkOperation::create("evlog-event-log-8.0.0", event(n)))
        .collect()
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_bulk_body");
    for len in [1, 10, 100] {
        let ops = operations(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &ops, |b, ops| {
            b.iter(|| render_bulk_body(black_box(ops)))
        });
    }
    group.finish();
}

fn bench_in_memory_bulk(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("💀 a benchmark without a runtime is just a very slow nap");
    let ops = operations(100);
    c.bench_function("in_memory_bulk_100", |b| {
        b.to_async(&runtime).iter(|| async {
            let store = InMemoryStore::new();
            store.bulk(black_box(&ops)).await
        })
    });
}

criterion_group!(benches, bench_render, bench_in_memory_bulk);
criterion_main!(benches);
