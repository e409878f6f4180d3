//! CONTEXT: Delegated call latency benchmarks
//! INTENT: Cost of a full request/dispatch/reply round trip versus running the veneer locally
//! DEPS: criterion (benchmarking), nexus-delegate (loopback transport)
//! READINESS: Benchmark suite; spawns one servicing thread
//! TESTS: Round trip per arity; local veneer baseline
use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use nexus_delegate::{
    call_direct0, call_direct4, CallArgs, CallRecord, DelegateRegistry, DelegateServer, Msg, Wait,
};

fn sum4(a: Msg, b: Msg, c: Msg, d: Msg) -> Msg {
    a + b + c + d
}

fn call_latency_bench(c: &mut Criterion) {
    let registry = DelegateRegistry::new();
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    let (target, handle) = registry
        .spawn("bench-target", move |port| {
            let server = DelegateServer::new(port, Wait::Timeout(Duration::from_millis(10)));
            server.run(|| flag.load(Ordering::Relaxed))
        })
        .expect("spawn servicing thread");
    let me = registry.register("bench-caller").expect("register caller");

    c.bench_function("local-veneer-4", |b| {
        let record = CallRecord::direct(CallArgs::fn4(sum4, 1, 2, 3, 4));
        b.iter(|| black_box(&record).invoke())
    });
    c.bench_function("delegate-0", |b| {
        b.iter(|| call_direct0(&me, &target, || 0).expect("round trip"))
    });
    c.bench_function("delegate-4", |b| {
        b.iter(|| {
            call_direct4(&me, &target, sum4, black_box(1), 2, 3, 4).expect("round trip")
        })
    });

    running.store(false, Ordering::Relaxed);
    let _ = handle.join();
}

criterion_group!(benches, call_latency_bench);
criterion_main!(benches);
