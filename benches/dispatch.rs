use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use resultflow::{
    AlwaysActive, Bridge, CollectingSink, DataResult, Delivery, EventWrapper, FlowContext, StatePublisher,
};

fn counting_wrapper(counter: &Arc<AtomicU64>, entries: usize) -> EventWrapper<u64> {
    let mut wrapper = EventWrapper::new().on_loading(|_| Ok(()));
    for _ in 0..entries {
        let c = Arc::clone(counter);
        wrapper = wrapper.on_success_with(Delivery::Continuous, move |v: &u64| {
            c.fetch_add(*v, Ordering::Relaxed);
            Ok(())
        });
    }
    wrapper
}

fn bench_wrapper_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("wrapper_dispatch");
    group.throughput(Throughput::Elements(1));

    for entries in [1usize, 8, 64] {
        group.bench_function(format!("continuous_{entries}"), |b| {
            let counter = Arc::new(AtomicU64::new(0));
            let mut wrapper = counting_wrapper(&counter, entries);
            let sink = CollectingSink::new();
            let emission = DataResult::success(1u64);
            b.iter(|| black_box(wrapper.dispatch(&emission, &sink)));
        });
    }

    group.finish();
}

fn bench_bridge_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("bridge_emit");
    group.throughput(Throughput::Elements(1));

    group.bench_function("state_publisher", |b| {
        b.iter_custom(|iters| {
            // Fresh bridge per sample so the counter does not leak between samples.
            let counter = Arc::new(AtomicU64::new(0));
            let publisher = Arc::new(StatePublisher::<u64>::new());
            let bridge = Bridge::new(counting_wrapper(&counter, 4), FlowContext::default());
            bridge.attach(publisher.clone(), AlwaysActive).unwrap();

            let start = Instant::now();
            for i in 0..iters {
                publisher.emit(DataResult::success(i)).unwrap();
            }
            let elapsed = start.elapsed();
            bridge.detach();
            elapsed
        })
    });

    group.bench_function("map_stage", |b| {
        b.iter(|| black_box(DataResult::success(black_box(21u64)).map(|x| x * 2)));
    });

    group.finish();
}

criterion_group!(dispatch, bench_wrapper_dispatch, bench_bridge_emit);
criterion_main!(dispatch);
