// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WaitSet Wakeup Latency Benchmark
//!
//! Measures:
//! - trigger() -> wait() on an already-fired trigger (no blocking)
//! - publish() -> wait() -> take() round trip on one thread
//! - cross-thread wakeup of a blocked wait()

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_precision_loss)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hdds_waitset::options::{PublisherOptions, SubscriberOptions};
use hdds_waitset::{Runtime, ServiceDescription, TakeOutcome, Trigger, WaitSet};
use std::hint::black_box as bb;
use std::sync::mpsc;
use std::thread;

fn bench_trigger_wait(c: &mut Criterion) {
    let mut group = c.benchmark_group("waitset_trigger");

    for attached in [1usize, 16, 128] {
        let waitset: WaitSet<usize> = WaitSet::with_capacity(attached).expect("waitset");
        let triggers: Vec<Trigger> = (0..attached).map(|_| Trigger::new()).collect();
        for (i, trigger) in triggers.iter().enumerate() {
            waitset.attach(trigger, i).expect("attach");
        }
        let last = &triggers[attached - 1];

        group.bench_with_input(BenchmarkId::new("fire_then_wait", attached), &attached, |b, _| {
            b.iter(|| {
                last.trigger();
                let ready = waitset.wait().expect("wait");
                bb(ready);
            });
        });
    }

    group.finish();
}

fn bench_publish_take(c: &mut Criterion) {
    let rt = Runtime::new("bench-waitset").expect("runtime");
    let service = ServiceDescription::new("Bench", "Latency", "Counter").expect("service");
    let publisher = rt
        .create_publisher::<u64>(&service, PublisherOptions::default())
        .expect("publisher");
    let subscriber = rt
        .create_subscriber::<u64>(&service, SubscriberOptions::default().queue_capacity(16))
        .expect("subscriber");
    let waitset: WaitSet = rt.create_waitset().expect("waitset");
    waitset.attach(&subscriber, ()).expect("attach");

    let mut seq = 0u64;
    c.bench_function("publish_wait_take", |b| {
        b.iter(|| {
            seq += 1;
            publisher.publish(&seq).expect("publish");
            bb(waitset.wait().expect("wait"));
            match subscriber.take() {
                TakeOutcome::Value(sample) => bb(*sample),
                other => panic!("unexpected {:?}", other),
            };
        });
    });
}

fn bench_cross_thread_wakeup(c: &mut Criterion) {
    let waitset: WaitSet = WaitSet::new().expect("waitset");
    let trigger = Trigger::new();
    waitset.attach(&trigger, ()).expect("attach");

    let handle = trigger.handle();
    let (go_tx, go_rx) = mpsc::channel::<bool>();
    let firer = thread::spawn(move || {
        while let Ok(true) = go_rx.recv() {
            handle.trigger();
        }
    });

    c.bench_function("cross_thread_wakeup", |b| {
        b.iter(|| {
            go_tx.send(true).expect("send");
            bb(waitset.wait().expect("wait"));
        });
    });

    let _ = go_tx.send(false);
    firer.join().expect("firer thread");
}

criterion_group!(
    benches,
    bench_trigger_wait,
    bench_publish_take,
    bench_cross_thread_wakeup
);
criterion_main!(benches);
