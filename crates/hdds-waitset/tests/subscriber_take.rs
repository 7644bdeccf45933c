// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure
#![allow(clippy::float_cmp)] // Test assertions with constants
#![allow(clippy::cast_possible_truncation)] // Test parameters

//! Typed subscriber take-path integration tests
//!
//! Take outcomes, level-triggered `HasSamples` readiness and the dispatch
//! loop shape used by the subscriber tool.

use hdds_waitset::codec::{PayloadReader, PayloadWriter};
use hdds_waitset::options::{PublisherOptions, SubscriberOptions};
use hdds_waitset::{
    EmptyReason, Payload, Publisher, ReceiveError, Result, Runtime, ServiceDescription,
    Subscriber, TakeOutcome, Trigger, WaitSet,
};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
struct Position {
    x: f64,
    y: f64,
    z: f64,
}

impl Payload for Position {
    const TYPE_NAME: &'static str = "tests::Position";

    fn encode(&self, writer: &mut PayloadWriter<'_>) -> Result<()> {
        writer.write_f64(self.x)?;
        writer.write_f64(self.y)?;
        writer.write_f64(self.z)
    }

    fn decode(reader: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(Self {
            x: reader.read_f64()?,
            y: reader.read_f64()?,
            z: reader.read_f64()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Shutdown,
    Position,
}

fn service() -> ServiceDescription {
    ServiceDescription::new("Odometry", "Position", "Vehicle").expect("service")
}

fn endpoints(rt: &Runtime) -> (Publisher<Position>, Subscriber<Position>) {
    let publisher = rt
        .create_publisher::<Position>(&service(), PublisherOptions::default())
        .expect("publisher");
    let subscriber = rt
        .create_subscriber::<Position>(&service(), SubscriberOptions::default().queue_capacity(10))
        .expect("subscriber");
    (publisher, subscriber)
}

fn position(i: u32) -> Position {
    Position {
        x: f64::from(i),
        y: f64::from(i) * 2.0,
        z: -1.0,
    }
}

#[test]
fn three_items_then_empty_then_wait_blocks() {
    let rt = Runtime::new("three-items").expect("runtime");
    let (publisher, subscriber) = endpoints(&rt);
    let shutdown = Trigger::new();

    let waitset: WaitSet<Source> = rt.create_waitset().expect("waitset");
    waitset.attach(&shutdown, Source::Shutdown).expect("attach");
    waitset.attach(&subscriber, Source::Position).expect("attach");

    for i in 0..3 {
        publisher.publish(&position(i)).expect("publish");
    }

    let ready = waitset.wait().expect("wait");
    assert_eq!(ready.len(), 1);
    assert_eq!(*ready[0].tag(), Source::Position);

    for i in 0..3 {
        match subscriber.take() {
            TakeOutcome::Value(sample) => assert_eq!(*sample, position(i)),
            other => panic!("item {}: {:?}", i, other),
        }
    }
    assert!(matches!(
        subscriber.take(),
        TakeOutcome::Empty(EmptyReason::NoSamples)
    ));

    // nothing is ready any more: the next wait blocks
    let start = Instant::now();
    assert!(waitset
        .wait_timeout(Duration::from_millis(50))
        .expect("wait")
        .is_empty());
    assert!(start.elapsed() >= Duration::from_millis(40));

    // ...until new data arrives
    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        publisher.publish(&position(3)).expect("publish");
        publisher
    });
    let ready = waitset.wait().expect("wait");
    assert_eq!(*ready[0].tag(), Source::Position);
    assert!(subscriber.take().is_value());
    let _publisher = producer.join().expect("producer thread");

    // ...or shutdown is requested
    let handle = shutdown.handle();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        handle.trigger();
    });
    let ready = waitset.wait().expect("wait");
    assert_eq!(ready.len(), 1);
    assert!(ready[0].does_originate_from(&shutdown));
    stopper.join().expect("stopper thread");
}

#[test]
fn take_on_empty_queue_never_blocks() {
    let rt = Runtime::new("take-empty").expect("runtime");
    let (_publisher, subscriber) = endpoints(&rt);

    let start = Instant::now();
    for _ in 0..1000 {
        assert!(matches!(
            subscriber.take(),
            TakeOutcome::Empty(EmptyReason::NoSamples)
        ));
    }
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn has_samples_tracks_occupancy() {
    let rt = Runtime::new("occupancy").expect("runtime");
    let (publisher, subscriber) = endpoints(&rt);

    assert!(!subscriber.has_samples());
    publisher.publish(&position(1)).expect("publish");
    publisher.publish(&position(2)).expect("publish");
    assert_eq!(subscriber.queued(), 2);

    assert!(subscriber.take().is_value());
    assert!(subscriber.has_samples());
    assert!(subscriber.take().is_value());
    assert!(!subscriber.has_samples());
}

#[test]
fn dispatch_loop_until_shutdown() {
    let rt = Runtime::new("dispatch-loop").expect("runtime");
    let (publisher, subscriber) = endpoints(&rt);
    let shutdown = Trigger::new();

    let waitset: WaitSet<Source> = rt.create_waitset().expect("waitset");
    waitset.attach(&shutdown, Source::Shutdown).expect("attach");
    waitset.attach(&subscriber, Source::Position).expect("attach");

    let handle = shutdown.handle();
    let producer = thread::spawn(move || {
        for i in 0..20 {
            publisher.publish(&position(i)).expect("publish");
            thread::sleep(Duration::from_millis(1));
        }
        handle.trigger();
    });

    let mut received = Vec::new();
    'dispatch: loop {
        for event in waitset.wait().expect("wait") {
            match event.tag() {
                Source::Shutdown => break 'dispatch,
                Source::Position => loop {
                    match subscriber.take() {
                        TakeOutcome::Value(sample) => received.push(sample.header().sequence()),
                        TakeOutcome::Empty(_) => break,
                        TakeOutcome::Error(err) => panic!("receive failed: {}", err),
                    }
                },
            }
        }
    }
    producer.join().expect("producer thread");

    // drain what arrived between the last data wakeup and the shutdown
    while let TakeOutcome::Value(sample) = subscriber.take() {
        received.push(sample.header().sequence());
    }
    assert_eq!(received, (1..=20).collect::<Vec<u64>>());
}

#[test]
fn teardown_wakes_waiter_with_channel_closed() {
    let rt = Runtime::new("teardown").expect("runtime");
    let (_publisher, subscriber) = endpoints(&rt);

    let waitset: WaitSet = WaitSet::new().expect("waitset");
    waitset.attach(&subscriber, ()).expect("attach");

    assert!(rt.teardown_service(&service()));
    assert_eq!(waitset.wait().expect("wait").len(), 1);
    assert!(matches!(
        subscriber.take(),
        TakeOutcome::Error(ReceiveError::ChannelClosed)
    ));
    assert!(waitset
        .wait_timeout(Duration::from_millis(20))
        .expect("wait")
        .is_empty());
}

#[test]
fn unsubscribe_after_teardown_stops_closure_readiness() {
    let rt = Runtime::new("teardown-unsubscribe").expect("runtime");
    let (_publisher, subscriber) = endpoints(&rt);

    let waitset: WaitSet = WaitSet::new().expect("waitset");
    waitset.attach(&subscriber, ()).expect("attach");

    assert!(rt.teardown_service(&service()));
    subscriber.unsubscribe();
    assert!(matches!(
        subscriber.take(),
        TakeOutcome::Empty(EmptyReason::NotSubscribed)
    ));

    for _ in 0..3 {
        let start = Instant::now();
        assert!(waitset
            .wait_timeout(Duration::from_millis(30))
            .expect("wait")
            .is_empty());
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}

#[test]
fn subscriber_dropped_while_attached() {
    let rt = Runtime::new("drop-attached").expect("runtime");
    let (publisher, subscriber) = endpoints(&rt);

    let waitset: WaitSet = WaitSet::new().expect("waitset");
    waitset.attach(&subscriber, ()).expect("attach");
    drop(subscriber);

    publisher.publish(&position(1)).expect("publish");
    assert!(waitset.is_empty());
    assert!(waitset
        .wait_timeout(Duration::from_millis(20))
        .expect("wait")
        .is_empty());
}

#[cfg(feature = "config-loaders")]
#[test]
fn runtime_from_yaml_file() {
    use hdds_waitset::config::RuntimeConfig;
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "chunk_count: 2\nmax_payload_size: 64\nwaitset_capacity: 4").expect("write");

    let config = RuntimeConfig::from_yaml_file(file.path()).expect("config");
    let rt = Runtime::builder("yaml-runtime")
        .config(config)
        .build()
        .expect("runtime");
    assert_eq!(rt.chunk_pool().max_chunks(), 2);

    let waitset: WaitSet = rt.create_waitset().expect("waitset");
    assert_eq!(waitset.capacity(), 4);
}
