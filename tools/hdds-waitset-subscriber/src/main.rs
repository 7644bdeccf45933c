// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! hdds-waitset-subscriber - WaitSet-driven typed subscriber
//!
//! Blocks on a WaitSet holding a Ctrl-C shutdown trigger and a `Position`
//! subscriber, drains every ready sample, and exits cleanly on shutdown.

use clap::Parser;
use colored::*;
use hdds_waitset::codec::{PayloadReader, PayloadWriter};
use hdds_waitset::options::{PublisherOptions, SubscriberOptions};
use hdds_waitset::{
    Payload, Publisher, ReceiveError, Runtime, ServiceDescription, Subscriber, SubscriberEvent,
    TakeOutcome, Trigger, TriggerHandle, WaitSet,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const RUNTIME_NAME: &str = "hdds-waitset-subscriber";

/// WaitSet-driven typed subscriber
#[derive(Parser, Debug)]
#[command(name = "hdds-waitset-subscriber")]
#[command(version = "0.1.0")]
#[command(about = "Receive Position samples through a WaitSet until Ctrl-C")]
struct Args {
    /// Subscriber queue capacity
    #[arg(short = 'q', long, default_value = "10")]
    queue_capacity: u64,

    /// Run an in-process producer publishing every N milliseconds
    #[arg(short = 'p', long)]
    publish_interval_ms: Option<u64>,

    /// Fire the shutdown trigger after this many samples (0 = unlimited)
    #[arg(short = 'n', long, default_value = "0")]
    max_samples: u64,

    /// Service name
    #[arg(long, default_value = "Odometry")]
    service: String,

    /// Instance name
    #[arg(long, default_value = "Position")]
    instance: String,

    /// Event name
    #[arg(long, default_value = "Vehicle")]
    event: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f64,
    y: f64,
    z: f64,
}

impl Payload for Position {
    const TYPE_NAME: &'static str = "Odometry::Position";

    fn encode(&self, writer: &mut PayloadWriter<'_>) -> hdds_waitset::Result<()> {
        writer.write_f64(self.x)?;
        writer.write_f64(self.y)?;
        writer.write_f64(self.z)
    }

    fn decode(reader: &mut PayloadReader<'_>) -> hdds_waitset::Result<Self> {
        Ok(Self {
            x: reader.read_f64()?,
            y: reader.read_f64()?,
            z: reader.read_f64()?,
        })
    }
}

/// WaitSet attachment tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Shutdown,
    Position,
    Lost,
}

fn main() {
    // Initialize logger for RUST_LOG-based debug output
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::init(RUNTIME_NAME)?;
    let service = ServiceDescription::new(&args.service, &args.instance, &args.event)?;

    let subscriber = runtime.create_subscriber::<Position>(
        &service,
        SubscriberOptions::default().queue_capacity(args.queue_capacity),
    )?;

    let shutdown = Trigger::new();
    let waitset: WaitSet<Source> = runtime.create_waitset()?;
    attach_sources(&waitset, &shutdown, &subscriber)?;

    // Setup Ctrl+C handler
    let handle = shutdown.handle();
    ctrlc::set_handler(move || handle.trigger())?;

    let producer = match args.publish_interval_ms {
        Some(interval) => {
            let publisher =
                runtime.create_publisher::<Position>(&service, PublisherOptions::default())?;
            Some(spawn_producer(publisher, Duration::from_millis(interval)))
        }
        None => None,
    };

    println!(
        "{} {} (queue capacity {}), Ctrl-C to stop",
        "Listening on".cyan().bold(),
        service,
        subscriber.queue_capacity()
    );

    let received = dispatch(&waitset, &subscriber, &shutdown.handle(), args.max_samples)?;

    if let Some((running, thread)) = producer {
        running.store(false, Ordering::SeqCst);
        if thread.join().is_err() {
            log::warn!("[subscriber] producer thread panicked");
        }
    }

    println!("{} after {} samples", "Shutdown".green().bold(), received);
    Ok(())
}

fn attach_sources(
    waitset: &WaitSet<Source>,
    shutdown: &Trigger,
    subscriber: &Subscriber<Position>,
) -> hdds_waitset::Result<()> {
    waitset.attach(shutdown, Source::Shutdown)?;
    waitset.attach_event(subscriber, SubscriberEvent::HasSamples, Source::Position)?;
    waitset.attach_event(subscriber, SubscriberEvent::SamplesLost, Source::Lost)
}

/// Dispatch loop. Returns the number of samples received once shutdown fires.
///
/// Receive errors, channel closure included, are logged and the loop keeps
/// waiting: only the shutdown trigger ends it.
fn dispatch(
    waitset: &WaitSet<Source>,
    subscriber: &Subscriber<Position>,
    shutdown: &TriggerHandle,
    max_samples: u64,
) -> Result<u64, Box<dyn std::error::Error>> {
    let mut received = 0u64;

    loop {
        for event in waitset.wait()? {
            match event.tag() {
                Source::Shutdown => return Ok(received),
                Source::Lost => {
                    let lost = subscriber.take_lost_count();
                    if lost > 0 {
                        println!("{} {} samples dropped", "Lost".yellow().bold(), lost);
                    }
                }
                Source::Position => loop {
                    match subscriber.take() {
                        TakeOutcome::Value(sample) => {
                            received += 1;
                            let header = sample.header();
                            println!(
                                "{} seq={} from {} x={:.2} y={:.2} z={:.2}",
                                "Position".bold(),
                                header.sequence(),
                                header.publisher(),
                                sample.x,
                                sample.y,
                                sample.z
                            );
                            if max_samples > 0 && received == max_samples {
                                shutdown.trigger();
                            }
                        }
                        TakeOutcome::Empty(_) => break,
                        TakeOutcome::Error(ReceiveError::ChannelClosed) => {
                            // Reported once; keep waiting for the shutdown trigger.
                            println!("{} waiting for shutdown", "Channel closed,".yellow());
                            log::warn!("[subscriber] {} closed", subscriber.service());
                            break;
                        }
                        TakeOutcome::Error(err) => {
                            log::warn!("[subscriber] dropping sample: {}", err);
                        }
                    }
                },
            }
        }
    }
}

fn spawn_producer(
    publisher: Publisher<Position>,
    interval: Duration,
) -> (Arc<AtomicBool>, thread::JoinHandle<()>) {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    let thread = thread::spawn(move || {
        let mut step = 0u32;
        while r.load(Ordering::SeqCst) {
            let t = f64::from(step) * 0.1;
            let position = Position {
                x: t.cos() * 10.0,
                y: t.sin() * 10.0,
                z: 0.0,
            };
            if let Err(e) = publisher.publish(&position) {
                log::warn!("[producer] publish failed: {}", e);
                break;
            }
            step = step.wrapping_add(1);
            thread::sleep(interval);
        }
    });
    (running, thread)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn endpoints(rt: &Runtime) -> (ServiceDescription, Publisher<Position>, Subscriber<Position>) {
        let service = ServiceDescription::new("Odometry", "Position", "Vehicle").expect("service");
        let publisher = rt
            .create_publisher::<Position>(&service, PublisherOptions::default())
            .expect("publisher");
        let subscriber = rt
            .create_subscriber::<Position>(&service, SubscriberOptions::default().queue_capacity(10))
            .expect("subscriber");
        (service, publisher, subscriber)
    }

    fn origin() -> Position {
        Position {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    #[test]
    fn test_dispatch_stops_at_max_samples() {
        let rt = Runtime::new("dispatch-max").expect("runtime");
        let (_service, publisher, subscriber) = endpoints(&rt);
        let shutdown = Trigger::new();
        let waitset: WaitSet<Source> = rt.create_waitset().expect("waitset");
        attach_sources(&waitset, &shutdown, &subscriber).expect("attach");

        for _ in 0..3 {
            publisher.publish(&origin()).expect("publish");
        }
        let received = dispatch(&waitset, &subscriber, &shutdown.handle(), 2).expect("dispatch");
        assert!(received >= 2);
    }

    #[test]
    fn test_dispatch_survives_channel_closure() {
        let rt = Runtime::new("dispatch-closed").expect("runtime");
        let (service, publisher, subscriber) = endpoints(&rt);
        let shutdown = Trigger::new();
        let waitset: WaitSet<Source> = rt.create_waitset().expect("waitset");
        attach_sources(&waitset, &shutdown, &subscriber).expect("attach");

        publisher.publish(&origin()).expect("publish");
        assert!(rt.teardown_service(&service));

        let handle = shutdown.handle();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.trigger();
        });

        let start = Instant::now();
        let received = dispatch(&waitset, &subscriber, &shutdown.handle(), 0).expect("dispatch");
        assert_eq!(received, 1);
        assert!(
            start.elapsed() >= Duration::from_millis(40),
            "closure must not end the loop before shutdown"
        );
        stopper.join().expect("stopper thread");
    }
}
