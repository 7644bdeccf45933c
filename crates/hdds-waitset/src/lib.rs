// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HDDS WaitSet - event multiplexer with typed subscription endpoints
//!
//! Block one thread on many independent event sources (incoming samples on a
//! subscription, a shutdown [`Trigger`] fired from a signal handler) and
//! dispatch by origin once woken.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hdds_waitset::options::SubscriberOptions;
//! use hdds_waitset::{Result, Runtime, ServiceDescription, TakeOutcome, Trigger, WaitSet};
//!
//! #[derive(Clone, Copy)]
//! enum Source {
//!     Shutdown,
//!     Position,
//! }
//!
//! fn main() -> Result<()> {
//!     let runtime = Runtime::init("odometry-listener")?;
//!     let service = ServiceDescription::new("Odometry", "Position", "Vehicle")?;
//!     let subscriber = runtime
//!         .create_subscriber::<u64>(&service, SubscriberOptions::default().queue_capacity(10))?;
//!
//!     let shutdown = Trigger::new();
//!     let waitset: WaitSet<Source> = runtime.create_waitset()?;
//!     waitset.attach(&shutdown, Source::Shutdown)?;
//!     waitset.attach(&subscriber, Source::Position)?;
//!
//!     loop {
//!         for event in waitset.wait()? {
//!             match event.tag() {
//!                 Source::Shutdown => return Ok(()),
//!                 Source::Position => while let TakeOutcome::Value(sample) = subscriber.take() {
//!                     println!("position {}", *sample);
//!                 },
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        Application Layer                            |
//! |   dispatch loop: WaitSet<K>::wait() -> ReadyEvent<K> -> take()      |
//! +---------------------------------------------------------------------+
//! |                         Event Layer                                 |
//! |   Trigger | Subscriber<T> (HasSamples, SamplesLost) | EventSource   |
//! +---------------------------------------------------------------------+
//! |                        Runtime Layer                                |
//! |   WaitsetDriver (eventfd/pipe/Event) | WaitsetHook | ChunkPool      |
//! +---------------------------------------------------------------------+
//! |                       Loopback Transport                            |
//! |   Runtime registry -> Channel -> ReceivePort (bounded queue)        |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`WaitSet`] | Blocks until attached sources are ready, reports them in slot order |
//! | [`Trigger`] | User event source, async-signal-safe `trigger()` |
//! | [`Subscriber`] | Typed receive queue with non-blocking [`take`](Subscriber::take) |
//! | [`Publisher`] | Typed in-process producer |
//! | [`Runtime`] | Process name, configuration, service registry |
//!
//! ## Modules Overview
//!
//! - [`waitset`] - WaitSet and ready-event descriptors (start here)
//! - [`event`] - Trigger and the event-source traits
//! - [`endpoint`] - Publisher, Subscriber, samples and options
//! - [`config`] - Limits, defaults and [`RuntimeConfig`](config::RuntimeConfig)
//! - [`core`] - OS wake driver, waitset hooks, chunk pool

// Clippy: No blanket suppressions. Fix issues properly or use inline #[allow] with justification.

/// Little-endian payload writer/reader.
pub mod codec;
/// Global configuration (limits, defaults, runtime config).
pub mod config;
/// Runtime primitives (waitset driver and hooks, chunk pool).
pub mod core;
/// Typed publish/subscribe endpoints.
pub mod endpoint;
/// Error type and result alias.
mod error;
/// Event origins (Trigger) and the event-source contract.
pub mod event;
/// Payload encoding contract.
pub mod payload;
/// Process runtime and service registry.
pub mod runtime;
/// WaitSet event multiplexer.
pub mod waitset;

pub use endpoint::options;
pub use endpoint::{
    EmptyReason, Publisher, ReceiveError, Sample, SampleHeader, ServiceDescription, Subscriber,
    SubscriberEvent, SubscriptionState, TakeOutcome,
};
pub use error::{Error, Result};
pub use event::{
    EventId, EventOrigin, EventSource, OriginId, Trigger, TriggerEvent, TriggerHandle, TriggerMode,
};
pub use payload::Payload;
pub use runtime::{Runtime, RuntimeBuilder};
pub use waitset::{ReadyEvent, WaitSet};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
