// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed publish/subscribe endpoints over in-process loopback channels.

mod channel;
pub mod options;
mod publisher;
mod sample;
mod service;
mod subscriber;

pub(crate) use channel::Channel;
pub use publisher::Publisher;
pub use sample::{EmptyReason, ReceiveError, Sample, SampleHeader, TakeOutcome};
pub use service::ServiceDescription;
pub use subscriber::{Subscriber, SubscriberEvent, SubscriptionState};
