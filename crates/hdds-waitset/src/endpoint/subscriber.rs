// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed subscriber: a receive queue that doubles as a WaitSet event origin.

use super::channel::{Channel, ReceivePort};
use super::options::SubscriberOptions;
use super::sample::{EmptyReason, ReceiveError, Sample, TakeOutcome};
use super::service::ServiceDescription;
use crate::codec::PayloadReader;
use crate::event::{EventId, EventOrigin, EventSource, OriginId};
use crate::payload::Payload;
use crate::Result;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::Arc;

/// Events a [`Subscriber`] can be attached for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriberEvent {
    /// Ready while the receive queue is non-empty, and once after the
    /// service was torn down.
    #[default]
    HasSamples = 0,
    /// Ready after the queue overflowed, until [`Subscriber::take_lost_count`].
    SamplesLost = 1,
}

impl From<SubscriberEvent> for EventId {
    fn from(event: SubscriberEvent) -> Self {
        EventId::new(event as u32)
    }
}

/// Whether a subscriber is connected to its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    NotSubscribed,
    Subscribed,
}

/// Typed receiving endpoint.
///
/// Created through [`Runtime::create_subscriber`](crate::Runtime::create_subscriber).
///
/// # Example
///
/// ```rust,no_run
/// use hdds_waitset::options::SubscriberOptions;
/// use hdds_waitset::{Runtime, ServiceDescription, TakeOutcome};
///
/// let runtime = Runtime::new("reader")?;
/// let service = ServiceDescription::new("Odometry", "Position", "Vehicle")?;
/// let subscriber = runtime
///     .create_subscriber::<u64>(&service, SubscriberOptions::default().queue_capacity(10))?;
///
/// match subscriber.take() {
///     TakeOutcome::Value(sample) => println!("got {}", *sample),
///     TakeOutcome::Empty(reason) => println!("nothing: {:?}", reason),
///     TakeOutcome::Error(err) => eprintln!("receive failed: {}", err),
/// }
/// # Ok::<(), hdds_waitset::Error>(())
/// ```
pub struct Subscriber<T: Payload> {
    id: OriginId,
    channel: Arc<Channel>,
    port: Arc<ReceivePort>,
    options: SubscriberOptions,
    state: Mutex<SubscriptionState>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Payload> Subscriber<T> {
    pub(crate) fn new(channel: Arc<Channel>, options: SubscriberOptions) -> Result<Self> {
        options.validate()?;
        let id = OriginId::next();
        // validate() bounds the capacity, the conversion cannot truncate
        let capacity = options.queue_capacity as usize;
        let port = Arc::new(ReceivePort::new(id, capacity, options.queue_full_policy));

        let subscriber = Self {
            id,
            channel,
            port,
            options,
            state: Mutex::new(SubscriptionState::NotSubscribed),
            _marker: PhantomData,
        };
        if subscriber.options.subscribe_on_create {
            subscriber.subscribe()?;
        }
        Ok(subscriber)
    }

    /// Connect to the channel and replay the requested history.
    ///
    /// No-op when already subscribed; fails with
    /// [`Error::ServiceClosed`](crate::Error::ServiceClosed) after teardown.
    pub fn subscribe(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state == SubscriptionState::Subscribed {
            return Ok(());
        }
        self.channel
            .register_port(&self.port, self.options.history_request as usize)?;
        *state = SubscriptionState::Subscribed;
        log::debug!(
            "[subscriber] {} subscribed to {}",
            self.id,
            self.channel.service()
        );
        Ok(())
    }

    /// Disconnect and release every queued sample.
    pub fn unsubscribe(&self) {
        let mut state = self.state.lock();
        if *state == SubscriptionState::NotSubscribed {
            return;
        }
        self.channel.unregister_port(&self.port);
        let released = self.port.clear();
        // An unsubscribed endpoint has nothing left to report, closure included.
        if self.port.is_closed() {
            self.port.mark_close_reported();
        }
        *state = SubscriptionState::NotSubscribed;
        log::debug!(
            "[subscriber] {} unsubscribed from {} (released {})",
            self.id,
            self.channel.service(),
            released
        );
    }

    #[must_use]
    pub fn subscription_state(&self) -> SubscriptionState {
        *self.state.lock()
    }

    /// Take the oldest queued sample. Never blocks.
    pub fn take(&self) -> TakeOutcome<T> {
        if self.subscription_state() == SubscriptionState::NotSubscribed {
            return TakeOutcome::Empty(EmptyReason::NotSubscribed);
        }

        // Read closure first: once seen, every chunk delivered before it is queued.
        let closed = self.port.is_closed();
        let Some(chunk) = self.port.pop() else {
            if closed {
                self.port.mark_close_reported();
                return TakeOutcome::Error(ReceiveError::ChannelClosed);
            }
            return TakeOutcome::Empty(EmptyReason::NoSamples);
        };

        let expected = T::payload_type_id();
        if chunk.header.type_id != expected {
            log::debug!(
                "[subscriber] {} type mismatch on {} seq={}",
                self.id,
                self.channel.service(),
                chunk.header.sequence
            );
            return TakeOutcome::Error(ReceiveError::TypeMismatch {
                expected,
                found: chunk.header.type_id,
            });
        }

        let mut reader = PayloadReader::new(&chunk.payload);
        let decoded = T::decode(&mut reader).and_then(|value| {
            if reader.remaining() == 0 {
                Ok(value)
            } else {
                Err(crate::Error::SerializationError(format!(
                    "{} trailing bytes",
                    reader.remaining()
                )))
            }
        });
        match decoded {
            Ok(value) => TakeOutcome::Value(Sample::new(value, chunk)),
            Err(err) => TakeOutcome::Error(ReceiveError::Decode(err.to_string())),
        }
    }

    /// Whether a `take` would currently return a value.
    #[must_use]
    pub fn has_samples(&self) -> bool {
        self.port.len() > 0
    }

    /// Number of queued samples.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.port.len()
    }

    /// Samples lost to queue overflow since the last call; resets the counter.
    pub fn take_lost_count(&self) -> u64 {
        self.port.take_lost_count()
    }

    /// Whether any publisher currently offers the service.
    #[must_use]
    pub fn is_service_offered(&self) -> bool {
        self.channel.is_offered()
    }

    #[must_use]
    pub fn origin_id(&self) -> OriginId {
        self.id
    }

    #[must_use]
    pub fn service(&self) -> &ServiceDescription {
        self.channel.service()
    }

    #[must_use]
    pub fn options(&self) -> &SubscriberOptions {
        &self.options
    }

    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.port.capacity()
    }
}

impl<T: Payload> EventOrigin for Subscriber<T> {
    type Event = SubscriberEvent;

    fn origin_id(&self) -> OriginId {
        self.id
    }

    fn event_source(&self) -> Arc<dyn EventSource> {
        Arc::clone(&self.port) as Arc<dyn EventSource>
    }
}

impl<T: Payload> Drop for Subscriber<T> {
    fn drop(&mut self) {
        self.port.retire_hooks();
        if *self.state.get_mut() == SubscriptionState::Subscribed {
            self.channel.unregister_port(&self.port);
        }
    }
}

impl<T: Payload> std::fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("service", self.channel.service())
            .field("type", &T::TYPE_NAME)
            .field("state", &self.subscription_state())
            .field("queued", &self.port.len())
            .finish()
    }
}
