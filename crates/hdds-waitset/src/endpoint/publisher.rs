// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed in-process publisher.

use super::channel::{Channel, Chunk};
use super::options::PublisherOptions;
use super::sample::SampleHeader;
use super::service::ServiceDescription;
use crate::codec::PayloadWriter;
use crate::core::rt::ChunkPool;
use crate::event::OriginId;
use crate::payload::Payload;
use crate::{Error, Result};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Typed sending endpoint.
///
/// Created through [`Runtime::create_publisher`](crate::Runtime::create_publisher).
pub struct Publisher<T: Payload> {
    id: OriginId,
    channel: Arc<Channel>,
    pool: Arc<ChunkPool>,
    options: PublisherOptions,
    offered: AtomicBool,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Payload> Publisher<T> {
    pub(crate) fn new(
        channel: Arc<Channel>,
        pool: Arc<ChunkPool>,
        options: PublisherOptions,
    ) -> Result<Self> {
        options.validate()?;
        // validate() bounds the history, the conversion cannot truncate
        channel.reserve_history(options.history_capacity as usize);

        let publisher = Self {
            id: OriginId::next(),
            channel,
            pool,
            options,
            offered: AtomicBool::new(false),
            _marker: PhantomData,
        };
        if publisher.options.offer_on_create {
            publisher.offer()?;
        }
        Ok(publisher)
    }

    /// Start offering the service.
    pub fn offer(&self) -> Result<()> {
        if self.channel.is_closed() {
            return Err(Error::ServiceClosed);
        }
        if !self.offered.swap(true, Ordering::AcqRel) {
            self.channel.add_offer();
            log::debug!("[runtime] {} offers {}", self.id, self.channel.service());
        }
        Ok(())
    }

    /// Stop offering; `publish` fails with [`Error::NotOffered`] until the next `offer`.
    pub fn stop_offer(&self) {
        if self.offered.swap(false, Ordering::AcqRel) {
            self.channel.remove_offer();
            log::debug!(
                "[runtime] {} stopped offering {}",
                self.id,
                self.channel.service()
            );
        }
    }

    #[must_use]
    pub fn is_offered(&self) -> bool {
        self.offered.load(Ordering::Acquire)
    }

    /// Encode `value` into a pooled chunk and deliver it to every subscriber.
    ///
    /// Returns the sample's sequence number.
    ///
    /// # Errors
    ///
    /// - [`Error::NotOffered`] if the publisher is not offering
    /// - [`Error::ServiceClosed`] after the service was torn down
    /// - [`Error::PoolExhausted`] if every chunk is in use
    /// - [`Error::PayloadTooLarge`] / [`Error::SerializationError`] from encoding
    pub fn publish(&self, value: &T) -> Result<u64> {
        if !self.is_offered() {
            return Err(Error::NotOffered);
        }
        if self.channel.is_closed() {
            return Err(Error::ServiceClosed);
        }

        let mut payload = self.pool.acquire().ok_or(Error::PoolExhausted)?;
        value.encode(&mut PayloadWriter::new(
            payload.as_mut_vec(),
            self.pool.max_payload_size(),
        ))?;

        let header = SampleHeader {
            sequence: 0,
            publisher: self.id,
            type_id: T::payload_type_id(),
            timestamp_ns: now_ns(),
            payload_len: payload.len(),
        };
        self.channel.deliver(Chunk { header, payload })
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
    pub fn options(&self) -> &PublisherOptions {
        &self.options
    }
}

impl<T: Payload> Drop for Publisher<T> {
    fn drop(&mut self) {
        self.stop_offer();
    }
}

impl<T: Payload> std::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("id", &self.id)
            .field("service", self.channel.service())
            .field("type", &T::TYPE_NAME)
            .field("offered", &self.is_offered())
            .finish()
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
