// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process loopback channel for one service.
//!
//! Publishers hand fully encoded chunks to [`Channel::deliver`], which fans the
//! `Arc<Chunk>` out to every registered [`ReceivePort`] and keeps a short
//! history for late subscribers. Delivery and port registration both run
//! under the history lock, so a subscriber never misses or duplicates a
//! sample published while it joins.

use super::options::QueueFullPolicy;
use super::sample::SampleHeader;
use super::service::ServiceDescription;
use super::subscriber::SubscriberEvent;
use crate::core::rt::{PooledBuffer, WaitsetHook};
use crate::event::{EventId, EventSource, OriginId};
use crate::{Error, Result};
use crossbeam::queue::ArrayQueue;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// One published sample: header plus encoded payload.
pub(crate) struct Chunk {
    pub(crate) header: SampleHeader,
    pub(crate) payload: PooledBuffer,
}

struct History {
    chunks: VecDeque<Arc<Chunk>>,
    capacity: usize,
    next_sequence: u64,
}

pub(crate) struct Channel {
    service: ServiceDescription,
    ports: RwLock<Vec<Weak<ReceivePort>>>,
    history: Mutex<History>,
    offering: AtomicUsize,
    closed: AtomicBool,
}

impl Channel {
    pub(crate) fn new(service: ServiceDescription) -> Self {
        Self {
            service,
            ports: RwLock::new(Vec::new()),
            history: Mutex::new(History {
                chunks: VecDeque::new(),
                capacity: 0,
                next_sequence: 1,
            }),
            offering: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn service(&self) -> &ServiceDescription {
        &self.service
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Grow the history window to at least `capacity` samples.
    pub(crate) fn reserve_history(&self, capacity: usize) {
        let mut history = self.history.lock();
        history.capacity = history.capacity.max(capacity);
    }

    pub(crate) fn add_offer(&self) {
        self.offering.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn remove_offer(&self) {
        self.offering.fetch_sub(1, Ordering::AcqRel);
    }

    /// Whether any publisher currently offers the service.
    pub(crate) fn is_offered(&self) -> bool {
        self.offering.load(Ordering::Acquire) > 0
    }

    /// Stamp the sequence number and fan the chunk out. Returns the sequence.
    pub(crate) fn deliver(&self, mut chunk: Chunk) -> Result<u64> {
        let mut history = self.history.lock();
        if self.is_closed() {
            return Err(Error::ServiceClosed);
        }

        let sequence = history.next_sequence;
        history.next_sequence += 1;
        chunk.header.sequence = sequence;
        let chunk = Arc::new(chunk);

        let mut receivers = 0usize;
        for port in self.ports.read().iter().filter_map(Weak::upgrade) {
            port.push(Arc::clone(&chunk));
            receivers += 1;
        }

        if history.capacity > 0 {
            if history.chunks.len() == history.capacity {
                history.chunks.pop_front();
            }
            history.chunks.push_back(chunk);
        }

        log::trace!(
            "[subscriber] {} seq={} delivered to {} port(s)",
            self.service,
            sequence,
            receivers
        );
        Ok(sequence)
    }

    /// Connect `port` and replay up to `history_request` past samples into it.
    pub(crate) fn register_port(&self, port: &Arc<ReceivePort>, history_request: usize) -> Result<()> {
        let history = self.history.lock();
        if self.is_closed() {
            return Err(Error::ServiceClosed);
        }

        {
            let mut ports = self.ports.write();
            ports.retain(|p| p.strong_count() > 0);
            ports.push(Arc::downgrade(port));
        }

        let replay = history_request.min(history.chunks.len());
        for chunk in history.chunks.iter().skip(history.chunks.len() - replay) {
            port.push(Arc::clone(chunk));
        }
        log::debug!(
            "[subscriber] {} port {} registered, replayed {}",
            self.service,
            port.owner,
            replay
        );
        Ok(())
    }

    pub(crate) fn unregister_port(&self, port: &Arc<ReceivePort>) {
        let _history = self.history.lock();
        self.ports
            .write()
            .retain(|p| p.strong_count() > 0 && !std::ptr::eq(p.as_ptr(), Arc::as_ptr(port)));
    }

    /// Tear the channel down. Connected ports drain what they hold, then report closure.
    pub(crate) fn close(&self) {
        let mut history = self.history.lock();
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        history.chunks.clear();

        let ports = std::mem::take(&mut *self.ports.write());
        for port in ports.iter().filter_map(Weak::upgrade) {
            port.close();
        }
        log::debug!("[subscriber] {} closed", self.service);
    }

    #[cfg(test)]
    pub(crate) fn port_count(&self) -> usize {
        self.ports
            .read()
            .iter()
            .filter(|p| p.strong_count() > 0)
            .count()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        // Ports of a dropped channel can never receive again.
        for port in self.ports.get_mut().iter().filter_map(Weak::upgrade) {
            port.close();
        }
    }
}

/// Bounded per-subscriber receive queue and its readiness state.
pub(crate) struct ReceivePort {
    owner: OriginId,
    queue: ArrayQueue<Arc<Chunk>>,
    policy: QueueFullPolicy,
    lost: AtomicU64,
    closed: AtomicBool,
    close_reported: AtomicBool,
    hooks: [WaitsetHook; 2],
}

impl ReceivePort {
    pub(crate) fn new(owner: OriginId, capacity: usize, policy: QueueFullPolicy) -> Self {
        Self {
            owner,
            queue: ArrayQueue::new(capacity.max(1)),
            policy,
            lost: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            close_reported: AtomicBool::new(false),
            hooks: [WaitsetHook::new(), WaitsetHook::new()],
        }
    }

    fn push(&self, chunk: Arc<Chunk>) {
        let overflowed = match self.policy {
            QueueFullPolicy::DiscardOldest => self.queue.force_push(chunk).is_some(),
            QueueFullPolicy::DiscardNewest => self.queue.push(chunk).is_err(),
        };
        if overflowed {
            self.lost.fetch_add(1, Ordering::SeqCst);
            self.hooks[SubscriberEvent::SamplesLost as usize].notify();
        }
        self.hooks[SubscriberEvent::HasSamples as usize].notify();
    }

    pub(crate) fn pop(&self) -> Option<Arc<Chunk>> {
        self.queue.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Drop everything queued. Returns the number of chunks released.
    pub(crate) fn clear(&self) -> usize {
        let mut released = 0;
        while self.queue.pop().is_some() {
            released += 1;
        }
        released
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.hooks[SubscriberEvent::HasSamples as usize].notify();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop reporting `HasSamples` for the closure.
    pub(crate) fn mark_close_reported(&self) {
        self.close_reported.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_lost_count(&self) -> u64 {
        self.lost.swap(0, Ordering::SeqCst)
    }

    /// Detach from every WaitSet permanently.
    pub(crate) fn retire_hooks(&self) {
        for hook in &self.hooks {
            hook.retire();
        }
    }
}

impl EventSource for ReceivePort {
    fn is_ready(&self, event: EventId) -> bool {
        if event == SubscriberEvent::HasSamples.into() {
            !self.queue.is_empty()
                || (self.closed.load(Ordering::SeqCst)
                    && !self.close_reported.load(Ordering::SeqCst))
        } else if event == SubscriberEvent::SamplesLost.into() {
            self.lost.load(Ordering::SeqCst) > 0
        } else {
            false
        }
    }

    fn hook(&self, event: EventId) -> Option<&WaitsetHook> {
        self.hooks.get(event.raw() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rt::ChunkPool;

    fn chunk(pool: &Arc<ChunkPool>, byte: u8) -> Chunk {
        let mut payload = pool.acquire().expect("chunk");
        payload.as_mut_vec().push(byte);
        Chunk {
            header: SampleHeader {
                sequence: 0,
                publisher: OriginId::next(),
                type_id: 0,
                timestamp_ns: 0,
                payload_len: 1,
            },
            payload,
        }
    }

    fn channel() -> Channel {
        Channel::new(ServiceDescription::new("s", "i", "e").expect("service"))
    }

    #[test]
    fn test_deliver_assigns_increasing_sequence() {
        let pool = Arc::new(ChunkPool::new(4, 16));
        let channel = channel();
        assert_eq!(channel.deliver(chunk(&pool, 1)).expect("deliver"), 1);
        assert_eq!(channel.deliver(chunk(&pool, 2)).expect("deliver"), 2);
        // no receivers and no history: chunks went straight back to the pool
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_discard_oldest_counts_lost() {
        let pool = Arc::new(ChunkPool::new(8, 16));
        let channel = channel();
        let port = Arc::new(ReceivePort::new(OriginId::next(), 2, QueueFullPolicy::DiscardOldest));
        channel.register_port(&port, 0).expect("register");

        for byte in 1..=3 {
            channel.deliver(chunk(&pool, byte)).expect("deliver");
        }

        assert_eq!(port.len(), 2);
        assert_eq!(port.take_lost_count(), 1);
        assert_eq!(port.pop().expect("oldest kept").payload[0], 2);
        assert_eq!(pool.outstanding(), 1);
    }

    #[test]
    fn test_discard_newest_keeps_queue() {
        let pool = Arc::new(ChunkPool::new(8, 16));
        let channel = channel();
        let port = Arc::new(ReceivePort::new(OriginId::next(), 1, QueueFullPolicy::DiscardNewest));
        channel.register_port(&port, 0).expect("register");

        channel.deliver(chunk(&pool, 1)).expect("deliver");
        channel.deliver(chunk(&pool, 2)).expect("deliver");

        assert_eq!(port.take_lost_count(), 1);
        assert_eq!(port.pop().expect("first kept").payload[0], 1);
        assert!(port.pop().is_none());
    }

    #[test]
    fn test_history_replayed_to_late_port() {
        let pool = Arc::new(ChunkPool::new(8, 16));
        let channel = channel();
        channel.reserve_history(2);
        for byte in 1..=3 {
            channel.deliver(chunk(&pool, byte)).expect("deliver");
        }

        let port = Arc::new(ReceivePort::new(OriginId::next(), 8, QueueFullPolicy::DiscardOldest));
        channel.register_port(&port, 5).expect("register");
        assert_eq!(port.len(), 2);
        assert_eq!(port.pop().expect("replayed").header.sequence, 2);
        assert_eq!(port.pop().expect("replayed").header.sequence, 3);
    }

    #[test]
    fn test_close_rejects_delivery_and_marks_ports() {
        let pool = Arc::new(ChunkPool::new(4, 16));
        let channel = channel();
        let port = Arc::new(ReceivePort::new(OriginId::next(), 4, QueueFullPolicy::DiscardOldest));
        channel.register_port(&port, 0).expect("register");
        let has_samples: EventId = SubscriberEvent::HasSamples.into();

        channel.close();
        assert!(port.is_closed());
        assert!(port.is_ready(has_samples));
        port.mark_close_reported();
        assert!(!port.is_ready(has_samples));

        assert!(matches!(
            channel.deliver(chunk(&pool, 1)),
            Err(Error::ServiceClosed)
        ));
        assert!(matches!(
            channel.register_port(&port, 0),
            Err(Error::ServiceClosed)
        ));
    }

    #[test]
    fn test_unregister_port() {
        let channel = channel();
        let port = Arc::new(ReceivePort::new(OriginId::next(), 4, QueueFullPolicy::DiscardOldest));
        channel.register_port(&port, 0).expect("register");
        assert_eq!(channel.port_count(), 1);
        channel.unregister_port(&port);
        assert_eq!(channel.port_count(), 0);
    }
}
