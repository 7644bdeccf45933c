// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Received samples and the outcome of [`Subscriber::take`](crate::Subscriber::take).

use super::channel::Chunk;
use crate::event::OriginId;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Metadata stamped by the publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleHeader {
    pub(crate) sequence: u64,
    pub(crate) publisher: OriginId,
    pub(crate) type_id: u64,
    pub(crate) timestamp_ns: u64,
    pub(crate) payload_len: usize,
}

impl SampleHeader {
    /// Per-service sequence number, starting at 1.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub fn publisher(&self) -> OriginId {
        self.publisher
    }

    /// Payload type identity (see [`Payload::payload_type_id`](crate::Payload::payload_type_id)).
    #[must_use]
    pub fn type_id(&self) -> u64 {
        self.type_id
    }

    /// Publish time, nanoseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    /// Encoded payload size in bytes.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }
}

/// One received item, owned by the caller.
///
/// Holds the chunk it was decoded from; the chunk goes back to the pool once
/// every subscriber's sample (and the publisher history) has released it.
pub struct Sample<T> {
    value: T,
    chunk: Arc<Chunk>,
}

impl<T> Sample<T> {
    pub(crate) fn new(value: T, chunk: Arc<Chunk>) -> Self {
        Self { value, chunk }
    }

    #[must_use]
    pub fn header(&self) -> &SampleHeader {
        &self.chunk.header
    }

    /// Encoded bytes as received.
    #[must_use]
    pub fn payload_bytes(&self) -> &[u8] {
        &self.chunk.payload
    }

    /// Release the chunk and keep the decoded value.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for Sample<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Sample<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("value", &self.value)
            .field("sequence", &self.chunk.header.sequence)
            .finish()
    }
}

/// Why `take` returned nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The queue is empty.
    NoSamples,
    /// The subscriber is not subscribed.
    NotSubscribed,
}

/// Transport-level failure reported by `take`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveError {
    /// The service was torn down and the queue is drained.
    ChannelClosed,
    /// The chunk carries a different payload type.
    TypeMismatch { expected: u64, found: u64 },
    /// The payload could not be decoded.
    Decode(String),
}

impl fmt::Display for ReceiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiveError::ChannelClosed => write!(f, "Channel closed"),
            ReceiveError::TypeMismatch { expected, found } => write!(
                f,
                "Payload type mismatch: expected {:#018x}, found {:#018x}",
                expected, found
            ),
            ReceiveError::Decode(msg) => write!(f, "Payload decode failed: {}", msg),
        }
    }
}

impl std::error::Error for ReceiveError {}

/// Result of one non-blocking `take`.
#[derive(Debug)]
pub enum TakeOutcome<T> {
    Value(Sample<T>),
    Empty(EmptyReason),
    Error(ReceiveError),
}

impl<T> TakeOutcome<T> {
    #[must_use]
    pub fn is_value(&self) -> bool {
        matches!(self, TakeOutcome::Value(_))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, TakeOutcome::Empty(_))
    }

    /// The sample, discarding the reason for its absence.
    #[must_use]
    pub fn value(self) -> Option<Sample<T>> {
        match self {
            TakeOutcome::Value(sample) => Some(sample),
            _ => None,
        }
    }
}
