// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded pool of recyclable payload buffers.
//!
//! Each published sample occupies one chunk until every subscriber holding it
//! has dropped its [`Sample`](crate::Sample). The pool caps the number of
//! outstanding chunks, so a slow consumer exhausts the pool instead of
//! growing memory without bound.
//!
//! # Performance
//!
//! - acquire/release: lock-free (`ArrayQueue` free list + atomic counter)
//! - buffers are recycled with their capacity retained

use crossbeam::queue::ArrayQueue;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Initial capacity reserved for freshly allocated buffers.
const INITIAL_BUFFER_CAPACITY: usize = 64;

/// Fixed-size pool of payload buffers.
pub struct ChunkPool {
    free: ArrayQueue<Vec<u8>>,
    outstanding: AtomicUsize,
    max_chunks: usize,
    max_payload_size: usize,
}

impl ChunkPool {
    /// Create a pool allowing at most `max_chunks` outstanding buffers of at
    /// most `max_payload_size` bytes each.
    ///
    /// `max_chunks` is clamped to at least 1.
    #[must_use]
    pub fn new(max_chunks: usize, max_payload_size: usize) -> Self {
        let max_chunks = max_chunks.max(1);
        Self {
            free: ArrayQueue::new(max_chunks),
            outstanding: AtomicUsize::new(0),
            max_chunks,
            max_payload_size,
        }
    }

    /// Acquire an empty buffer. Returns `None` when the pool is exhausted.
    pub fn acquire(self: &Arc<Self>) -> Option<PooledBuffer> {
        let mut current = self.outstanding.load(Ordering::Acquire);
        loop {
            if current >= self.max_chunks {
                return None;
            }
            match self.outstanding.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        let buf = self
            .free
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(INITIAL_BUFFER_CAPACITY.min(self.max_payload_size)));

        Some(PooledBuffer {
            buf,
            pool: Arc::clone(self),
        })
    }

    /// Number of buffers currently held by publishers, queues or samples.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Number of buffers that can still be acquired.
    #[must_use]
    pub fn available(&self) -> usize {
        self.max_chunks.saturating_sub(self.outstanding())
    }

    #[must_use]
    pub fn max_chunks(&self) -> usize {
        self.max_chunks
    }

    #[must_use]
    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    fn release(&self, mut buf: Vec<u8>) {
        buf.clear();
        if buf.capacity() <= self.max_payload_size {
            let _ = self.free.push(buf);
        }
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for ChunkPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkPool")
            .field("outstanding", &self.outstanding())
            .field("max_chunks", &self.max_chunks)
            .field("max_payload_size", &self.max_payload_size)
            .finish()
    }
}

/// A buffer on loan from a [`ChunkPool`]; returned to the pool on drop.
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: Arc<ChunkPool>,
}

impl PooledBuffer {
    /// Mutable access for encoding.
    pub fn as_mut_vec(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_until_exhausted() {
        let pool = Arc::new(ChunkPool::new(2, 1024));
        let a = pool.acquire().expect("first chunk");
        let _b = pool.acquire().expect("second chunk");
        assert!(pool.acquire().is_none());
        assert_eq!(pool.outstanding(), 2);
        assert_eq!(pool.available(), 0);

        drop(a);
        assert_eq!(pool.outstanding(), 1);
        assert!(pool.acquire().is_some());
    }

    #[test]
    fn test_released_buffer_is_cleared() {
        let pool = Arc::new(ChunkPool::new(1, 1024));
        {
            let mut buf = pool.acquire().expect("chunk");
            buf.as_mut_vec().extend_from_slice(&[1, 2, 3]);
            assert_eq!(&*buf, &[1, 2, 3]);
        }
        let buf = pool.acquire().expect("recycled chunk");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_zero_chunks_is_clamped() {
        let pool = Arc::new(ChunkPool::new(0, 16));
        assert_eq!(pool.max_chunks(), 1);
        assert!(pool.acquire().is_some());
    }
}
