// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime primitives for event notification and payload buffers.

pub mod chunkpool;
pub mod waitset;

pub use chunkpool::{ChunkPool, PooledBuffer};
pub use waitset::{
    SignalHandle, WaitsetDriver, WaitsetHook, WaitsetRegistration, WaitsetWaitError,
};
