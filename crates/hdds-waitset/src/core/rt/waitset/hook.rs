// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Origin-side back-reference to a waitset attachment slot.
//!
//! Every (origin, event) pair owns one `WaitsetHook`. Attaching arms the hook
//! with a pointer to the [`SignalHandle`] held by the waitset's attachment
//! record; detaching, dropping the waitset or dropping the origin disarms it.
//!
//! `notify()` is lock-free and allocation-free. Notifiers announce themselves
//! in one of two in-flight counters selected by the current epoch parity.
//! `disarm` swaps the pointer out, then drains each counter in turn after
//! flipping the epoch away from it. Notifiers arriving during a drain land in
//! the other counter, so the wait is bounded by the notifiers that were
//! already running when the pointer was swapped, however heavy the traffic.
//! The attachment record is therefore never released underneath a concurrent
//! (or signal-context) notifier.

use super::driver::SignalHandle;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

/// Lock-free link from an event origin to at most one waitset slot.
pub struct WaitsetHook {
    signal: AtomicPtr<SignalHandle>,
    epoch: AtomicUsize,
    in_flight: [AtomicUsize; 2],
    retired: AtomicBool,
}

impl WaitsetHook {
    /// Create an unattached hook.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            signal: AtomicPtr::new(ptr::null_mut()),
            epoch: AtomicUsize::new(0),
            in_flight: [AtomicUsize::new(0), AtomicUsize::new(0)],
            retired: AtomicBool::new(false),
        }
    }

    /// Wake the attached waitset, if any. Async-signal-safe.
    ///
    /// The origin must publish its readiness change before calling this.
    pub fn notify(&self) {
        let bucket = &self.in_flight[self.epoch.load(Ordering::SeqCst) & 1];
        bucket.fetch_add(1, Ordering::SeqCst);
        let signal = self.signal.load(Ordering::SeqCst);
        if !signal.is_null() {
            // SAFETY: a non-null pointer was published by `arm` from an `Arc`
            // owned by the waitset attachment record. The record keeps that
            // `Arc` alive until `disarm` has swapped the pointer out and seen
            // both in-flight counters reach zero afterwards; we registered in
            // one of them before loading.
            unsafe { (*signal).signal() };
        }
        bucket.fetch_sub(1, Ordering::SeqCst);
    }

    /// Whether the hook currently points at a waitset slot.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        !self.signal.load(Ordering::SeqCst).is_null()
    }

    /// Whether the owning origin has been destroyed.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Detach permanently. Called by origins when they are dropped.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
        if !self.signal.swap(ptr::null_mut(), Ordering::SeqCst).is_null() {
            self.wait_quiescent();
        }
    }

    /// Link the hook to `signal`. Fails if the hook is already attached.
    pub(crate) fn arm(&self, signal: &Arc<SignalHandle>) -> bool {
        if self.is_retired() {
            return false;
        }
        let target = Arc::as_ptr(signal).cast_mut();
        self.signal
            .compare_exchange(ptr::null_mut(), target, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Unlink the hook if it still points at `signal`.
    ///
    /// On return no notifier can dereference `signal` through this hook.
    pub(crate) fn disarm(&self, signal: &Arc<SignalHandle>) -> bool {
        let target = Arc::as_ptr(signal).cast_mut();
        let unlinked = self
            .signal
            .compare_exchange(target, ptr::null_mut(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if unlinked {
            self.wait_quiescent();
        }
        unlinked
    }

    /// Wait until every notifier that could have loaded the old pointer left.
    fn wait_quiescent(&self) {
        for _ in 0..2 {
            // New notifiers go to the other bucket while this one drains.
            let draining = self.epoch.fetch_add(1, Ordering::SeqCst) & 1;
            let mut spins = 0u32;
            while self.in_flight[draining].load(Ordering::SeqCst) != 0 {
                if spins < 64 {
                    std::hint::spin_loop();
                    spins += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        }
    }
}

impl Default for WaitsetHook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WaitsetHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitsetHook")
            .field("attached", &self.is_attached())
            .field("retired", &self.is_retired())
            .finish()
    }
}
