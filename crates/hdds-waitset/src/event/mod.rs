// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event sources that can be attached to a [`WaitSet`](crate::WaitSet).
//!
//! An *origin* is the user-facing object (a [`Trigger`], a
//! [`Subscriber`](crate::Subscriber)); its *event source* is the shared state
//! the WaitSet inspects. The WaitSet only keeps a `Weak` to the source and the
//! origin owns one [`WaitsetHook`] per event, so either side may be dropped
//! first.

mod trigger;

pub use trigger::{Trigger, TriggerEvent, TriggerHandle, TriggerMode};

use crate::core::rt::WaitsetHook;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_ORIGIN_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an event origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OriginId(u64);

impl OriginId {
    /// Allocate a fresh identity. Never returns the same value twice.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ORIGIN_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "origin#{}", self.0)
    }
}

/// Selector for origins that can become ready for more than one reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u32);

impl EventId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

/// Readiness state shared between an origin and the WaitSets it is attached to.
///
/// Implementations must publish a readiness change *before* calling
/// [`WaitsetHook::notify`] on the matching hook.
pub trait EventSource: Send + Sync {
    /// Side-effect free readiness check.
    fn is_ready(&self, event: EventId) -> bool;

    /// Readiness check performed when a WaitSet reports the event. Sources
    /// with consume-on-observe semantics (auto-reset triggers) clear their
    /// state here.
    fn observe(&self, event: EventId) -> bool {
        self.is_ready(event)
    }

    /// Hook for `event`, or `None` if the source never emits it.
    fn hook(&self, event: EventId) -> Option<&WaitsetHook>;
}

/// An object that can be attached to a WaitSet.
pub trait EventOrigin {
    /// Events this origin can emit. `Default` is used by `WaitSet::attach`.
    type Event: Copy + Default + Into<EventId>;

    fn origin_id(&self) -> OriginId;

    fn event_source(&self) -> Arc<dyn EventSource>;
}

#[cfg(test)]
mod tests;
