// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Trigger - user-controlled event source.
//!
//! The application flips a Trigger to wake a WaitSet, typically to request a
//! shutdown. [`Trigger::trigger`] and [`TriggerHandle::trigger`] perform one
//! atomic store, one atomic pointer load and at most one `write(2)`, so they
//! may be called from an asynchronous signal handler.

use super::{EventId, EventOrigin, EventSource, OriginId};
use crate::core::rt::WaitsetHook;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// When an armed trigger returns to the idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    /// Cleared atomically when a WaitSet reports it.
    #[default]
    AutoReset,
    /// Stays armed until [`Trigger::reset`].
    Latched,
}

/// The single event a [`Trigger`] emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerEvent {
    #[default]
    Fired,
}

impl From<TriggerEvent> for EventId {
    fn from(event: TriggerEvent) -> Self {
        match event {
            TriggerEvent::Fired => EventId::new(0),
        }
    }
}

struct TriggerState {
    id: OriginId,
    mode: TriggerMode,
    armed: AtomicBool,
    hook: WaitsetHook,
}

impl TriggerState {
    fn fire(&self) {
        // Publish before notifying; the driver fences before its pending check.
        self.armed.store(true, Ordering::SeqCst);
        self.hook.notify();
    }
}

impl EventSource for TriggerState {
    fn is_ready(&self, event: EventId) -> bool {
        event == TriggerEvent::Fired.into() && self.armed.load(Ordering::SeqCst)
    }

    fn observe(&self, event: EventId) -> bool {
        if event != TriggerEvent::Fired.into() {
            return false;
        }
        match self.mode {
            TriggerMode::AutoReset => self.armed.swap(false, Ordering::SeqCst),
            TriggerMode::Latched => self.armed.load(Ordering::SeqCst),
        }
    }

    fn hook(&self, event: EventId) -> Option<&WaitsetHook> {
        (event == TriggerEvent::Fired.into()).then_some(&self.hook)
    }
}

/// Boolean event source fired by the application.
///
/// Firing is idempotent: any number of fires before the next `wait()` is
/// reported once. Dropping the trigger detaches it from its WaitSet.
///
/// # Example
///
/// ```rust,no_run
/// use hdds_waitset::{Trigger, WaitSet};
///
/// let waitset: WaitSet = WaitSet::new()?;
/// let shutdown = Trigger::new();
/// waitset.attach(&shutdown, ())?;
///
/// shutdown.trigger();
/// let ready = waitset.wait()?;
/// assert!(ready[0].does_originate_from(&shutdown));
/// # Ok::<(), hdds_waitset::Error>(())
/// ```
pub struct Trigger {
    state: Arc<TriggerState>,
}

impl Trigger {
    /// Auto-reset trigger.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(TriggerMode::AutoReset)
    }

    /// Trigger that stays armed until [`reset`](Self::reset).
    #[must_use]
    pub fn latched() -> Self {
        Self::with_mode(TriggerMode::Latched)
    }

    #[must_use]
    pub fn with_mode(mode: TriggerMode) -> Self {
        Self {
            state: Arc::new(TriggerState {
                id: OriginId::next(),
                mode,
                armed: AtomicBool::new(false),
                hook: WaitsetHook::new(),
            }),
        }
    }

    /// Arm the trigger and wake the attached WaitSet. Async-signal-safe.
    pub fn trigger(&self) {
        self.state.fire();
    }

    /// Whether the trigger is currently armed.
    #[must_use]
    pub fn has_triggered(&self) -> bool {
        self.state.armed.load(Ordering::SeqCst)
    }

    /// Disarm. Returns whether the trigger was armed.
    pub fn reset(&self) -> bool {
        self.state.armed.swap(false, Ordering::SeqCst)
    }

    #[must_use]
    pub fn mode(&self) -> TriggerMode {
        self.state.mode
    }

    #[must_use]
    pub fn origin_id(&self) -> OriginId {
        self.state.id
    }

    /// Whether the trigger is attached to a WaitSet.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state.hook.is_attached()
    }

    /// Fire-only handle for other threads or signal handlers.
    ///
    /// Firing a handle after its trigger was dropped is a no-op.
    #[must_use]
    pub fn handle(&self) -> TriggerHandle {
        TriggerHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Trigger {
    fn drop(&mut self) {
        self.state.hook.retire();
    }
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("id", &self.state.id)
            .field("mode", &self.state.mode)
            .field("armed", &self.has_triggered())
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl EventOrigin for Trigger {
    type Event = TriggerEvent;

    fn origin_id(&self) -> OriginId {
        self.state.id
    }

    fn event_source(&self) -> Arc<dyn EventSource> {
        Arc::clone(&self.state) as Arc<dyn EventSource>
    }
}

/// Cloneable, fire-only reference to a [`Trigger`].
#[derive(Clone)]
pub struct TriggerHandle {
    state: Arc<TriggerState>,
}

impl TriggerHandle {
    /// Same as [`Trigger::trigger`]. Async-signal-safe.
    pub fn trigger(&self) {
        self.state.fire();
    }

    #[must_use]
    pub fn origin_id(&self) -> OriginId {
        self.state.id
    }
}

impl std::fmt::Debug for TriggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerHandle")
            .field("id", &self.state.id)
            .finish()
    }
}
