// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WaitSet - block on several event sources, dispatch by origin.
//!
//! Backed by the runtime waitset driver (`core::rt::waitset`), which parks the
//! caller on one coalesced OS event. Each attachment owns a driver slot and the
//! `Arc<SignalHandle>` that the origin's
//! [`WaitsetHook`](crate::core::rt::WaitsetHook) points at; the WaitSet
//! only holds a `Weak` to the origin's state, so origins and WaitSets can be
//! dropped in any order.
//!
//! Readiness is level-triggered and evaluated before every block, so a source
//! that became ready before `wait()` was entered is never missed.

use crate::config::{self, WAITSET_DEFAULT_CAPACITY};
use crate::core::rt::{SignalHandle, WaitsetDriver, WaitsetWaitError};
use crate::event::{EventId, EventOrigin, EventSource, OriginId};
use crate::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

/// Multiplexer over attached event origins.
///
/// `K` is the caller's tag type, returned with every [`ReadyEvent`] so the
/// dispatch loop can `match` on a closed enum instead of comparing origins.
///
/// # Example
///
/// ```rust,no_run
/// use hdds_waitset::{Trigger, WaitSet};
///
/// #[derive(Clone, Copy, Debug)]
/// enum Source {
///     Shutdown,
///     Tick,
/// }
///
/// let waitset: WaitSet<Source> = WaitSet::new()?;
/// let shutdown = Trigger::new();
/// let tick = Trigger::new();
/// waitset.attach(&shutdown, Source::Shutdown)?;
/// waitset.attach(&tick, Source::Tick)?;
///
/// tick.trigger();
/// for event in waitset.wait()? {
///     match event.tag() {
///         Source::Shutdown => return Ok(()),
///         Source::Tick => println!("tick from {}", event.origin_id()),
///     }
/// }
/// # Ok::<(), hdds_waitset::Error>(())
/// ```
pub struct WaitSet<K = ()> {
    driver: WaitsetDriver,
    capacity: usize,
    entries: Mutex<Vec<Option<Attachment<K>>>>,
}

struct Attachment<K> {
    source: Weak<dyn EventSource>,
    origin: OriginId,
    event: EventId,
    tag: K,
    slot_index: usize,
    signal: Arc<SignalHandle>,
}

impl<K> Attachment<K> {
    /// Live source, or `None` once the origin is gone or has retired its hook.
    fn live_source(&self) -> Option<Arc<dyn EventSource>> {
        let source = self.source.upgrade()?;
        let live = source
            .hook(self.event)
            .is_some_and(|hook| !hook.is_retired());
        live.then_some(source)
    }

    fn unlink(&self, source: Option<&Arc<dyn EventSource>>) {
        if let Some(hook) = source.and_then(|s| s.hook(self.event)) {
            hook.disarm(&self.signal);
        }
    }
}

impl<K> WaitSet<K> {
    /// Create a WaitSet with [`WAITSET_DEFAULT_CAPACITY`] attachment slots.
    pub fn new() -> Result<Self> {
        Self::with_capacity(WAITSET_DEFAULT_CAPACITY)
    }

    /// Create a WaitSet holding at most `capacity` attachments.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        config::validate_waitset_capacity(capacity)?;
        let driver = WaitsetDriver::new(capacity)?;
        log::debug!("[waitset] created capacity={}", capacity);
        Ok(Self {
            driver,
            capacity,
            entries: Mutex::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live attachments.
    #[must_use]
    pub fn len(&self) -> usize {
        let mut entries = self.lock_entries();
        self.prune(&mut entries);
        entries.iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach `origin` for its default event.
    pub fn attach<O: EventOrigin>(&self, origin: &O, tag: K) -> Result<()> {
        self.attach_event(origin, O::Event::default(), tag)
    }

    /// Attach one (origin, event) pair.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedEvent`] if the origin never emits `event`
    /// - [`Error::AlreadyAttached`] if the pair is attached to any WaitSet
    /// - [`Error::WaitSetFull`] if all slots are in use
    pub fn attach_event<O: EventOrigin>(&self, origin: &O, event: O::Event, tag: K) -> Result<()> {
        let event_id: EventId = event.into();
        let origin_id = origin.origin_id();
        let source = origin.event_source();
        let hook = source
            .hook(event_id)
            .ok_or(Error::UnsupportedEvent(event_id))?;

        let signal = {
            let mut entries = self.lock_entries();
            self.prune(&mut entries);

            if hook.is_attached() {
                return Err(Error::AlreadyAttached);
            }
            if entries.iter().flatten().count() >= self.capacity {
                return Err(Error::WaitSetFull {
                    capacity: self.capacity,
                });
            }

            let (slot_index, signal) = self
                .driver
                .register_slot()
                .ok_or(Error::WaitSetFull {
                    capacity: self.capacity,
                })?
                .into_parts();

            if !hook.arm(&signal) {
                // Lost a race with another attach, or the origin is being dropped.
                self.driver.unregister_slot(slot_index, signal.slot_id());
                return Err(Error::AlreadyAttached);
            }

            if slot_index >= entries.len() {
                entries.resize_with(slot_index + 1, || None);
            }
            entries[slot_index] = Some(Attachment {
                source: Arc::downgrade(&source),
                origin: origin_id,
                event: event_id,
                tag,
                slot_index,
                signal: Arc::clone(&signal),
            });

            log::debug!(
                "[waitset] attached {} {} slot={}",
                origin_id,
                event_id,
                slot_index
            );
            signal
        };

        if source.is_ready(event_id) {
            signal.signal();
        }
        Ok(())
    }

    /// Detach one (origin, event) pair. Returns `false` if it was not attached here.
    pub fn detach_event<O: EventOrigin>(&self, origin: &O, event: O::Event) -> bool {
        let event_id: EventId = event.into();
        let origin_id = origin.origin_id();
        let mut entries = self.lock_entries();
        let detached = self.remove_where(&mut entries, |a| {
            a.origin == origin_id && a.event == event_id
        });
        detached > 0
    }

    /// Detach every event of `origin`. Returns the number of attachments removed.
    pub fn detach<O: EventOrigin>(&self, origin: &O) -> usize {
        let origin_id = origin.origin_id();
        let mut entries = self.lock_entries();
        self.remove_where(&mut entries, |a| a.origin == origin_id)
    }

    /// Whether the (origin, event) pair is attached to this WaitSet.
    #[must_use]
    pub fn is_attached<O: EventOrigin>(&self, origin: &O, event: O::Event) -> bool {
        let event_id: EventId = event.into();
        let origin_id = origin.origin_id();
        self.lock_entries()
            .iter()
            .flatten()
            .any(|a| a.origin == origin_id && a.event == event_id && a.live_source().is_some())
    }

    /// Wake a blocked `wait()` without making anything ready.
    ///
    /// The waiter re-evaluates readiness and blocks again if nothing is ready.
    pub fn notify(&self) {
        self.driver.manual_notify();
    }

    fn lock_entries(&self) -> MutexGuard<'_, Vec<Option<Attachment<K>>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::debug!("[waitset] entries mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Drop attachments whose origin was destroyed.
    fn prune(&self, entries: &mut [Option<Attachment<K>>]) {
        for entry in entries.iter_mut() {
            let stale = entry.as_ref().is_some_and(|a| a.live_source().is_none());
            if stale {
                if let Some(attachment) = entry.take() {
                    log::trace!(
                        "[waitset] pruned {} {} slot={}",
                        attachment.origin,
                        attachment.event,
                        attachment.slot_index
                    );
                    attachment.unlink(attachment.source.upgrade().as_ref());
                    self.driver
                        .unregister_slot(attachment.slot_index, attachment.signal.slot_id());
                }
            }
        }
    }

    fn remove_where(
        &self,
        entries: &mut [Option<Attachment<K>>],
        mut predicate: impl FnMut(&Attachment<K>) -> bool,
    ) -> usize {
        let mut removed = 0;
        for entry in entries.iter_mut() {
            if !entry.as_ref().is_some_and(&mut predicate) {
                continue;
            }
            if let Some(attachment) = entry.take() {
                attachment.unlink(attachment.source.upgrade().as_ref());
                self.driver
                    .unregister_slot(attachment.slot_index, attachment.signal.slot_id());
                log::debug!(
                    "[waitset] detached {} {} slot={}",
                    attachment.origin,
                    attachment.event,
                    attachment.slot_index
                );
                removed += 1;
            }
        }
        removed
    }
}

impl<K: Clone> WaitSet<K> {
    /// Block until at least one attached source is ready.
    ///
    /// Returns every ready source in attachment-slot order; never empty.
    pub fn wait(&self) -> Result<Vec<ReadyEvent<K>>> {
        self.wait_until(None)
    }

    /// Like [`wait`](Self::wait), but returns an empty vector once `timeout`
    /// elapses without any source becoming ready.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Vec<ReadyEvent<K>>> {
        self.wait_until(Instant::now().checked_add(timeout))
    }

    fn wait_until(&self, deadline: Option<Instant>) -> Result<Vec<ReadyEvent<K>>> {
        loop {
            let ready = self.collect_ready();
            if !ready.is_empty() {
                log::trace!("[waitset] wait returning ready_len={}", ready.len());
                return Ok(ready);
            }

            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(Vec::new());
                    }
                    Some(deadline - now)
                }
                None => None,
            };

            match self.driver.wait(remaining) {
                Ok(()) => {}
                Err(WaitsetWaitError::Timeout) => return Ok(self.collect_ready()),
                Err(WaitsetWaitError::Io(err)) => {
                    log::warn!("[waitset] wait failed: {}", err);
                    return Err(Error::IoError(err));
                }
            }
        }
    }

    fn collect_ready(&self) -> Vec<ReadyEvent<K>> {
        let mut entries = self.lock_entries();
        self.prune(&mut entries);

        entries
            .iter()
            .flatten()
            .filter_map(|a| {
                let source = a.source.upgrade()?;
                source.observe(a.event).then(|| ReadyEvent {
                    origin: a.origin,
                    event: a.event,
                    tag: a.tag.clone(),
                })
            })
            .collect()
    }
}

impl<K> Drop for WaitSet<K> {
    fn drop(&mut self) {
        let entries = match self.entries.get_mut() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        for attachment in entries.iter_mut().filter_map(Option::take) {
            attachment.unlink(attachment.source.upgrade().as_ref());
            self.driver
                .unregister_slot(attachment.slot_index, attachment.signal.slot_id());
        }
    }
}

impl<K> std::fmt::Debug for WaitSet<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitSet")
            .field("capacity", &self.capacity)
            .field("slots", &self.driver.registered_slots())
            .finish()
    }
}

/// One ready (origin, event) pair reported by [`WaitSet::wait`].
#[derive(Debug, Clone)]
pub struct ReadyEvent<K> {
    origin: OriginId,
    event: EventId,
    tag: K,
}

impl<K> ReadyEvent<K> {
    /// Whether this event was emitted by `origin`.
    #[must_use]
    pub fn does_originate_from<O: EventOrigin>(&self, origin: &O) -> bool {
        self.origin == origin.origin_id()
    }

    /// Checked lookup: hands `candidate` back if it is the origin of this event.
    #[must_use]
    pub fn origin<'a, O: EventOrigin>(&self, candidate: &'a O) -> Option<&'a O> {
        self.does_originate_from(candidate).then_some(candidate)
    }

    /// Whether this is `event` (of any origin).
    #[must_use]
    pub fn is_event<E: Into<EventId>>(&self, event: E) -> bool {
        self.event == event.into()
    }

    /// Tag given at attach time.
    #[must_use]
    pub fn tag(&self) -> &K {
        &self.tag
    }

    #[must_use]
    pub fn into_tag(self) -> K {
        self.tag
    }

    #[must_use]
    pub fn origin_id(&self) -> OriginId {
        self.origin
    }

    #[must_use]
    pub fn event_id(&self) -> EventId {
        self.event
    }
}
