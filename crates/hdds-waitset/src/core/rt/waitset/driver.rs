// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Waitset driver for coalesced multi-slot notification.
//!
//! Provides `WaitsetDriver` for registering attachment slots and blocking until
//! any of them is signalled.
//!
//! - On Linux: eventfd + poll.
//! - On other Unix targets: non-blocking self-pipe + poll.
//! - On Windows: manual-reset kernel Event + WaitForSingleObject.
//!
//! Signalling a slot touches one atomic flag and performs at most one
//! `write(2)` (or `SetEvent`). It never locks, allocates or logs, so it may be
//! invoked from an asynchronous signal handler.

use std::io;
use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Errors returned by [`WaitsetDriver::wait`].
#[derive(Debug)]
pub enum WaitsetWaitError {
    Timeout,
    Io(io::Error),
}

/// Driver responsible for managing event-backed notifications.
#[derive(Clone)]
pub struct WaitsetDriver {
    inner: Arc<WaitsetDriverInner>,
}

impl WaitsetDriver {
    /// Create a new waitset driver capable of tracking up to `max_slots`
    /// concurrent registrations.
    pub fn new(max_slots: usize) -> io::Result<Self> {
        if max_slots == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "max_slots must be > 0",
            ));
        }

        let event_handle = platform::create_event()?;

        Ok(Self {
            inner: Arc::new(WaitsetDriverInner {
                event_handle,
                pending: AtomicBool::new(false),
                slots: Mutex::new(SlotTable::new(max_slots)),
                max_slots,
            }),
        })
    }

    /// Maximum number of concurrently registered slots.
    #[must_use]
    pub fn max_slots(&self) -> usize {
        self.inner.max_slots
    }

    /// Register a new slot and obtain the associated [`SignalHandle`].
    ///
    /// Returns `None` once `max_slots` registrations are live.
    pub fn register_slot(&self) -> Option<WaitsetRegistration> {
        let (slot_index, slot_id) = {
            let mut table = match self.inner.slots.lock() {
                Ok(guard) => guard,
                Err(poisoned) => {
                    log::debug!("[rt] waitset slot table poisoned (register), recovering");
                    poisoned.into_inner()
                }
            };
            table.allocate_slot(self.inner.max_slots)?
        };

        let signal = Arc::new(SignalHandle {
            inner: Arc::clone(&self.inner),
            slot_id,
        });

        Some(WaitsetRegistration { slot_index, signal })
    }

    /// Unregister a previously allocated slot. Returns `true` if the slot was
    /// successfully removed.
    pub fn unregister_slot(&self, slot_index: usize, slot_id: u64) -> bool {
        let mut table = match self.inner.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::debug!("[rt] waitset slot table poisoned (unregister), recovering");
                poisoned.into_inner()
            }
        };
        table.release_slot(slot_index, slot_id)
    }

    /// Number of currently registered slots.
    #[must_use]
    pub fn registered_slots(&self) -> usize {
        self.inner
            .slots
            .lock()
            .map(|table| table.live)
            .unwrap_or_else(|poisoned| poisoned.into_inner().live)
    }

    /// Block until the driver has been signalled at least once since the
    /// previous `wait` returned.
    ///
    /// Wakeups are coalesced: any number of signals between two waits produce
    /// one wakeup. Callers re-evaluate readiness after returning.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<(), WaitsetWaitError> {
        platform::wait_event(&self.inner.event_handle, timeout)?;
        platform::drain_event(&self.inner.event_handle);
        // Re-open the coalescing window before the caller scans readiness;
        // pairs with the fence in `write_event`.
        self.inner.pending.store(false, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        Ok(())
    }

    /// Manually wake the underlying event.
    pub fn manual_notify(&self) {
        self.inner.write_event();
    }
}

struct WaitsetDriverInner {
    event_handle: platform::EventHandle,
    pending: AtomicBool,
    slots: Mutex<SlotTable>,
    max_slots: usize,
}

impl WaitsetDriverInner {
    fn write_event(&self) {
        // Readiness written by the caller must be visible before `pending`
        // is examined; pairs with the fence in `WaitsetDriver::wait`.
        fence(Ordering::SeqCst);
        if !self.pending.swap(true, Ordering::SeqCst) {
            platform::signal_event(&self.event_handle);
        }
    }
}

impl Drop for WaitsetDriverInner {
    fn drop(&mut self) {
        platform::close_event(&self.event_handle);
    }
}

fn timeout_millis(timeout: Option<Duration>) -> Option<u128> {
    // Round up so a sub-millisecond remainder never degrades into a spin.
    timeout.map(|d| {
        let ms = d.as_millis();
        if d.subsec_nanos() % 1_000_000 != 0 {
            ms + 1
        } else {
            ms
        }
    })
}

// =============================================================================
// Linux implementation (eventfd + poll)
// =============================================================================
#[cfg(target_os = "linux")]
mod platform {
    use std::io;
    use std::os::fd::RawFd;
    use std::time::Duration;

    use super::WaitsetWaitError;

    const EVENTFD_FLAGS: libc::c_int = libc::EFD_NONBLOCK | libc::EFD_CLOEXEC;

    pub type EventHandle = RawFd;

    pub fn create_event() -> io::Result<EventHandle> {
        // SAFETY: eventfd is invoked with valid flags and no shared state.
        let fd = unsafe { libc::eventfd(0, EVENTFD_FLAGS) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(fd)
    }

    pub fn wait_event(
        handle: &EventHandle,
        timeout: Option<Duration>,
    ) -> Result<(), WaitsetWaitError> {
        super::unix_poll(*handle, timeout)
    }

    pub fn signal_event(handle: &EventHandle) {
        let payload = 1u64.to_ne_bytes();
        loop {
            // SAFETY: payload references a stack buffer with the 8-byte eventfd payload.
            let ret = unsafe { libc::write(*handle, payload.as_ptr().cast(), payload.len()) };
            if ret >= 0 {
                break;
            }
            // EAGAIN means the counter is saturated, which still wakes the poller.
            // No logging here: this path runs in signal context.
            if io::Error::last_os_error().kind() != io::ErrorKind::Interrupted {
                break;
            }
        }
    }

    pub fn drain_event(handle: &EventHandle) {
        let mut payload = [0u8; 8];
        loop {
            // SAFETY: payload is a stack buffer sized to the eventfd read requirements (8 bytes).
            let ret = unsafe { libc::read(*handle, payload.as_mut_ptr().cast(), payload.len()) };
            if ret >= 0 {
                break;
            }

            let err = io::Error::last_os_error();
            let kind = err.kind();
            if kind == io::ErrorKind::Interrupted {
                continue;
            }
            if kind == io::ErrorKind::WouldBlock {
                break;
            }
            log::debug!("[rt] waitset eventfd read failed: {}", err);
            break;
        }
    }

    pub fn close_event(handle: &EventHandle) {
        // SAFETY: eventfd was obtained via libc::eventfd and is closed once here.
        unsafe {
            libc::close(*handle);
        }
    }
}

// =============================================================================
// Other Unix implementation (self-pipe + poll)
// =============================================================================
#[cfg(all(unix, not(target_os = "linux")))]
mod platform {
    use std::io;
    use std::os::fd::RawFd;
    use std::time::Duration;

    use super::WaitsetWaitError;

    pub struct EventHandle {
        read_fd: RawFd,
        write_fd: RawFd,
    }

    fn set_nonblocking_cloexec(fd: RawFd) -> io::Result<()> {
        // SAFETY: fcntl on a descriptor we own, with valid commands.
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL);
            if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
                return Err(io::Error::last_os_error());
            }
            let fd_flags = libc::fcntl(fd, libc::F_GETFD);
            if fd_flags < 0 || libc::fcntl(fd, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC) < 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    pub fn create_event() -> io::Result<EventHandle> {
        let mut fds: [libc::c_int; 2] = [-1; 2];
        // SAFETY: fds is a valid two-element array for pipe(2) to fill.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
            return Err(io::Error::last_os_error());
        }
        let handle = EventHandle {
            read_fd: fds[0],
            write_fd: fds[1],
        };
        if let Err(err) =
            set_nonblocking_cloexec(handle.read_fd).and(set_nonblocking_cloexec(handle.write_fd))
        {
            close_event(&handle);
            return Err(err);
        }
        Ok(handle)
    }

    pub fn wait_event(
        handle: &EventHandle,
        timeout: Option<Duration>,
    ) -> Result<(), WaitsetWaitError> {
        super::unix_poll(handle.read_fd, timeout)
    }

    pub fn signal_event(handle: &EventHandle) {
        let payload = [1u8];
        loop {
            // SAFETY: one-byte stack buffer written to our own pipe.
            let ret = unsafe { libc::write(handle.write_fd, payload.as_ptr().cast(), 1) };
            if ret >= 0 {
                break;
            }
            // A full pipe already guarantees the reader wakes up.
            if io::Error::last_os_error().kind() != io::ErrorKind::Interrupted {
                break;
            }
        }
    }

    pub fn drain_event(handle: &EventHandle) {
        let mut payload = [0u8; 64];
        loop {
            // SAFETY: payload is a stack buffer of the length passed to read(2).
            let ret =
                unsafe { libc::read(handle.read_fd, payload.as_mut_ptr().cast(), payload.len()) };
            if ret > 0 {
                continue;
            }
            if ret == 0 {
                break;
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => break,
                _ => {
                    log::debug!("[rt] waitset pipe read failed: {}", err);
                    break;
                }
            }
        }
    }

    pub fn close_event(handle: &EventHandle) {
        // SAFETY: both descriptors were obtained via pipe(2) and are closed once here.
        unsafe {
            libc::close(handle.read_fd);
            libc::close(handle.write_fd);
        }
    }
}

#[cfg(unix)]
fn unix_poll(
    fd: std::os::fd::RawFd,
    timeout: Option<Duration>,
) -> Result<(), WaitsetWaitError> {
    let timeout_ms = timeout_millis(timeout)
        .map(|ms| i32::try_from(ms).unwrap_or(i32::MAX))
        .unwrap_or(-1);

    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    loop {
        let poll_target = std::ptr::addr_of_mut!(pollfd);
        // SAFETY: poll_target points to our stack-allocated pollfd structure.
        let res = unsafe { libc::poll(poll_target, 1, timeout_ms) };
        if res == 0 {
            return Err(WaitsetWaitError::Timeout);
        }
        if res < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(WaitsetWaitError::Io(err));
        }
        return Ok(());
    }
}

// =============================================================================
// Windows implementation (kernel Event object)
// =============================================================================
#[cfg(windows)]
mod platform {
    use std::io;
    use std::time::Duration;

    use super::WaitsetWaitError;

    const INFINITE: u32 = 0xFFFFFFFF;
    const WAIT_OBJECT_0: u32 = 0;
    const WAIT_TIMEOUT: u32 = 258;

    pub struct EventHandle(std::os::windows::io::RawHandle);

    // SAFETY: Windows Event objects are inherently thread-safe kernel objects.
    unsafe impl Send for EventHandle {}
    unsafe impl Sync for EventHandle {}

    extern "system" {
        fn CreateEventW(
            lpEventAttributes: *const std::ffi::c_void,
            bManualReset: i32,
            bInitialState: i32,
            lpName: *const u16,
        ) -> *mut std::ffi::c_void;

        fn SetEvent(hEvent: *mut std::ffi::c_void) -> i32;
        fn ResetEvent(hEvent: *mut std::ffi::c_void) -> i32;
        fn WaitForSingleObject(hHandle: *mut std::ffi::c_void, dwMilliseconds: u32) -> u32;
        fn CloseHandle(hObject: *mut std::ffi::c_void) -> i32;
    }

    pub fn create_event() -> io::Result<EventHandle> {
        // SAFETY: CreateEventW with null security attributes and name creates an unnamed
        // manual-reset event.
        let handle = unsafe { CreateEventW(std::ptr::null(), 1, 0, std::ptr::null()) };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(EventHandle(handle as std::os::windows::io::RawHandle))
    }

    pub fn wait_event(
        handle: &EventHandle,
        timeout: Option<Duration>,
    ) -> Result<(), WaitsetWaitError> {
        let timeout_ms = super::timeout_millis(timeout)
            .map(|ms| u32::try_from(ms).unwrap_or(INFINITE - 1))
            .unwrap_or(INFINITE);

        // SAFETY: WaitForSingleObject with a valid event handle from CreateEventW.
        let result = unsafe { WaitForSingleObject(handle.0 as *mut _, timeout_ms) };
        match result {
            WAIT_OBJECT_0 => Ok(()),
            WAIT_TIMEOUT => Err(WaitsetWaitError::Timeout),
            _ => Err(WaitsetWaitError::Io(io::Error::last_os_error())),
        }
    }

    pub fn signal_event(handle: &EventHandle) {
        // SAFETY: SetEvent with a valid event handle from CreateEventW.
        unsafe {
            SetEvent(handle.0 as *mut _);
        }
    }

    pub fn drain_event(handle: &EventHandle) {
        // SAFETY: ResetEvent with a valid event handle from CreateEventW.
        unsafe {
            ResetEvent(handle.0 as *mut _);
        }
    }

    pub fn close_event(handle: &EventHandle) {
        // SAFETY: CloseHandle with a valid event handle, called once in Drop.
        unsafe {
            CloseHandle(handle.0 as *mut _);
        }
    }
}

/// Registration details returned by [`WaitsetDriver::register_slot`].
pub struct WaitsetRegistration {
    slot_index: usize,
    signal: Arc<SignalHandle>,
}

impl WaitsetRegistration {
    /// Split into the slot index and the signal handle owned by the attachment.
    pub fn into_parts(self) -> (usize, Arc<SignalHandle>) {
        (self.slot_index, self.signal)
    }
}

/// Wake handle for one registered slot.
///
/// Keeps the driver (and its OS event) alive for as long as the handle exists,
/// so signalling never races with the event being closed.
pub struct SignalHandle {
    inner: Arc<WaitsetDriverInner>,
    slot_id: u64,
}

impl SignalHandle {
    /// Wake the owning waitset. Async-signal-safe.
    pub fn signal(&self) {
        self.inner.write_event();
    }

    /// Stable identifier for this registration.
    #[must_use]
    pub fn slot_id(&self) -> u64 {
        self.slot_id
    }
}

struct SlotTable {
    entries: Vec<Option<SlotEntry>>,
    free: Vec<usize>,
    next_id: u64,
    live: usize,
}

impl SlotTable {
    fn new(max_slots: usize) -> Self {
        Self {
            entries: Vec::with_capacity(max_slots),
            free: Vec::new(),
            next_id: 1,
            live: 0,
        }
    }

    fn allocate_slot(&mut self, max_slots: usize) -> Option<(usize, u64)> {
        // Lowest free index first keeps ready-set ordering stable.
        let slot_index = if let Some(pos) = self
            .free
            .iter()
            .enumerate()
            .min_by_key(|(_, index)| **index)
            .map(|(pos, _)| pos)
        {
            self.free.swap_remove(pos)
        } else {
            let index = self.entries.len();
            if index >= max_slots {
                return None;
            }
            self.entries.push(None);
            index
        };

        let slot_id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);

        self.entries[slot_index] = Some(SlotEntry { id: slot_id });
        self.live += 1;

        Some((slot_index, slot_id))
    }

    fn release_slot(&mut self, slot_index: usize, slot_id: u64) -> bool {
        match self.entries.get(slot_index) {
            Some(Some(entry)) if entry.id == slot_id => {
                self.entries[slot_index] = None;
                self.free.push(slot_index);
                self.live -= 1;
                true
            }
            _ => false,
        }
    }
}

struct SlotEntry {
    id: u64,
}
