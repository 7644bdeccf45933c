// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Waitset driver and origin-side hooks.
//!
//! `WaitsetDriver` owns the OS wake primitive and the slot table of a single
//! [`WaitSet`](crate::WaitSet). `WaitsetHook` is the back-reference an event
//! origin keeps to the slot it is attached to.

mod driver;
mod hook;

pub use driver::{SignalHandle, WaitsetDriver, WaitsetRegistration, WaitsetWaitError};
pub use hook::WaitsetHook;
