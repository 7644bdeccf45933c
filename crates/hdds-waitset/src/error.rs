// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type shared by the runtime, WaitSet and endpoint APIs.
//!
//! Ordinary absence of data is never an error: `Subscriber::take` reports it
//! through [`TakeOutcome`](crate::TakeOutcome). This enum covers failures the
//! caller has to act on at the call site.

use crate::event::EventId;

/// Errors returned by hdds-waitset operations.
///
/// # Example
///
/// ```rust,no_run
/// use hdds_waitset::{Error, Trigger, WaitSet};
///
/// let waitset: WaitSet<u8> = WaitSet::with_capacity(1)?;
/// let first = Trigger::new();
/// let second = Trigger::new();
/// waitset.attach(&first, 1)?;
///
/// match waitset.attach(&second, 2) {
///     Err(Error::WaitSetFull { capacity }) => println!("full at {}", capacity),
///     Err(e) => println!("other error: {}", e),
///     Ok(()) => println!("attached"),
/// }
/// # Ok::<(), Error>(())
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// `Runtime::get` called before `Runtime::init`.
    RuntimeNotInitialized,
    /// `Runtime::init` called again with a different name (holds the existing name).
    RuntimeAlreadyInitialized(String),
    /// Runtime name is empty, too long, or contains a path separator.
    InvalidRuntimeName(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration value out of range or unparsable.
    InvalidConfig(String),
    /// Configuration file not found at specified path.
    ConfigFileNotFound(String),
    /// Service/instance/event identifier rejected.
    InvalidServiceDescription(String),

    // ========================================================================
    // WaitSet Errors
    // ========================================================================
    /// Attaching would exceed the WaitSet capacity.
    WaitSetFull { capacity: usize },
    /// The (origin, event) pair is already attached to a WaitSet.
    AlreadyAttached,
    /// The origin does not emit the requested event.
    UnsupportedEvent(EventId),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Publisher is not offering its service.
    NotOffered,
    /// The service channel was torn down.
    ServiceClosed,
    /// No free chunk left in the pool.
    PoolExhausted,
    /// Encoded payload exceeds the configured maximum.
    PayloadTooLarge { size: usize, max: usize },
    /// Payload encoding or decoding failed.
    SerializationError(String),
    /// I/O error from the OS wake primitive.
    IoError(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Runtime
            Error::RuntimeNotInitialized => write!(f, "Runtime not initialized"),
            Error::RuntimeAlreadyInitialized(name) => {
                write!(f, "Runtime already initialized as '{}'", name)
            }
            Error::InvalidRuntimeName(name) => write!(f, "Invalid runtime name: '{}'", name),
            // Configuration
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::ConfigFileNotFound(path) => write!(f, "Config file not found: {}", path),
            Error::InvalidServiceDescription(msg) => {
                write!(f, "Invalid service description: {}", msg)
            }
            // WaitSet
            Error::WaitSetFull { capacity } => {
                write!(f, "WaitSet capacity exceeded (max {})", capacity)
            }
            Error::AlreadyAttached => write!(f, "Event is already attached to a WaitSet"),
            Error::UnsupportedEvent(event) => {
                write!(f, "Event {} is not supported by this origin", event)
            }
            // Transport
            Error::NotOffered => write!(f, "Publisher is not offering"),
            Error::ServiceClosed => write!(f, "Service channel closed"),
            Error::PoolExhausted => write!(f, "Chunk pool exhausted"),
            Error::PayloadTooLarge { size, max } => {
                write!(f, "Payload too large: {} bytes (max {})", size, max)
            }
            Error::SerializationError(msg) => write!(f, "Serialization failed: {}", msg),
            Error::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = std::result::Result<T, Error>;
