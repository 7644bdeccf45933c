// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global configuration - single source of truth for limits and defaults.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time constants (capacities, name limits)
//! - **Level 2 (Dynamic)**: [`RuntimeConfig`] for per-runtime sizing, with
//!   environment overrides and optional YAML files (`config-loaders` feature)
//!
//! # Example
//!
//! ```ignore
//! use hdds_waitset::config::*;
//!
//! let config = RuntimeConfig::from_env()?;
//! assert!(config.waitset_capacity <= MAX_WAITSET_CAPACITY);
//! ```

use crate::{Error, Result};

// =======================================================================
// WaitSet limits
// =======================================================================

/// Attachments per WaitSet when no explicit capacity is given.
pub const WAITSET_DEFAULT_CAPACITY: usize = 128;

/// Upper bound accepted for any WaitSet capacity.
pub const MAX_WAITSET_CAPACITY: usize = 4096;

// =======================================================================
// Endpoint limits
// =======================================================================

/// Default depth of a subscriber receive queue.
pub const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: u64 = 256;

/// Upper bound for a subscriber receive queue.
pub const MAX_SUBSCRIBER_QUEUE_CAPACITY: u64 = 256;

/// Upper bound for the number of samples a publisher keeps for late joiners.
pub const MAX_PUBLISHER_HISTORY: u64 = 16;

/// Maximum length (bytes) of each service/instance/event identifier.
pub const MAX_IDENTIFIER_LENGTH: usize = 100;

/// Maximum length (bytes) of the runtime name.
pub const MAX_RUNTIME_NAME_LENGTH: usize = 100;

// =======================================================================
// Chunk pool sizing
// =======================================================================

/// Default number of chunks shared by all publishers of a runtime.
pub const DEFAULT_CHUNK_COUNT: usize = 1024;

/// Default maximum encoded payload size (bytes).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Hard limit for `max_payload_size`.
pub const MAX_PAYLOAD_SIZE_LIMIT: usize = 16 * 1024 * 1024;

// =======================================================================
// Environment variables
// =======================================================================

/// Overrides [`RuntimeConfig::chunk_count`].
pub const ENV_CHUNK_COUNT: &str = "HDDS_WAITSET_CHUNK_COUNT";

/// Overrides [`RuntimeConfig::max_payload_size`].
pub const ENV_MAX_PAYLOAD_SIZE: &str = "HDDS_WAITSET_MAX_PAYLOAD_SIZE";

/// Overrides [`RuntimeConfig::waitset_capacity`].
pub const ENV_WAITSET_CAPACITY: &str = "HDDS_WAITSET_CAPACITY";

/// Per-runtime sizing.
///
/// Pool sizing is fixed once a [`Runtime`](crate::Runtime) is built;
/// `waitset_capacity` only affects WaitSets created afterwards through
/// [`Runtime::create_waitset`](crate::Runtime::create_waitset).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "config-loaders",
    derive(serde::Deserialize, serde::Serialize),
    serde(default, deny_unknown_fields)
)]
pub struct RuntimeConfig {
    /// Maximum number of payload chunks outstanding at once.
    pub chunk_count: usize,
    /// Maximum encoded payload size in bytes.
    pub max_payload_size: usize,
    /// Capacity of WaitSets created by the runtime.
    pub waitset_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            chunk_count: DEFAULT_CHUNK_COUNT,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            waitset_capacity: WAITSET_DEFAULT_CAPACITY,
        }
    }
}

impl RuntimeConfig {
    /// Defaults with `HDDS_WAITSET_*` environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `HDDS_WAITSET_*` environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(value) = env_usize(ENV_CHUNK_COUNT)? {
            self.chunk_count = value;
        }
        if let Some(value) = env_usize(ENV_MAX_PAYLOAD_SIZE)? {
            self.max_payload_size = value;
        }
        if let Some(value) = env_usize(ENV_WAITSET_CAPACITY)? {
            self.waitset_capacity = value;
        }
        self.validate()?;
        Ok(self)
    }

    #[must_use]
    pub fn chunk_count(mut self, count: usize) -> Self {
        self.chunk_count = count;
        self
    }

    #[must_use]
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    #[must_use]
    pub fn waitset_capacity(mut self, capacity: usize) -> Self {
        self.waitset_capacity = capacity;
        self
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_count == 0 {
            return Err(Error::InvalidConfig("chunk_count must be > 0".to_string()));
        }
        if self.max_payload_size == 0 || self.max_payload_size > MAX_PAYLOAD_SIZE_LIMIT {
            return Err(Error::InvalidConfig(format!(
                "max_payload_size must be in 1..={} (got {})",
                MAX_PAYLOAD_SIZE_LIMIT, self.max_payload_size
            )));
        }
        validate_waitset_capacity(self.waitset_capacity)
    }

    /// Parse a YAML document. Missing keys fall back to defaults.
    #[cfg(feature = "config-loaders")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidConfig(format!("YAML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file.
    #[cfg(feature = "config-loaders")]
    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ConfigFileNotFound(path.display().to_string()),
            _ => Error::IoError(e),
        })?;
        Self::from_yaml_str(&content)
    }
}

pub(crate) fn validate_waitset_capacity(capacity: usize) -> Result<()> {
    if capacity == 0 || capacity > MAX_WAITSET_CAPACITY {
        return Err(Error::InvalidConfig(format!(
            "waitset capacity must be in 1..={} (got {})",
            MAX_WAITSET_CAPACITY, capacity
        )));
    }
    Ok(())
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| Error::InvalidConfig(format!("{}='{}' is not a number", key, raw))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(Error::InvalidConfig(format!(
            "{} is not valid unicode",
            key
        ))),
    }
}
