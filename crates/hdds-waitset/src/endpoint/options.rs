// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint configuration.
//!
//! Builder-style option structs; with the `config-loaders` feature they can
//! also be deserialized from YAML alongside [`RuntimeConfig`](crate::config::RuntimeConfig).

use crate::config::{
    DEFAULT_SUBSCRIBER_QUEUE_CAPACITY, MAX_PUBLISHER_HISTORY, MAX_SUBSCRIBER_QUEUE_CAPACITY,
};
use crate::{Error, Result};

/// What a full receive queue does with a new sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "config-loaders",
    derive(serde::Deserialize, serde::Serialize),
    serde(rename_all = "snake_case")
)]
pub enum QueueFullPolicy {
    /// Evict the oldest queued sample.
    #[default]
    DiscardOldest,
    /// Drop the incoming sample.
    DiscardNewest,
}

/// Subscriber configuration.
///
/// # Example
///
/// ```rust
/// use hdds_waitset::options::{QueueFullPolicy, SubscriberOptions};
///
/// let options = SubscriberOptions::default()
///     .queue_capacity(10)
///     .history_request(2)
///     .queue_full_policy(QueueFullPolicy::DiscardNewest);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "config-loaders",
    derive(serde::Deserialize, serde::Serialize),
    serde(default, deny_unknown_fields)
)]
pub struct SubscriberOptions {
    /// Receive queue depth, `1..=MAX_SUBSCRIBER_QUEUE_CAPACITY`.
    pub queue_capacity: u64,
    /// Samples of publisher history to replay on subscribe.
    pub history_request: u64,
    pub queue_full_policy: QueueFullPolicy,
    /// Subscribe immediately on creation.
    pub subscribe_on_create: bool,
}

impl Default for SubscriberOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
            history_request: 0,
            queue_full_policy: QueueFullPolicy::DiscardOldest,
            subscribe_on_create: true,
        }
    }
}

impl SubscriberOptions {
    #[must_use]
    pub fn queue_capacity(mut self, capacity: u64) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn history_request(mut self, count: u64) -> Self {
        self.history_request = count;
        self
    }

    #[must_use]
    pub fn queue_full_policy(mut self, policy: QueueFullPolicy) -> Self {
        self.queue_full_policy = policy;
        self
    }

    #[must_use]
    pub fn subscribe_on_create(mut self, enabled: bool) -> Self {
        self.subscribe_on_create = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 || self.queue_capacity > MAX_SUBSCRIBER_QUEUE_CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "queue_capacity must be in 1..={} (got {})",
                MAX_SUBSCRIBER_QUEUE_CAPACITY, self.queue_capacity
            )));
        }
        if self.history_request > MAX_PUBLISHER_HISTORY {
            return Err(Error::InvalidConfig(format!(
                "history_request must be <= {} (got {})",
                MAX_PUBLISHER_HISTORY, self.history_request
            )));
        }
        Ok(())
    }
}

/// Publisher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "config-loaders",
    derive(serde::Deserialize, serde::Serialize),
    serde(default, deny_unknown_fields)
)]
pub struct PublisherOptions {
    /// Samples kept for subscribers that join later.
    pub history_capacity: u64,
    /// Offer the service immediately on creation.
    pub offer_on_create: bool,
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            history_capacity: 0,
            offer_on_create: true,
        }
    }
}

impl PublisherOptions {
    #[must_use]
    pub fn history_capacity(mut self, capacity: u64) -> Self {
        self.history_capacity = capacity;
        self
    }

    #[must_use]
    pub fn offer_on_create(mut self, enabled: bool) -> Self {
        self.offer_on_create = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_capacity > MAX_PUBLISHER_HISTORY {
            return Err(Error::InvalidConfig(format!(
                "history_capacity must be <= {} (got {})",
                MAX_PUBLISHER_HISTORY, self.history_capacity
            )));
        }
        Ok(())
    }
}
