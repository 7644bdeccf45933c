// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process runtime: name, configuration, chunk pool and service registry.
//!
//! # Architecture
//!
//! ```text
//! Runtime (one global per process via Runtime::init, or isolated via Runtime::new)
//! +-- name: String
//! +-- config: ArcSwap<RuntimeConfig>        (lock-free reads)
//! +-- pool: Arc<ChunkPool>                  (shared by all publishers)
//! +-- services: DashMap<ServiceDescription, Arc<Channel>>
//!
//! Publisher<T> --+
//!                +--> Arc<Channel> --> ReceivePort (one per Subscriber<T>)
//! Publisher<T> --+
//! ```
//!
//! Endpoints hold their own `Arc<Channel>`. Tearing a service down (or
//! dropping the runtime) closes the channel: live publishers then get
//! `ServiceClosed`, live subscribers drain their queue and get `ChannelClosed`.

use crate::config::{RuntimeConfig, MAX_RUNTIME_NAME_LENGTH};
use crate::core::rt::ChunkPool;
use crate::endpoint::options::{PublisherOptions, SubscriberOptions};
use crate::endpoint::{Channel, Publisher, ServiceDescription, Subscriber};
use crate::payload::Payload;
use crate::waitset::WaitSet;
use crate::{Error, Result};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};

static GLOBAL_RUNTIME: OnceLock<Arc<Runtime>> = OnceLock::new();

/// Endpoint factory and service registry.
pub struct Runtime {
    name: String,
    config: ArcSwap<RuntimeConfig>,
    pool: Arc<ChunkPool>,
    services: DashMap<ServiceDescription, Arc<Channel>>,
}

impl Runtime {
    /// Initialise the process-wide runtime.
    ///
    /// Calling `init` again with the same name returns the existing runtime;
    /// a different name fails with [`Error::RuntimeAlreadyInitialized`].
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use hdds_waitset::Runtime;
    ///
    /// let runtime = Runtime::init("odometry-listener")?;
    /// assert_eq!(runtime.name(), "odometry-listener");
    /// assert!(Runtime::init("other-name").is_err());
    /// # Ok::<(), hdds_waitset::Error>(())
    /// ```
    pub fn init(name: &str) -> Result<Arc<Runtime>> {
        Self::builder(name).init()
    }

    /// The process-wide runtime.
    pub fn get() -> Result<Arc<Runtime>> {
        GLOBAL_RUNTIME
            .get()
            .cloned()
            .ok_or(Error::RuntimeNotInitialized)
    }

    /// Isolated runtime with environment-derived configuration. Not registered
    /// globally; used by tests and embedders running several runtimes.
    pub fn new(name: &str) -> Result<Runtime> {
        Self::builder(name).build()
    }

    #[must_use]
    pub fn builder(name: &str) -> RuntimeBuilder {
        RuntimeBuilder {
            name: name.to_string(),
            config: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> Arc<RuntimeConfig> {
        self.config.load_full()
    }

    /// Replace the configuration.
    ///
    /// Pool sizing is fixed at construction; changing `chunk_count` or
    /// `max_payload_size` is rejected.
    pub fn update_config(&self, config: RuntimeConfig) -> Result<()> {
        config.validate()?;
        let current = self.config.load();
        if config.chunk_count != current.chunk_count
            || config.max_payload_size != current.max_payload_size
        {
            return Err(Error::InvalidConfig(
                "chunk pool sizing cannot change after the runtime is built".to_string(),
            ));
        }
        self.config.store(Arc::new(config));
        Ok(())
    }

    /// Create a typed publisher for `service`.
    pub fn create_publisher<T: Payload>(
        &self,
        service: &ServiceDescription,
        options: PublisherOptions,
    ) -> Result<Publisher<T>> {
        let channel = self.channel(service);
        let publisher = Publisher::new(channel, Arc::clone(&self.pool), options)?;
        log::debug!(
            "[runtime] '{}' created publisher {} for {} ({})",
            self.name,
            publisher.origin_id(),
            service,
            T::TYPE_NAME
        );
        Ok(publisher)
    }

    /// Create a typed subscriber for `service`.
    pub fn create_subscriber<T: Payload>(
        &self,
        service: &ServiceDescription,
        options: SubscriberOptions,
    ) -> Result<Subscriber<T>> {
        let channel = self.channel(service);
        let subscriber = Subscriber::new(channel, options)?;
        log::debug!(
            "[runtime] '{}' created subscriber {} for {} ({})",
            self.name,
            subscriber.origin_id(),
            service,
            T::TYPE_NAME
        );
        Ok(subscriber)
    }

    /// WaitSet sized by the configured `waitset_capacity`.
    pub fn create_waitset<K>(&self) -> Result<WaitSet<K>> {
        WaitSet::with_capacity(self.config.load().waitset_capacity)
    }

    /// Remove `service` from the registry and close its channel.
    ///
    /// Subscribers drain what is already queued, then `take` reports
    /// [`ReceiveError::ChannelClosed`](crate::ReceiveError::ChannelClosed).
    /// Returns `false` if the service was unknown.
    pub fn teardown_service(&self, service: &ServiceDescription) -> bool {
        match self.services.remove(service) {
            Some((_, channel)) => {
                channel.close();
                log::debug!("[runtime] '{}' tore down {}", self.name, service);
                true
            }
            None => false,
        }
    }

    /// Registered services, sorted.
    #[must_use]
    pub fn services(&self) -> Vec<ServiceDescription> {
        let mut services: Vec<_> = self.services.iter().map(|e| e.key().clone()).collect();
        services.sort();
        services
    }

    /// Pool backing every publisher of this runtime.
    #[must_use]
    pub fn chunk_pool(&self) -> &Arc<ChunkPool> {
        &self.pool
    }

    fn channel(&self, service: &ServiceDescription) -> Arc<Channel> {
        let entry = self
            .services
            .entry(service.clone())
            .or_insert_with(|| Arc::new(Channel::new(service.clone())));
        Arc::clone(entry.value())
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        for entry in self.services.iter() {
            entry.value().close();
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("name", &self.name)
            .field("services", &self.services.len())
            .field("pool", &self.pool)
            .finish()
    }
}

/// Builder for [`Runtime`].
///
/// Without an explicit configuration, [`RuntimeConfig::from_env`] is used.
#[derive(Debug)]
pub struct RuntimeBuilder {
    name: String,
    config: Option<RuntimeConfig>,
}

impl RuntimeBuilder {
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build an isolated runtime.
    pub fn build(self) -> Result<Runtime> {
        validate_runtime_name(&self.name)?;
        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => RuntimeConfig::from_env()?,
        };

        let pool = Arc::new(ChunkPool::new(config.chunk_count, config.max_payload_size));
        log::debug!(
            "[runtime] '{}' built chunks={} max_payload={} waitset_capacity={}",
            self.name,
            config.chunk_count,
            config.max_payload_size,
            config.waitset_capacity
        );
        Ok(Runtime {
            name: self.name,
            config: ArcSwap::from_pointee(config),
            pool,
            services: DashMap::new(),
        })
    }

    /// Build and register as the process-wide runtime.
    pub fn init(self) -> Result<Arc<Runtime>> {
        if let Some(existing) = GLOBAL_RUNTIME.get() {
            return check_same_name(existing, &self.name);
        }
        let runtime = Arc::new(self.build()?);
        let name = runtime.name.clone();
        // Another thread may have won the race; its runtime is authoritative.
        let installed = GLOBAL_RUNTIME.get_or_init(|| runtime);
        check_same_name(installed, &name)
    }
}

fn check_same_name(runtime: &Arc<Runtime>, name: &str) -> Result<Arc<Runtime>> {
    if runtime.name == name {
        Ok(Arc::clone(runtime))
    } else {
        Err(Error::RuntimeAlreadyInitialized(runtime.name.clone()))
    }
}

fn validate_runtime_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_RUNTIME_NAME_LENGTH || name.contains('/') {
        return Err(Error::InvalidRuntimeName(name.to_string()));
    }
    Ok(())
}
