//! Cache configuration.
//!
//! Controls the backend choice, entry lifetime, and the deferred-work queue.

use std::num::NonZeroUsize;
use std::time::Duration;

// Default values for cache configuration
const DEFAULT_TTL_SECONDS: u64 = 3600;
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;
const DEFAULT_SHUTDOWN_DRAIN_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Enable the cache layer. When off every read goes to the store.
    pub enabled: bool,
    /// Redis connection URL; `None` selects the in-process backend.
    pub url: Option<String>,
    /// Lifetime of each cached entry.
    pub ttl_seconds: u64,
    /// Maximum entries held by the in-process backend.
    pub memory_capacity: usize,
    /// Maximum events per consumption batch.
    pub consume_batch_limit: usize,
    /// Upper bound on draining pending events at shutdown.
    pub shutdown_drain_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
            shutdown_drain_ms: DEFAULT_SHUTDOWN_DRAIN_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            url: settings.url.clone(),
            ttl_seconds: settings.ttl.as_secs(),
            memory_capacity: settings.memory_capacity.get(),
            consume_batch_limit: settings.consume_batch_limit.get(),
            shutdown_drain_ms: u64::try_from(settings.shutdown_drain.as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds.max(1))
    }

    pub fn shutdown_drain(&self) -> Duration {
        Duration::from_millis(self.shutdown_drain_ms)
    }

    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Batch limit used when draining, never below one event.
    pub fn batch_limit(&self) -> usize {
        self.consume_batch_limit.max(1)
    }
}
