//! Carta cache system.
//!
//! A path-shaped key namespace mirroring the REST hierarchy, backed either by
//! an in-process LRU or by Redis. Mutations publish one event each; the
//! consumer turns events into ordered invalidation and re-population actions
//! and applies them after the request has returned.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! url = "redis://127.0.0.1:6379/0"   # omit for the in-process backend
//! ttl_seconds = 3600
//! ```

mod config;
mod consumer;
mod events;
mod keys;
mod lock;
mod memory;
mod planner;
mod redis_backend;
mod store;
mod trigger;

pub use config::CacheConfig;
pub use consumer::CacheConsumer;
pub use events::{CacheEvent, Epoch, EventKind, EventQueue};
pub use keys::CacheKey;
pub use memory::MemoryBackend;
pub use planner::{CacheAction, ConsumptionPlan, InvalidationFence};
pub use redis_backend::RedisBackend;
pub use store::{CacheBackend, CacheError, CacheStore, encode};
pub use trigger::CacheTrigger;
