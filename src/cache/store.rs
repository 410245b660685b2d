//! Cache storage.
//!
//! `CacheBackend` is the raw key/value seam (in-process LRU or Redis).
//! `CacheStore` sits on top of it, speaks `CacheKey` and JSON, and absorbs
//! every backend failure: reads degrade to misses, writes are skipped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::CacheKey;

const METRIC_CACHE_HIT: &str = "carta_cache_hit_total";
const METRIC_CACHE_MISS: &str = "carta_cache_miss_total";
const METRIC_CACHE_ERROR: &str = "carta_cache_error_total";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short backend label used in logs.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Store `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key starting with `prefix`; returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
}

/// Serialize a snapshot for storage.
pub fn encode<T: Serialize>(value: &T) -> Result<Bytes, CacheError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend,
            ttl: config.ttl(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Look up and decode a snapshot. Misses, backend errors, and undecodable
    /// entries all come back as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let rendered = key.render();
        let raw = match self.backend.get(&rendered).await {
            Ok(raw) => raw,
            Err(err) => {
                self.absorb("get", &rendered, &err);
                return None;
            }
        };

        let Some(raw) = raw else {
            counter!(METRIC_CACHE_MISS).increment(1);
            debug!(key = %rendered, "Cache miss");
            return None;
        };

        match serde_json::from_slice(&raw) {
            Ok(value) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                debug!(key = %rendered, "Cache hit");
                Some(value)
            }
            Err(err) => {
                self.absorb("decode", &rendered, &CacheError::from(err));
                None
            }
        }
    }

    pub async fn set(&self, key: &CacheKey, value: Bytes) {
        let rendered = key.render();
        if let Err(err) = self.backend.set(&rendered, value, self.ttl).await {
            self.absorb("set", &rendered, &err);
        }
    }

    pub async fn invalidate_exact(&self, key: &CacheKey) {
        let rendered = key.render();
        if let Err(err) = self.backend.delete(&rendered).await {
            self.absorb("delete", &rendered, &err);
        }
    }

    pub async fn invalidate_prefix(&self, key: &CacheKey) {
        let rendered = key.render();
        match self.backend.delete_prefix(&rendered).await {
            Ok(removed) => debug!(prefix = %rendered, removed, "Cache prefix invalidated"),
            Err(err) => self.absorb("delete_prefix", &rendered, &err),
        }
    }

    pub async fn invalidate_aggregate(&self) {
        self.invalidate_exact(&CacheKey::FullTree).await;
    }

    fn absorb(&self, op: &'static str, key: &str, err: &CacheError) {
        counter!(METRIC_CACHE_ERROR, "op" => op).increment(1);
        warn!(
            op,
            key,
            backend = self.backend.name(),
            error = %err,
            "Cache operation failed; continuing without cache"
        );
    }
}
