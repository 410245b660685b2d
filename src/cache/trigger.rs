//! Cache trigger service.
//!
//! The one entry point services use: read-through lookups, populate requests
//! after a miss, and one event per mutation. Events are consumed out of band
//! by the background consumer, or on `flush`.
//!
//! A populate carries the queue epoch observed before its store read; the
//! consumer drops it when the key was invalidated at or after that epoch.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::CacheConfig;
use super::consumer::CacheConsumer;
use super::events::{Epoch, EventKind, EventQueue};
use super::keys::CacheKey;
use super::store::encode;

pub struct CacheTrigger {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    consumer: Arc<CacheConsumer>,
}

impl CacheTrigger {
    pub fn new(config: CacheConfig, queue: Arc<EventQueue>, consumer: Arc<CacheConsumer>) -> Self {
        Self {
            config,
            queue,
            consumer,
        }
    }

    /// Publish an event and optionally consume immediately.
    pub async fn trigger(&self, kind: EventKind, consume_now: bool) {
        if !self.config.is_enabled() {
            debug!(
                event_kind = kind.label(),
                "Cache trigger skipped: cache disabled"
            );
            return;
        }

        self.queue.publish(kind);

        if consume_now {
            self.consumer.consume().await;
        }
    }

    /// Read a cached snapshot. Always `None` when the cache is disabled.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if !self.config.is_enabled() {
            return None;
        }
        self.consumer.store().get(key).await
    }

    /// Mark the start of a store read. Pass the result to [`populate`].
    ///
    /// [`populate`]: CacheTrigger::populate
    pub fn observe(&self) -> Epoch {
        self.queue.current_epoch()
    }

    /// Schedule storing a value loaded after a miss. `observed` must come from
    /// [`observe`](CacheTrigger::observe) before the value was read.
    pub async fn populate<T: Serialize>(&self, key: CacheKey, observed: Epoch, value: &T) {
        if let Some(value) = snapshot_bytes(&key, value) {
            self.trigger(
                EventKind::Populate {
                    key,
                    value,
                    observed,
                },
                false,
            )
            .await;
        }
    }

    /// Serve `key` from the cache, or run `load` and schedule the result to
    /// be stored. Errors from `load` are returned and nothing is stored.
    pub async fn read_through<T, E, F, Fut>(&self, key: CacheKey, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let observed = self.observe();
        if let Some(cached) = self.lookup(&key).await {
            return Ok(cached);
        }

        let value = load().await?;
        self.populate(key, observed, &value).await;
        Ok(value)
    }

    pub async fn menu_created(&self, menu_id: Uuid) {
        self.trigger(EventKind::MenuCreated { menu_id }, false).await;
    }

    /// `snapshot` is the fresh row to store in place of the old one; `None`
    /// only invalidates.
    pub async fn menu_updated<T: Serialize>(&self, menu_id: Uuid, snapshot: Option<&T>) {
        let snapshot = snapshot.and_then(|s| snapshot_bytes(&CacheKey::Menu { menu_id }, s));
        self.trigger(EventKind::MenuUpdated { menu_id, snapshot }, false)
            .await;
    }

    pub async fn menu_deleted(&self, menu_id: Uuid) {
        self.trigger(EventKind::MenuDeleted { menu_id }, false).await;
    }

    pub async fn submenu_created(&self, menu_id: Uuid, submenu_id: Uuid) {
        self.trigger(
            EventKind::SubmenuCreated {
                menu_id,
                submenu_id,
            },
            false,
        )
        .await;
    }

    pub async fn submenu_updated<T: Serialize>(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        snapshot: Option<&T>,
    ) {
        let key = CacheKey::Submenu {
            menu_id,
            submenu_id,
        };
        let snapshot = snapshot.and_then(|s| snapshot_bytes(&key, s));
        self.trigger(
            EventKind::SubmenuUpdated {
                menu_id,
                submenu_id,
                snapshot,
            },
            false,
        )
        .await;
    }

    pub async fn submenu_deleted(&self, menu_id: Uuid, submenu_id: Uuid) {
        self.trigger(
            EventKind::SubmenuDeleted {
                menu_id,
                submenu_id,
            },
            false,
        )
        .await;
    }

    pub async fn dish_created(&self, menu_id: Uuid, submenu_id: Uuid, dish_id: Uuid) {
        self.trigger(
            EventKind::DishCreated {
                menu_id,
                submenu_id,
                dish_id,
            },
            false,
        )
        .await;
    }

    pub async fn dish_updated<T: Serialize>(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        dish_id: Uuid,
        snapshot: Option<&T>,
    ) {
        let key = CacheKey::Dish {
            menu_id,
            submenu_id,
            dish_id,
        };
        let snapshot = snapshot.and_then(|s| snapshot_bytes(&key, s));
        self.trigger(
            EventKind::DishUpdated {
                menu_id,
                submenu_id,
                dish_id,
                snapshot,
            },
            false,
        )
        .await;
    }

    pub async fn dish_deleted(&self, menu_id: Uuid, submenu_id: Uuid, dish_id: Uuid) {
        self.trigger(
            EventKind::DishDeleted {
                menu_id,
                submenu_id,
                dish_id,
            },
            false,
        )
        .await;
    }

    /// Apply every pending event now.
    pub async fn flush(&self) {
        self.consumer.drain_all().await;
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn consumer(&self) -> &Arc<CacheConsumer> {
        &self.consumer
    }
}

fn snapshot_bytes<T: Serialize>(key: &CacheKey, value: &T) -> Option<Bytes> {
    match encode(value) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            warn!(key = %key, error = %err, "Failed to encode cache snapshot");
            None
        }
    }
}
