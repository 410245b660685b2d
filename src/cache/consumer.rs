//! Cache consumer for executing consumption plans.
//!
//! Drains events from the queue and applies their actions to the store, one
//! batch at a time, in order.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use metrics::{counter, histogram};
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::config::CacheConfig;
use super::events::EventQueue;
use super::lock::mutex_lock;
use super::planner::{CacheAction, ConsumptionPlan, InvalidationFence};
use super::store::CacheStore;

const SOURCE: &str = "cache::consumer";
const METRIC_CACHE_CONSUME_MS: &str = "carta_cache_consume_ms";
const METRIC_CACHE_STALE_POPULATES: &str = "carta_cache_stale_populates_total";

pub struct CacheConsumer {
    config: CacheConfig,
    store: Arc<CacheStore>,
    queue: Arc<EventQueue>,
    fence: Mutex<InvalidationFence>,
}

impl CacheConsumer {
    pub fn new(config: CacheConfig, store: Arc<CacheStore>, queue: Arc<EventQueue>) -> Self {
        Self {
            config,
            store,
            queue,
            fence: Mutex::new(InvalidationFence::default()),
        }
    }

    /// Consume one batch of pending events.
    ///
    /// Returns true if any events were processed.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> bool {
        let consume_started_at = Instant::now();
        let events = self.queue.drain(self.config.batch_limit());
        if events.is_empty() {
            return false;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let lag_ms = events
            .first()
            .map(|oldest| (OffsetDateTime::now_utc() - oldest.timestamp).whole_milliseconds())
            .unwrap_or_default();
        let plan = {
            let mut fence = mutex_lock(&self.fence, SOURCE, "consume");
            ConsumptionPlan::fenced(events, &mut fence)
        };

        debug!(
            event_count,
            event_ids = ?event_ids,
            lag_ms = lag_ms as i64,
            plan = %plan,
            "Cache consumption starting"
        );
        if plan.stale_populates > 0 {
            counter!(METRIC_CACHE_STALE_POPULATES).increment(plan.stale_populates as u64);
        }

        for action in &plan.actions {
            self.apply(action).await;
        }

        info!(
            event_count,
            actions = plan.len(),
            stale_populates = plan.stale_populates,
            backend = self.store.backend_name(),
            "Cache consumption complete"
        );

        histogram!(METRIC_CACHE_CONSUME_MS)
            .record(consume_started_at.elapsed().as_secs_f64() * 1000.0);

        true
    }

    /// Consume batches until the queue is empty.
    pub async fn drain_all(&self) {
        while self.consume().await {}
    }

    /// Background loop: wake on publish, stop on shutdown.
    ///
    /// On shutdown the remaining events get `shutdown_drain` to finish;
    /// whatever is left after that is dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("Cache consumer started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = self.queue.notified() => {
                    self.drain_all().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.shutdown_drain().await;
    }

    /// Drain pending events within the configured bound.
    pub async fn shutdown_drain(&self) {
        let budget = self.config.shutdown_drain();
        if tokio::time::timeout(budget, self.drain_all()).await.is_err() {
            let dropped = self.queue.clear();
            warn!(
                dropped,
                budget_ms = budget.as_millis() as u64,
                "Cache drain timed out; dropping pending events"
            );
        } else {
            info!("Cache consumer drained");
        }
    }

    async fn apply(&self, action: &CacheAction) {
        match action {
            CacheAction::InvalidateExact(key) => self.store.invalidate_exact(key).await,
            CacheAction::InvalidatePrefix(key) => self.store.invalidate_prefix(key).await,
            CacheAction::InvalidateAggregate => self.store.invalidate_aggregate().await,
            CacheAction::Set { key, value } => self.store.set(key, value.clone()).await,
        }
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::cache::events::EventKind;
    use crate::cache::keys::CacheKey;
    use crate::cache::memory::MemoryBackend;
    use crate::cache::store::encode;

    fn create_consumer(config: CacheConfig) -> (CacheConsumer, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new(&config));
        let store = Arc::new(CacheStore::new(backend.clone(), &config));
        let queue = Arc::new(EventQueue::new());
        (CacheConsumer::new(config, store, queue), backend)
    }

    #[tokio::test]
    async fn consume_empty_queue_returns_false() {
        let (consumer, _) = create_consumer(CacheConfig::default());
        assert!(!consumer.consume().await);
    }

    #[tokio::test]
    async fn consume_applies_populate_then_invalidation() {
        let (consumer, backend) = create_consumer(CacheConfig::default());
        let menu_id = Uuid::new_v4();

        let observed = consumer.queue.current_epoch();
        consumer.queue.publish(EventKind::Populate {
            key: CacheKey::MenuList,
            value: encode(&Vec::<u32>::new()).unwrap(),
            observed,
        });
        consumer.queue.publish(EventKind::Populate {
            key: CacheKey::Menu { menu_id },
            value: Bytes::from_static(b"{}"),
            observed,
        });
        assert!(consumer.consume().await);
        assert!(backend.contains("/menus/"));
        assert!(backend.contains(&format!("/menus/{menu_id}")));

        consumer.queue.publish(EventKind::MenuDeleted { menu_id });
        assert!(consumer.consume().await);
        assert!(!backend.contains("/menus/"));
        assert!(!backend.contains(&format!("/menus/{menu_id}")));
        assert!(consumer.queue.is_empty());
    }

    #[tokio::test]
    async fn update_repopulates_own_key() {
        let (consumer, backend) = create_consumer(CacheConfig::default());
        let menu_id = Uuid::new_v4();
        let key = format!("/menus/{menu_id}");

        consumer.queue.publish(EventKind::MenuUpdated {
            menu_id,
            snapshot: Some(Bytes::from_static(b"{\"title\":\"New\"}")),
        });
        consumer.consume().await;

        assert!(backend.contains(&key));
    }

    #[tokio::test]
    async fn consume_respects_batch_limit() {
        let (consumer, _) = create_consumer(CacheConfig {
            consume_batch_limit: 2,
            ..Default::default()
        });

        for _ in 0..5 {
            consumer.queue.publish(EventKind::MenuCreated {
                menu_id: Uuid::new_v4(),
            });
        }

        assert_eq!(consumer.queue.len(), 5);
        consumer.consume().await;
        assert_eq!(consumer.queue.len(), 3);

        consumer.drain_all().await;
        assert!(consumer.queue.is_empty());
    }

    #[tokio::test]
    async fn run_drains_pending_events_on_shutdown() {
        let (consumer, backend) = create_consumer(CacheConfig::default());
        let consumer = Arc::new(consumer);
        let (tx, rx) = watch::channel(false);

        consumer.queue.publish(EventKind::Populate {
            key: CacheKey::FullTree,
            value: Bytes::from_static(b"[]"),
            observed: consumer.queue.current_epoch(),
        });
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), consumer.clone().run(rx))
            .await
            .expect("consumer should stop after shutdown");

        assert!(consumer.queue.is_empty());
        assert!(backend.contains("/menus/full"));
    }

    #[tokio::test]
    async fn population_read_before_a_create_is_not_stored() {
        let (consumer, backend) = create_consumer(CacheConfig::default());

        // A list read misses and loads the old rows.
        let observed = consumer.queue.current_epoch();
        // A create commits and invalidates before the read finishes.
        consumer.queue.publish(EventKind::MenuCreated {
            menu_id: Uuid::new_v4(),
        });
        consumer.drain_all().await;
        // The read now writes back what it loaded.
        consumer.queue.publish(EventKind::Populate {
            key: CacheKey::MenuList,
            value: Bytes::from_static(b"[\"old\"]"),
            observed,
        });
        consumer.drain_all().await;

        assert!(!backend.contains("/menus/"));

        consumer.queue.publish(EventKind::Populate {
            key: CacheKey::MenuList,
            value: Bytes::from_static(b"[\"old\",\"new\"]"),
            observed: consumer.queue.current_epoch(),
        });
        consumer.drain_all().await;
        assert!(backend.contains("/menus/"));
    }
}
