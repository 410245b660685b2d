//! Cache event system.
//!
//! Every mutation publishes exactly one event describing what changed. The
//! consumer later turns each event into an ordered list of cache actions.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use metrics::gauge;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tracing::info;
use uuid::Uuid;

use super::keys::CacheKey;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";
const METRIC_CACHE_QUEUE_LEN: &str = "carta_cache_event_queue_len";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier used to drop duplicate deliveries.
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// What happened. Update events carry the fresh JSON snapshot of the entity
/// so its own key can be re-populated without another store read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    // Menus
    MenuCreated {
        menu_id: Uuid,
    },
    MenuUpdated {
        menu_id: Uuid,
        snapshot: Option<Bytes>,
    },
    MenuDeleted {
        menu_id: Uuid,
    },

    // Submenus
    SubmenuCreated {
        menu_id: Uuid,
        submenu_id: Uuid,
    },
    SubmenuUpdated {
        menu_id: Uuid,
        submenu_id: Uuid,
        snapshot: Option<Bytes>,
    },
    SubmenuDeleted {
        menu_id: Uuid,
        submenu_id: Uuid,
    },

    // Dishes
    DishCreated {
        menu_id: Uuid,
        submenu_id: Uuid,
        dish_id: Uuid,
    },
    DishUpdated {
        menu_id: Uuid,
        submenu_id: Uuid,
        dish_id: Uuid,
        snapshot: Option<Bytes>,
    },
    DishDeleted {
        menu_id: Uuid,
        submenu_id: Uuid,
        dish_id: Uuid,
    },

    // Read-through
    /// A read missed the cache; store the value it loaded. `observed` is the
    /// queue epoch taken before the store read, so the value is dropped if
    /// the key was invalidated at or after that point.
    Populate {
        key: CacheKey,
        value: Bytes,
        observed: Epoch,
    },
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::MenuCreated { .. } => "menu_created",
            EventKind::MenuUpdated { .. } => "menu_updated",
            EventKind::MenuDeleted { .. } => "menu_deleted",
            EventKind::SubmenuCreated { .. } => "submenu_created",
            EventKind::SubmenuUpdated { .. } => "submenu_updated",
            EventKind::SubmenuDeleted { .. } => "submenu_deleted",
            EventKind::DishCreated { .. } => "dish_created",
            EventKind::DishUpdated { .. } => "dish_updated",
            EventKind::DishDeleted { .. } => "dish_deleted",
            EventKind::Populate { .. } => "populate",
        }
    }
}

/// In-memory FIFO of pending cache events.
///
/// Publishers never block on cache I/O; they push and wake the consumer.
pub struct EventQueue {
    queue: Mutex<VecDeque<CacheEvent>>,
    epoch_counter: AtomicU64,
    notify: Notify,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// The epoch the next published event will get. Every event already in
    /// the queue, or already consumed, has a smaller one.
    pub fn current_epoch(&self) -> Epoch {
        self.epoch_counter.load(Ordering::SeqCst)
    }

    pub fn publish(&self, kind: EventKind) {
        // Epochs are assigned under the queue lock so FIFO order and epoch
        // order agree.
        let len = {
            let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
            let event = CacheEvent::new(kind, self.next_epoch());
            info!(
                event_id = %event.id,
                event_epoch = event.epoch,
                event_kind = event.kind.label(),
                "Cache event enqueued"
            );
            queue.push_back(event);
            queue.len()
        };
        gauge!(METRIC_CACHE_QUEUE_LEN).set(len as f64);
        self.notify.notify_one();
    }

    /// Drain up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<CacheEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let events: Vec<_> = queue.drain(..count).collect();
        gauge!(METRIC_CACHE_QUEUE_LEN).set(queue.len() as f64);
        events
    }

    /// Wait until something is published. A publish that happened while no
    /// one was waiting is remembered, so the next wait returns immediately.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all pending events, returning how many were discarded.
    pub fn clear(&self) -> usize {
        let mut queue = mutex_lock(&self.queue, SOURCE, "clear");
        let dropped = queue.len();
        queue.clear();
        gauge!(METRIC_CACHE_QUEUE_LEN).set(0.0);
        dropped
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
