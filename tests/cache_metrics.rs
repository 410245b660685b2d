use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use metrics_util::debugging::DebuggingRecorder;
use uuid::Uuid;

use carta::cache::{
    CacheBackend, CacheConfig, CacheConsumer, CacheError, CacheKey, CacheStore, EventKind,
    EventQueue, MemoryBackend, encode,
};

struct BrokenBackend;

#[async_trait]
impl CacheBackend for BrokenBackend {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<u64, CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }
}

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Hit, miss, and eviction on a single-slot in-process backend
    let small = CacheConfig {
        memory_capacity: 1,
        ..Default::default()
    };
    let memory: Arc<dyn CacheBackend> = Arc::new(MemoryBackend::new(&small));
    let store = CacheStore::new(memory, &small);
    let first = CacheKey::Menu {
        menu_id: Uuid::new_v4(),
    };
    let second = CacheKey::Menu {
        menu_id: Uuid::new_v4(),
    };

    assert!(store.get::<String>(&first).await.is_none());
    store
        .set(&first, encode(&"lunch").expect("string encodes"))
        .await;
    assert_eq!(store.get::<String>(&first).await.as_deref(), Some("lunch"));
    store
        .set(&second, encode(&"dinner").expect("string encodes"))
        .await;

    // Absorbed backend failures
    let broken = CacheStore::new(Arc::new(BrokenBackend), &CacheConfig::default());
    assert!(broken.get::<String>(&first).await.is_none());

    // Queue length and consumption latency
    let config = CacheConfig::default();
    let queue = Arc::new(EventQueue::new());
    let consumer_backend: Arc<dyn CacheBackend> = Arc::new(MemoryBackend::new(&config));
    let consumer = CacheConsumer::new(
        config.clone(),
        Arc::new(CacheStore::new(consumer_backend, &config)),
        queue.clone(),
    );
    queue.publish(EventKind::MenuCreated {
        menu_id: Uuid::new_v4(),
    });
    assert!(consumer.consume().await);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "carta_cache_hit_total",
        "carta_cache_miss_total",
        "carta_cache_evict_total",
        "carta_cache_error_total",
        "carta_cache_event_queue_len",
        "carta_cache_consume_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
