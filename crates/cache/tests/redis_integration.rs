//! Redis integration tests
//!
//! These tests start a Redis container and need a Docker daemon.
//! Run with:
//!
//! ```bash
//! cargo test -p cache --test redis_integration -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use cache::{Cache, CacheError, CacheExt, ReadThrough, RedisCache, RedisConfig};
use serde::{Deserialize, Serialize};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Redis>,
    url: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Redis::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(6379).await.unwrap();

            Arc::new(ContainerInfo {
                container,
                url: format!("redis://{}:{}/0", host, port),
            })
        })
        .await
        .clone()
}

async fn get_test_cache() -> RedisCache {
    let info = get_container_info().await;
    let config = RedisConfig {
        url: info.url.clone(),
        ..RedisConfig::default()
    };
    RedisCache::connect(&config).await.unwrap()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CachedOrder {
    order_uid: String,
    total: i64,
}

#[tokio::test]
async fn test_set_and_get_typed_value() {
    let cache = get_test_cache().await;
    let value = CachedOrder {
        order_uid: "uid-1".to_string(),
        total: 317,
    };

    cache
        .set("order:set-get", &value, Duration::from_secs(60))
        .await
        .unwrap();
    let got: Option<CachedOrder> = cache.get("order:set-get").await.unwrap();

    assert_eq!(got, Some(value));
}

#[tokio::test]
async fn test_missing_key_is_none() {
    let cache = get_test_cache().await;
    let got: Option<CachedOrder> = cache.get("order:does-not-exist").await.unwrap();
    assert!(got.is_none());
}

#[tokio::test]
async fn test_entry_expires() {
    let cache = get_test_cache().await;
    cache
        .set_raw("order:expiring", b"1".to_vec(), Duration::from_millis(200))
        .await
        .unwrap();

    assert!(cache.get_raw("order:expiring").await.unwrap().is_some());
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(cache.get_raw("order:expiring").await.unwrap().is_none());
}

#[tokio::test]
async fn test_corrupt_entry_is_serialization_error() {
    let cache = get_test_cache().await;
    cache
        .set_raw("order:corrupt", b"not json".to_vec(), Duration::from_secs(60))
        .await
        .unwrap();

    let err = cache.get::<CachedOrder>("order:corrupt").await.unwrap_err();
    assert!(matches!(err, CacheError::Serialization(_)));
}

#[tokio::test]
async fn test_read_through_populates_redis() {
    let cache = get_test_cache().await;
    let reader = ReadThrough::new(cache.clone(), Duration::from_secs(60));

    let loaded: Result<CachedOrder, std::io::Error> = reader
        .load("order:read-through", || async {
            Ok(CachedOrder {
                order_uid: "uid-2".to_string(),
                total: 10,
            })
        })
        .await;
    assert_eq!(loaded.unwrap().total, 10);

    for _ in 0..100 {
        if cache.get_raw("order:read-through").await.unwrap().is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("read-through did not populate redis");
}

#[tokio::test]
async fn test_closed_cache_rejects_calls() {
    let cache = get_test_cache().await;
    let clone = cache.clone();
    cache
        .set_raw("order:closed", b"1".to_vec(), Duration::from_secs(60))
        .await
        .unwrap();

    cache.close().await.unwrap();
    cache.close().await.unwrap();

    assert!(clone.is_closed().await);
    let err = clone.get_raw("order:closed").await.unwrap_err();
    assert!(matches!(err, CacheError::Closed));
    let err = clone
        .set_raw("order:closed", b"2".to_vec(), Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Closed));
}

#[tokio::test]
async fn test_connect_to_invalid_url_fails() {
    let config = RedisConfig {
        url: "not-a-url".to_string(),
        ..RedisConfig::default()
    };
    let err = RedisCache::connect(&config).await.err().unwrap();
    assert!(matches!(err, CacheError::Connect(_)));
}
