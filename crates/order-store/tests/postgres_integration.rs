//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need a Docker daemon.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use cache::InMemoryCache;
use domain::{Delivery, Item, Order, Payment};
use order_store::{
    CachedOrderStore, DEFAULT_SHUTDOWN_GRACE, OrderId, OrderRepository, OrderService,
    PostgresConfig, PostgresOrderStore, StoreError,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    config: PostgresConfig,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let config = PostgresConfig {
                host: host.to_string(),
                port,
                password: "postgres".to_string(),
                ssl_mode: "disable".to_string(),
                max_connections: 5,
                ..PostgresConfig::default()
            };

            let store = PostgresOrderStore::connect(&config).await.unwrap();
            store.run_migrations().await.unwrap();
            store.pool().close().await;

            Arc::new(ContainerInfo { container, config })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;
    let store = PostgresOrderStore::connect(&info.config).await.unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders, items, payment, delivery RESTART IDENTITY")
        .execute(store.pool())
        .await
        .unwrap();

    store
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

fn create_test_order(uid: &str) -> Order {
    Order {
        order_uid: uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: uid.to_string(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1637907727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
        },
        items: (0..3)
            .map(|i| Item {
                chrt_id: 9934930 + i,
                price: 453,
                rid: format!("ab4219087a764ae0btest{i}"),
                name: format!("Item {i}"),
                sale: 30,
                size: "0".to_string(),
                total_price: 317,
                nm_id: 2389212 + i,
                brand: "Vivienne Sabo".to_string(),
            })
            .collect(),
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
    }
}

fn unique_uid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[tokio::test]
#[serial]
async fn test_create_and_fetch_roundtrip() {
    let store = get_test_store().await;
    let order = create_test_order(&unique_uid());

    let id = store.create(&order).await.unwrap();
    let fetched = store.fetch_by_id(id).await.unwrap();

    assert_eq!(fetched, order);
    let names: Vec<_> = fetched.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["Item 0", "Item 1", "Item 2"]);
}

#[tokio::test]
#[serial]
async fn test_fetch_missing_order_is_not_found() {
    let store = get_test_store().await;

    let err = store.fetch_by_id(OrderId::new(999_999)).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == OrderId::new(999_999)));
}

#[tokio::test]
#[serial]
async fn test_duplicate_order_uid_is_rejected() {
    let store = get_test_store().await;
    let order = create_test_order(&unique_uid());

    store.create(&order).await.unwrap();
    let err = store.create(&order).await.unwrap_err();

    assert!(err.is_duplicate());
    assert!(!err.is_retryable());
    assert_eq!(count(store.pool(), "orders").await, 1);
    assert_eq!(count(store.pool(), "items").await, 3);
    assert_eq!(count(store.pool(), "payment").await, 1);
}

#[tokio::test]
#[serial]
async fn test_failed_create_leaves_no_rows() {
    let store = get_test_store().await;
    let mut order = create_test_order(&unique_uid());
    // Too long for the currency column: items are already staged when the
    // payment insert fails.
    order.payment.currency = "RUBX".to_string();

    let err = store.create(&order).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Database {
            op: "order_store.postgres.create.insert_payment",
            ..
        }
    ));
    assert!(!err.is_retryable());

    for table in ["orders", "items", "payment", "delivery", "order_items"] {
        assert_eq!(count(store.pool(), table).await, 0, "{table}");
    }
}

#[tokio::test]
#[serial]
async fn test_concurrent_creates_of_distinct_orders() {
    let store = get_test_store().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.create(&create_test_order(&unique_uid())).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(count(store.pool(), "orders").await, 8);
    assert_eq!(count(store.pool(), "order_items").await, 24);
}

#[tokio::test]
#[serial]
async fn test_cached_store_over_postgres() {
    let store = get_test_store().await;
    let cache = InMemoryCache::new();
    let cached = CachedOrderStore::new(store.clone(), cache.clone(), Duration::from_secs(60));

    let id = cached.create(&create_test_order(&unique_uid())).await.unwrap();
    let first = cached.fetch_by_id(id).await.unwrap();

    for _ in 0..100 {
        if cache.contains(&id.cache_key()).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Served from the cache even after the rows are gone.
    sqlx::query("TRUNCATE TABLE order_items, orders, items, payment, delivery")
        .execute(store.pool())
        .await
        .unwrap();
    let second = cached.fetch_by_id(id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
#[serial]
async fn test_service_rejects_invalid_order_without_writing() {
    let store = get_test_store().await;
    let service = OrderService::new(store.clone());
    let mut order = create_test_order(&unique_uid());
    order.delivery.email = "not-an-email".to_string();

    let err = service.create_order(&order).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(count(store.pool(), "orders").await, 0);
}

#[tokio::test]
#[serial]
async fn test_close_releases_connections() {
    let store = get_test_store().await;
    store.create(&create_test_order(&unique_uid())).await.unwrap();

    assert_eq!(store.shutdown(DEFAULT_SHUTDOWN_GRACE).await, 0);
    assert!(store.pool().is_closed());
}

#[tokio::test]
#[serial]
async fn test_shutdown_reports_held_connections() {
    let store = get_test_store().await;
    let held = store.pool().acquire().await.unwrap();

    let acquired = tokio::time::timeout(
        Duration::from_secs(2),
        store.shutdown(Duration::from_millis(200)),
    )
    .await
    .expect("shutdown must not wait for held connections");

    assert!(acquired >= 1);
    assert!(store.pool().is_closed());
    drop(held);
}
