use std::time::Duration;

use async_trait::async_trait;
use cache::{Cache, ReadThrough};
use common::OrderId;
use domain::Order;

use crate::{OrderRepository, Result};

/// Order repository with a read-through cache in front of lookups.
///
/// Lookups go to the cache first under `order:{id}`; on a miss, or when the
/// cache is unreachable, the inner repository answers and the cache is
/// repopulated in the background. Writes go straight to the inner
/// repository.
pub struct CachedOrderStore<R, C> {
    inner: R,
    cache: ReadThrough<C>,
}

impl<R, C> CachedOrderStore<R, C>
where
    R: OrderRepository,
    C: Cache + Clone + 'static,
{
    pub fn new(inner: R, cache: C, ttl: Duration) -> Self {
        Self {
            inner,
            cache: ReadThrough::new(cache, ttl),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn cache(&self) -> &C {
        self.cache.cache()
    }
}

#[async_trait]
impl<R, C> OrderRepository for CachedOrderStore<R, C>
where
    R: OrderRepository,
    C: Cache + Clone + 'static,
{
    #[tracing::instrument(skip(self))]
    async fn fetch_by_id(&self, id: OrderId) -> Result<Order> {
        self.cache
            .load(&id.cache_key(), || self.inner.fetch_by_id(id))
            .await
    }

    async fn create(&self, order: &Order) -> Result<OrderId> {
        self.inner.create(order).await
    }

    async fn close(&self) {
        self.inner.close().await;
        if let Err(e) = self.cache.cache().close().await {
            tracing::warn!(error = %e, "failed to close cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use cache::{CacheExt, InMemoryCache};
    use domain::Item;

    use super::*;
    use crate::InMemoryOrderStore;

    fn order(uid: &str) -> Order {
        Order {
            order_uid: uid.to_string(),
            items: vec![Item {
                name: "Mascaras".to_string(),
                ..Item::default()
            }],
            ..Order::default()
        }
    }

    async fn wait_until_cached(cache: &InMemoryCache, key: &str) {
        for _ in 0..100 {
            if cache.contains(key).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{key} was never cached");
    }

    #[tokio::test]
    async fn test_second_lookup_served_from_cache() {
        let backing = InMemoryOrderStore::new();
        let cache = InMemoryCache::new();
        let store = CachedOrderStore::new(backing.clone(), cache.clone(), Duration::from_secs(60));

        let id = store.create(&order("cached")).await.unwrap();

        let first = store.fetch_by_id(id).await.unwrap();
        wait_until_cached(&cache, &id.cache_key()).await;
        let second = store.fetch_by_id(id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backing.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_value_matches_store() {
        let backing = InMemoryOrderStore::new();
        let cache = InMemoryCache::new();
        let store = CachedOrderStore::new(backing.clone(), cache.clone(), Duration::from_secs(60));

        let id = store.create(&order("matches")).await.unwrap();
        let fetched = store.fetch_by_id(id).await.unwrap();
        wait_until_cached(&cache, &id.cache_key()).await;

        let cached: Order = cache.get(&id.cache_key()).await.unwrap().unwrap();
        assert_eq!(cached, fetched);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let backing = InMemoryOrderStore::new();
        let cache = InMemoryCache::new();
        let store = CachedOrderStore::new(backing, cache.clone(), Duration::from_secs(60));

        let err = store.fetch_by_id(OrderId::new(7)).await.unwrap_err();
        assert!(err.is_not_found());

        tokio::task::yield_now().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_close_clears_memory_cache() {
        let backing = InMemoryOrderStore::new();
        let cache = InMemoryCache::new();
        let store = CachedOrderStore::new(backing, cache.clone(), Duration::from_secs(60));

        let id = store.create(&order("closing")).await.unwrap();
        store.fetch_by_id(id).await.unwrap();
        wait_until_cached(&cache, &id.cache_key()).await;

        store.close().await;
        assert!(cache.is_empty().await);
    }
}
