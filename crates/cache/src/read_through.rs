//! Read-through access: cache first, then the authoritative loader.

use std::future::Future;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};

use crate::{Cache, CacheExt};

/// Wraps a cache with the read-through policy.
///
/// - A hit returns the cached value without calling the loader.
/// - A miss, an unreachable backend, or an undecodable entry all call the
///   loader; cache errors are logged and never returned.
/// - A successful load repopulates the cache from a spawned task, so the
///   caller's success path never waits on the cache write.
#[derive(Clone)]
pub struct ReadThrough<C> {
    cache: C,
    ttl: Duration,
}

impl<C> ReadThrough<C>
where
    C: Cache + Clone + 'static,
{
    pub fn new(cache: C, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Returns the wrapped cache.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Returns the expiry applied to repopulated entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the value for `key`, loading and caching it on a miss.
    ///
    /// Loader errors are returned unchanged and nothing is cached.
    pub async fn load<T, E, F, Fut>(&self, key: &str, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.cache.get::<T>(key).await {
            Ok(Some(value)) => {
                metrics::counter!("cache_hits_total").increment(1);
                tracing::debug!(key, "cache hit");
                return Ok(value);
            }
            Ok(None) => {
                metrics::counter!("cache_misses_total").increment(1);
                tracing::debug!(key, "cache miss");
            }
            Err(e) => {
                metrics::counter!("cache_errors_total").increment(1);
                tracing::warn!(key, error = %e, "cache read failed, treating as miss");
            }
        }

        let value = loader().await?;
        self.populate(key, &value);
        Ok(value)
    }

    fn populate<T: Serialize>(&self, key: &str, value: &T) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to encode value for cache");
                return;
            }
        };

        let cache = self.cache.clone();
        let key = key.to_string();
        let ttl = self.ttl;
        tokio::spawn(async move {
            match cache.set_raw(&key, bytes, ttl).await {
                Ok(()) => tracing::debug!(key, "cache populated"),
                Err(e) => {
                    metrics::counter!("cache_errors_total").increment(1);
                    tracing::warn!(key, error = %e, "failed to populate cache");
                }
            }
        });
    }
}
