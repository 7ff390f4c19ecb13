//! Redis-backed cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

use crate::{Cache, CacheError, RedisConfig, Result};

/// Cache stored in Redis.
///
/// Cloning is cheap: clones share one multiplexed, auto-reconnecting
/// connection, so the cache can be handed to spawned tasks freely. Closing
/// any clone closes them all.
#[derive(Clone)]
pub struct RedisCache {
    connection: Arc<RwLock<Option<ConnectionManager>>>,
}

impl RedisCache {
    /// Connects to Redis and verifies the connection with `PING`.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| CacheError::Connect(format!("{}: {}", config.url, e)))?;

        let mut connection = client.get_connection_manager().await.map_err(|e| {
            CacheError::Connect(format!("failed to create connection manager: {e}"))
        })?;

        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        tracing::info!(url = %config.url, "connected to redis cache");

        Ok(Self::from_connection(connection))
    }

    /// Wraps an existing connection manager.
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self {
            connection: Arc::new(RwLock::new(Some(connection))),
        }
    }

    /// Returns true once [`Cache::close`] has run.
    pub async fn is_closed(&self) -> bool {
        self.connection.read().await.is_none()
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or(CacheError::Closed)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        // PSETEX rejects a zero expiry.
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let _: () = conn.pset_ex(key, value, millis).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // The socket closes once in-flight calls drop their manager clones.
        if self.connection.write().await.take().is_some() {
            tracing::debug!("redis cache closed");
        }
        Ok(())
    }
}
